// CSV output for scraped product records

use lazuli_scanner::ProductRecord;
use lazuli_scanner::error::{Result, ScanError};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const HEADER: [&str; 14] = [
    "ID",
    "URL",
    "ProductName",
    "Price",
    "ImageURL",
    "Breadcrumbs",
    "Description",
    "DescriptionItems",
    "AvailableSizes",
    "SizeNote",
    "Keywords",
    "SizeChart",
    "Reviews",
    "CoordinatedProducts",
];

const LIST_SEPARATOR: &str = ", ";
const BREADCRUMB_SEPARATOR: &str = " > ";
const ITEM_SEPARATOR: &str = "\n";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub path: PathBuf,
    pub rows_written: usize,
    pub rows_skipped: usize,
}

/// Writes one header row, then one row per record.
///
/// Opening the sink and writing the header are fatal on failure. A failing
/// row is logged and skipped. Each row is encoded on its own before it
/// reaches the output, so a failed write never leaves a fragment that the
/// next row would be appended to.
pub struct CsvSink<W: Write> {
    out: BufWriter<W>,
    written: usize,
    skipped: usize,
}

impl CsvSink<File> {
    /// Creates `path` (and any missing parent directories), truncating an
    /// existing file.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Self::new(file)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut out = BufWriter::new(inner);
        out.write_all(&encode_row(&HEADER)?)?;
        Ok(Self {
            out,
            written: 0,
            skipped: 0,
        })
    }

    pub fn write(&mut self, record: &ProductRecord) -> Result<()> {
        let result = encode_row(&record_row(record)).and_then(|row| self.out.write_all(&row));
        match result {
            Ok(()) => {
                self.written += 1;
                Ok(())
            }
            Err(e) => {
                self.skipped += 1;
                Err(ScanError::Sink {
                    id: record.id.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Flushes buffered rows and returns (written, skipped).
    pub fn finish(mut self) -> Result<(usize, usize)> {
        self.out.flush()?;
        Ok((self.written, self.skipped))
    }
}

/// One CSV line, quoted and terminated.
fn encode_row<T: AsRef<[u8]>>(fields: &[T]) -> io::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(fields).map_err(io::Error::from)?;
    writer.into_inner().map_err(|e| e.into_error())
}

/// Writes every record to `path`. Row failures are logged and counted.
pub fn write_csv(path: &Path, records: &[ProductRecord]) -> Result<SinkReport> {
    let mut sink = CsvSink::create(path)?;
    for record in records {
        if let Err(e) = sink.write(record) {
            warn!("{}", e);
        }
    }
    let (rows_written, rows_skipped) = sink.finish()?;
    info!("Wrote {} rows to {}", rows_written, path.display());
    Ok(SinkReport {
        path: path.to_path_buf(),
        rows_written,
        rows_skipped,
    })
}

/// The row for `record`, in [`HEADER`] order.
pub fn record_row(record: &ProductRecord) -> [String; 14] {
    [
        record.id.clone(),
        record.url.clone(),
        record.name.clone(),
        record.price.clone(),
        record.image_url.clone(),
        record.breadcrumbs.join(BREADCRUMB_SEPARATOR),
        record.description.clone(),
        record.description_items.join(ITEM_SEPARATOR),
        record.sizes.join(LIST_SEPARATOR),
        record.size_note.clone(),
        record.keywords.join(LIST_SEPARATOR),
        record.size_chart.clone(),
        record.reviews.clone(),
        record.coordinates.clone(),
    ]
}

/// Reads a file written by [`write_csv`] back into records.
pub fn read_csv(path: &Path) -> Result<Vec<ProductRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(io::Error::from)?;
    let headers = reader.headers().map_err(io::Error::from)?.clone();
    if headers.iter().ne(HEADER.iter().copied()) {
        return Err(ScanError::Other(format!(
            "{} does not have the expected header",
            path.display()
        )));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(io::Error::from)?;
        let col = |i: usize| row.get(i).unwrap_or_default().to_string();
        records.push(ProductRecord {
            id: col(0),
            url: col(1),
            name: col(2),
            price: col(3),
            image_url: col(4),
            breadcrumbs: split_list(&col(5), BREADCRUMB_SEPARATOR),
            description: col(6),
            description_items: split_list(&col(7), ITEM_SEPARATOR),
            sizes: split_list(&col(8), LIST_SEPARATOR),
            size_note: col(9),
            keywords: split_list(&col(10), LIST_SEPARATOR),
            size_chart: col(11),
            reviews: col(12),
            coordinates: col(13),
        });
    }
    Ok(records)
}

fn split_list(joined: &str, separator: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(separator).map(str::to_string).collect()
}
