use crate::acquisition;
use crate::config::{AcquisitionMode, ScrapeConfig};
use crate::output::{self, SinkReport};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use lazuli_scanner::error::Result;
use lazuli_scanner::{JobFailure, ProgressCallback};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Options for a single scrape run
pub struct ScrapeOptions {
    pub config: ScrapeConfig,
    pub show_progress_bars: bool,
}

/// What a finished run produced
#[derive(Debug)]
pub struct ScrapeSummary {
    pub mode: AcquisitionMode,
    pub discovered: usize,
    pub jobs: usize,
    pub records: usize,
    pub failures: Vec<JobFailure>,
    pub sink: SinkReport,
}

/// Execute a scrape: acquire records, then write them as CSV.
pub async fn execute_scrape(options: ScrapeOptions, cancel: CancellationToken) -> Result<ScrapeSummary> {
    let ScrapeOptions {
        config,
        show_progress_bars,
    } = options;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Loading {}...", config.listing_url));
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(Arc::new(pb))
    } else {
        None
    };

    let processed = Arc::new(AtomicUsize::new(0));
    let progress_callback: Option<ProgressCallback> = progress_bar.clone().map(|pb| {
        let processed = processed.clone();
        Arc::new(move |_worker_id: usize, _url: String| {
            let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
            pb.set_message(format!("Scraping... {} pages started", count));
        }) as ProgressCallback
    });

    let outcome = match acquisition::from_config(&config, progress_callback) {
        Ok(acquisition) => acquisition.acquire(cancel).await,
        Err(e) => Err(e),
    };

    let harvest = match outcome {
        Ok(harvest) => harvest,
        Err(e) => {
            if let Some(ref pb) = progress_bar {
                pb.finish_and_clear();
            }
            return Err(e);
        }
    };

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Scrape complete! {} records from {} links",
            harvest.records.len(),
            harvest.discovered
        ));
    }

    let path = config.output_path();
    let sink = output::write_csv(&path, &harvest.records)?;
    info!(
        "Run finished: {} links, {} records, {} failures",
        harvest.discovered,
        harvest.records.len(),
        harvest.failures.len()
    );

    Ok(ScrapeSummary {
        mode: config.mode,
        discovered: harvest.discovered,
        jobs: harvest.jobs,
        records: harvest.records.len(),
        failures: harvest.failures,
        sink,
    })
}

/// Generate the end-of-run summary shown to the user
pub fn generate_scrape_report(summary: &ScrapeSummary) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    let links_label = match summary.mode {
        AcquisitionMode::Rendered => "Links discovered",
        AcquisitionMode::Remote => "Products in feed",
    };
    report.push_str(&format!("  {}: {}\n", links_label, summary.discovered));
    if summary.mode == AcquisitionMode::Rendered {
        report.push_str(&format!("  Pages scraped: {}\n", summary.jobs));
    }
    report.push_str(&format!(
        "  Records: {}\n",
        summary.records.to_string().green()
    ));

    let failures = summary.failures.len();
    let failures_text = if failures > 0 {
        failures.to_string().yellow()
    } else {
        failures.to_string().normal()
    };
    report.push_str(&format!("  Job failures: {}\n", failures_text));

    if summary.sink.rows_skipped > 0 {
        report.push_str(&format!(
            "  Rows skipped: {}\n",
            summary.sink.rows_skipped.to_string().yellow()
        ));
    }
    report.push_str(&format!(
        "  Output: {} ({} rows)\n",
        summary.sink.path.display(),
        summary.sink.rows_written
    ));

    if failures > 0 {
        report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
        report.push_str("## Failed pages\n");
        for failure in &summary.failures {
            report.push_str(&format!("  {} {}\n", "✗".red(), failure.url));
            report.push_str(&format!("    {}\n", failure.reason.dimmed()));
        }
    }

    report.push('\n');
    report
}
