use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// One scraped product, the unit of output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub url: String,
    pub id: String,
    pub name: String,
    pub price: String,
    pub image_url: String,
    pub breadcrumbs: Vec<String>,
    pub description: String,
    pub description_items: Vec<String>,
    pub sizes: Vec<String>,
    pub size_note: String,
    pub keywords: Vec<String>,
    /// Serialized JSON: rows of column -> value maps.
    pub size_chart: String,
    /// Serialized JSON: rating, title, date, author, body per review.
    pub reviews: String,
    /// Serialized JSON: name, price, url, image_url per coordinated product.
    pub coordinates: String,
}

/// A writable attribute of [`ProductRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Price,
    ImageUrl,
    Breadcrumbs,
    Description,
    DescriptionItems,
    Sizes,
    SizeNote,
    Keywords,
    SizeChart,
    Reviews,
    Coordinates,
}

impl ProductRecord {
    /// Starts an empty record. The identifier is filled in here so it
    /// survives even if every later step fails.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let id = derive_identifier(&url);
        Self {
            url,
            id,
            ..Default::default()
        }
    }

    /// Stores an extracted value into the given field. `Null` leaves the
    /// field untouched.
    pub fn apply(&mut self, field: Field, value: Value) {
        if value.is_null() {
            return;
        }
        match field {
            Field::Name => self.name = into_text(value),
            Field::Price => self.price = into_text(value),
            Field::ImageUrl => self.image_url = into_text(value),
            Field::Description => self.description = into_text(value),
            Field::SizeNote => self.size_note = into_text(value),
            Field::Breadcrumbs => self.breadcrumbs = into_list(value),
            Field::DescriptionItems => self.description_items = into_list(value),
            Field::Sizes => self.sizes = into_list(value),
            Field::Keywords => self.keywords = into_list(value),
            Field::SizeChart => self.size_chart = value.to_string(),
            Field::Reviews => self.reviews = value.to_string(),
            Field::Coordinates => self.coordinates = value.to_string(),
        }
    }
}

/// Last non-empty path segment of `url`, e.g. `https://site/x/y/12345/` -> `12345`.
///
/// Inputs that do not parse as absolute URLs get the same treatment on the
/// raw string with query and fragment removed. Returns an empty string when
/// there is no path segment at all.
pub fn derive_identifier(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => last_segment(parsed.path()),
        Err(_) => {
            let raw = url.split(['?', '#']).next().unwrap_or(url);
            last_segment(raw)
        }
    }
}

fn last_segment(path: &str) -> String {
    path.split('/')
        .rfind(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn into_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(into_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// Scalar strings are treated as comma separated lists (meta keywords).
fn into_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(into_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_with_trailing_slash() {
        assert_eq!(derive_identifier("https://site/x/y/12345/"), "12345");
    }

    #[test]
    fn test_identifier_without_trailing_slash() {
        assert_eq!(derive_identifier("https://site/x/y/12345"), "12345");
    }

    #[test]
    fn test_identifier_ignores_query_and_fragment() {
        assert_eq!(
            derive_identifier("https://shop.example.jp/products/HQ1234/?color=red#reviews"),
            "HQ1234"
        );
    }

    #[test]
    fn test_identifier_relative_path() {
        assert_eq!(derive_identifier("/products/IF5678//"), "IF5678");
    }

    #[test]
    fn test_identifier_no_path() {
        assert_eq!(derive_identifier("https://site/"), "");
    }

    #[test]
    fn test_new_record_carries_identifier() {
        let record = ProductRecord::new("https://site/products/ABC123/");
        assert_eq!(record.id, "ABC123");
        assert_eq!(record.url, "https://site/products/ABC123/");
        assert!(record.name.is_empty());
    }

    #[test]
    fn test_apply_scalars_and_lists() {
        let mut record = ProductRecord::new("https://site/p/1/");
        record.apply(Field::Name, json!("Ultraboost"));
        record.apply(Field::Sizes, json!(["26.0cm", "", "27.0cm"]));
        record.apply(Field::Keywords, json!("running, shoes ,,boost"));
        record.apply(Field::Price, Value::Null);

        assert_eq!(record.name, "Ultraboost");
        assert_eq!(record.sizes, vec!["26.0cm", "27.0cm"]);
        assert_eq!(record.keywords, vec!["running", "shoes", "boost"]);
        assert!(record.price.is_empty());
    }

    #[test]
    fn test_apply_blob_is_compact_json() {
        let mut record = ProductRecord::new("https://site/p/1/");
        record.apply(Field::SizeChart, json!([{"size": "S", "chest": "88"}]));
        assert_eq!(record.size_chart, r#"[{"chest":"88","size":"S"}]"#);
    }
}
