//! Remote rendering API acquisition.
//!
//! One API call renders the listing page remotely and returns the document
//! together with every background (XHR) exchange the page made. Product data
//! is read from the exchange whose address matches the data endpoint.

use crate::error::{Result, ScanError};
use crate::record::ProductRecord;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteOptions {
    pub endpoint: String,
    pub js_render: bool,
    pub premium_proxy: bool,
    pub proxy_country: Option<String>,
    /// JSON array of browser instructions, passed through verbatim.
    pub js_instructions: Option<String>,
    /// Substring identifying the product feed exchange.
    pub data_endpoint_pattern: String,
    /// Prefix for site-relative product links.
    pub site_base: String,
    pub timeout_secs: u64,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            endpoint: "https://api.zenrows.com/v1/".to_string(),
            js_render: true,
            premium_proxy: true,
            proxy_country: Some("us".to_string()),
            js_instructions: None,
            data_endpoint_pattern: "recs/api/products".to_string(),
            site_base: "https://www.adidas.jp".to_string(),
            timeout_secs: 180,
        }
    }
}

pub struct RemoteCaptureClient {
    client: Client,
    api_key: String,
    options: RemoteOptions,
}

impl RemoteCaptureClient {
    pub fn new(api_key: impl Into<String>, options: RemoteOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| ScanError::Transport(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            options,
        })
    }

    pub fn options(&self) -> &RemoteOptions {
        &self.options
    }

    /// Requests a capture of `target_url` and returns the raw JSON body.
    pub async fn fetch_raw(&self, target_url: &str) -> Result<String> {
        let mut query: Vec<(&str, String)> = vec![
            ("apikey", self.api_key.clone()),
            ("url", target_url.to_string()),
            ("json_response", "true".to_string()),
        ];
        if self.options.js_render {
            query.push(("js_render", "true".to_string()));
        }
        if let Some(instructions) = &self.options.js_instructions {
            query.push(("js_instructions", instructions.clone()));
        }
        if self.options.premium_proxy {
            query.push(("premium_proxy", "true".to_string()));
        }
        if let Some(country) = &self.options.proxy_country {
            query.push(("proxy_country", country.clone()));
        }

        info!("Requesting remote capture of {}", target_url);
        let response = self
            .client
            .get(&self.options.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|e| ScanError::Transport(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Transport(format!("API returned non-OK status: {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| ScanError::Transport(format!("failed to read response body: {}", e)))
    }

    /// Captures `target_url` and turns its product feed into records.
    pub async fn fetch_records(&self, target_url: &str) -> Result<Vec<ProductRecord>> {
        let raw = self.fetch_raw(target_url).await?;
        let capture = Capture::parse(&raw)?;
        capture.product_records(&self.options.data_endpoint_pattern, &self.options.site_base)
    }
}

/// A rendered page plus its intercepted background exchanges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Capture {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub xhr: Vec<XhrExchange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct XhrExchange {
    pub url: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub status_code: Option<u16>,
}

impl Capture {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            let preview: String = raw.chars().take(50).collect();
            ScanError::Transport(format!("invalid capture JSON: {} (starts with {:?})", e, preview))
        })
    }

    /// Exchanges whose address contains `pattern`, in capture order.
    pub fn exchanges_matching<'a>(&'a self, pattern: &'a str) -> impl Iterator<Item = &'a XhrExchange> {
        self.xhr.iter().filter(move |exchange| exchange.url.contains(pattern))
    }

    /// First matching exchange whose body is a product feed.
    pub fn product_feed(&self, pattern: &str) -> Result<ProductFeed> {
        for exchange in self.exchanges_matching(pattern) {
            match serde_json::from_str::<ProductFeed>(&exchange.body) {
                Ok(feed) => return Ok(feed),
                Err(e) => debug!("Exchange {} is not a product feed: {}", exchange.url, e),
            }
        }
        Err(ScanError::Transport(format!(
            "no product data found in exchanges matching '{}'",
            pattern
        )))
    }

    pub fn product_records(&self, pattern: &str, site_base: &str) -> Result<Vec<ProductRecord>> {
        let feed = self.product_feed(pattern)?;
        let breadcrumbs: Vec<String> = feed
            .breadcrumbs
            .iter()
            .map(|crumb| crumb.text.clone())
            .filter(|text| !text.is_empty())
            .collect();
        info!("Found {} products in product feed", feed.recommendations.len());
        Ok(feed
            .recommendations
            .iter()
            .map(|product| product.to_record(&breadcrumbs, site_base))
            .collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductFeed {
    #[serde(default)]
    pub recommendations: Vec<FeedProduct>,
    #[serde(default, rename = "json_breadcrumbs")]
    pub breadcrumbs: Vec<Breadcrumb>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Breadcrumb {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub link: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedProduct {
    pub article_number: String,
    pub name: String,
    pub category: String,
    pub link: String,
    pub image_link: String,
    pub sub_title: String,
    pub sizes: Vec<String>,
    pub sport: String,
    pub surface: Vec<String>,
    pub brand: String,
    pub pricing: Pricing,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Pricing {
    pub current_price: f64,
}

impl FeedProduct {
    pub fn to_record(&self, breadcrumbs: &[String], site_base: &str) -> ProductRecord {
        let url = if self.link.starts_with("http") {
            self.link.clone()
        } else {
            format!("{}{}", site_base.trim_end_matches('/'), self.link)
        };

        let mut record = ProductRecord::new(url);
        if !self.article_number.is_empty() {
            record.id = self.article_number.clone();
        }
        record.name = self.name.clone();
        record.price = format!("{:.2}", self.pricing.current_price);
        record.image_url = self.image_link.clone();
        record.breadcrumbs = breadcrumbs.to_vec();
        record.description = self.sub_title.clone();
        record.sizes = self.sizes.clone();

        let mut keywords = Vec::new();
        if !self.sport.is_empty() {
            keywords.push(self.sport.clone());
        }
        keywords.extend(self.surface.iter().filter(|s| !s.is_empty()).cloned());
        for extra in [&self.brand, &self.category] {
            if !extra.is_empty() {
                keywords.push(extra.clone());
            }
        }
        record.keywords = keywords;
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_body() -> String {
        serde_json::json!({
            "recommendations": [{
                "articleNumber": "HQ1234",
                "name": "Samba OG",
                "category": "Shoes",
                "link": "/HQ1234.html",
                "imageLink": "https://img.example/hq1234.jpg",
                "subTitle": "Originals",
                "sizes": ["26.0", "27.0"],
                "sport": "Lifestyle",
                "surface": ["Street"],
                "brand": "Originals",
                "pricing": {"currentPrice": 14300.0}
            }],
            "json_breadcrumbs": [
                {"text": "Home", "link": "/", "type": "home"},
                {"text": "Men", "link": "/men/", "type": "category"}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_product_feed_is_found_by_pattern_not_position() {
        let capture = Capture {
            html: "<html></html>".to_string(),
            xhr: vec![
                XhrExchange {
                    url: "https://www.adidas.jp/api/metrics".to_string(),
                    body: "{}".to_string(),
                    status_code: Some(204),
                },
                XhrExchange {
                    url: "https://www.adidas.jp/recs/api/products?page=men".to_string(),
                    body: "not json".to_string(),
                    status_code: Some(200),
                },
                XhrExchange {
                    url: "https://www.adidas.jp/recs/api/products?page=men&v=2".to_string(),
                    body: feed_body(),
                    status_code: Some(200),
                },
            ],
        };

        let records = capture
            .product_records("recs/api/products", "https://www.adidas.jp/")
            .unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.url, "https://www.adidas.jp/HQ1234.html");
        assert_eq!(record.id, "HQ1234");
        assert_eq!(record.price, "14300.00");
        assert_eq!(record.breadcrumbs, vec!["Home", "Men"]);
        assert_eq!(record.keywords, vec!["Lifestyle", "Street", "Originals", "Shoes"]);
        assert_eq!(record.description, "Originals");
    }

    #[test]
    fn test_id_falls_back_to_link_without_article_number() {
        let product = FeedProduct {
            link: "/products/IF5678/".to_string(),
            ..Default::default()
        };
        let record = product.to_record(&[], "https://www.adidas.jp");
        assert_eq!(record.url, "https://www.adidas.jp/products/IF5678/");
        assert_eq!(record.id, "IF5678");
    }

    #[test]
    fn test_missing_feed_is_transport_error() {
        let capture = Capture::parse(r#"{"html": "", "xhr": [{"url": "https://x/other", "body": "{}"}]}"#).unwrap();
        let result = capture.product_feed("recs/api/products");
        assert!(matches!(result, Err(ScanError::Transport(_))));
    }

    #[test]
    fn test_invalid_capture_json() {
        assert!(matches!(Capture::parse("<html>"), Err(ScanError::Transport(_))));
    }
}
