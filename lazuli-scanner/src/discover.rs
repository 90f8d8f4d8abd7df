use crate::error::{Result, ScanError};
use crate::renderer::{RendererSession, Step};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Ordered, duplicate-free list of detail-page URLs in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryResult {
    urls: Vec<String>,
    seen: HashSet<String>,
}

impl DiscoveryResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `url` unless it was seen before. Returns whether it was added.
    pub fn insert(&mut self, url: String) -> bool {
        if self.seen.insert(url.clone()) {
            self.urls.push(url);
            true
        } else {
            false
        }
    }

    /// Keeps the first `max` URLs.
    pub fn truncate(&mut self, max: usize) {
        for dropped in self.urls.drain(max.min(self.urls.len())..) {
            self.seen.remove(&dropped);
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn into_urls(self) -> Vec<String> {
        self.urls
    }
}

impl FromIterator<String> for DiscoveryResult {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut result = Self::new();
        for url in iter {
            result.insert(url);
        }
        result
    }
}

/// Collects detail-page links from an incrementally loading listing page.
#[derive(Debug, Clone)]
pub struct LinkDiscoverer {
    anchor_selector: String,
    max_scrolls: usize,
    scroll_pause: Duration,
}

impl LinkDiscoverer {
    pub fn new(anchor_selector: impl Into<String>) -> Self {
        Self {
            anchor_selector: anchor_selector.into(),
            max_scrolls: 5,
            scroll_pause: Duration::from_millis(1500),
        }
    }

    pub fn with_max_scrolls(mut self, max_scrolls: usize) -> Self {
        self.max_scrolls = max_scrolls;
        self
    }

    pub fn with_scroll_pause(mut self, pause: Duration) -> Self {
        self.scroll_pause = pause;
        self
    }

    /// Navigates to the listing, triggers up to `max_scrolls` loads, then
    /// extracts every detail anchor in one pass.
    pub async fn discover<S: RendererSession>(
        &self,
        session: &mut S,
        listing_url: &str,
    ) -> Result<DiscoveryResult> {
        info!("Discovering product links on {}", listing_url);

        let base = Url::parse(listing_url).map_err(|e| ScanError::Discovery {
            url: listing_url.to_string(),
            reason: format!("invalid listing URL: {}", e),
        })?;

        session
            .run(&Step::Navigate(listing_url.to_string()))
            .await
            .map_err(|e| ScanError::Discovery {
                url: listing_url.to_string(),
                reason: e.to_string(),
            })?;

        for round in 1..=self.max_scrolls {
            debug!("Load-more round {}/{}", round, self.max_scrolls);
            if let Err(e) = session.run(&Step::ScrollToBottom).await {
                warn!("Load-more failed on round {}, stopping early: {}", round, e);
                break;
            }
            if let Err(e) = session.run(&Step::Pause(self.scroll_pause)).await {
                warn!("Pause failed on round {}, stopping early: {}", round, e);
                break;
            }
        }

        let anchors = session
            .run(&Step::AttrAll {
                selector: self.anchor_selector.clone(),
                attr: "href".to_string(),
            })
            .await
            .map_err(|e| ScanError::Discovery {
                url: listing_url.to_string(),
                reason: e.to_string(),
            })?;

        let hrefs = match anchors {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(ScanError::Discovery {
                    url: listing_url.to_string(),
                    reason: format!("unexpected anchor payload: {}", other),
                });
            }
        };

        let result: DiscoveryResult = hrefs
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|href| resolve_link(&base, href))
            .collect();

        info!("Discovered {} unique product links", result.len());
        Ok(result)
    }
}

/// Absolute form of `href` without its fragment. Skips non-navigational
/// links.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
