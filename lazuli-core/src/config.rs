// Run configuration: defaults, JSON file loading and validation

use lazuli_scanner::{DetailSelectors, ExtractionPolicy, RemoteOptions, SessionProfile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "LAZULI_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How product records are acquired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    /// Discover detail pages and scrape each one through the worker pool.
    #[default]
    Rendered,
    /// One remote rendering API call; records come from the captured feed.
    Remote,
}

impl AcquisitionMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "rendered" | "render" => Some(AcquisitionMode::Rendered),
            "remote" | "api" => Some(AcquisitionMode::Remote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    pub max_scrolls: usize,
    pub scroll_pause_ms: u64,
    pub anchor_selector: String,
    pub load_more_selector: Option<String>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_scrolls: 5,
            scroll_pause_ms: 1500,
            anchor_selector: ".articleDisplayCard-children a[href*='/products/']".to_string(),
            load_more_selector: Some(".pagination .next a".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub workers: usize,
    pub max_jobs: usize,
    pub job_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            max_jobs: 250,
            job_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub user_agent: String,
    pub headless: bool,
    pub request_timeout_secs: u64,
    pub accept_language: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let profile = SessionProfile::default();
        Self {
            user_agent: profile.user_agent,
            headless: profile.headless,
            request_timeout_secs: profile.request_timeout.as_secs(),
            accept_language: profile.accept_language,
        }
    }
}

impl SessionSettings {
    pub fn profile(&self) -> SessionProfile {
        SessionProfile {
            user_agent: self.user_agent.clone(),
            headless: self.headless,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            accept_language: self.accept_language.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub policy: ExtractionPolicy,
    /// Upper bound for each wait-for-element step.
    pub wait_timeout_secs: u64,
    pub selectors: DetailSelectors,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            policy: ExtractionPolicy::default(),
            wait_timeout_secs: 10,
            selectors: DetailSelectors::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub api_key: Option<String>,
    #[serde(flatten)]
    pub options: RemoteOptions,
    /// Where to keep the raw capture, if anywhere.
    pub capture_dump: Option<String>,
}

impl RemoteSettings {
    /// The configured key, falling back to the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub listing_url: String,
    pub mode: AcquisitionMode,
    pub output: String,
    pub discovery: DiscoverySettings,
    pub pool: PoolSettings,
    pub session: SessionSettings,
    pub extraction: ExtractionSettings,
    pub remote: RemoteSettings,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://shop.adidas.jp/men/".to_string(),
            mode: AcquisitionMode::default(),
            output: "csv/products.csv".to_string(),
            discovery: DiscoverySettings::default(),
            pool: PoolSettings::default(),
            session: SessionSettings::default(),
            extraction: ExtractionSettings::default(),
            remote: RemoteSettings::default(),
        }
    }
}

impl ScrapeConfig {
    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let listing = Url::parse(&self.listing_url)
            .map_err(|e| ConfigError::Invalid(format!("listing URL '{}': {}", self.listing_url, e)))?;
        if !matches!(listing.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "listing URL '{}' must use http or https",
                self.listing_url
            )));
        }
        if self.pool.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.pool.max_jobs == 0 {
            return Err(ConfigError::Invalid("max_jobs must be at least 1".to_string()));
        }
        if self.pool.job_timeout_secs == 0 {
            return Err(ConfigError::Invalid("job timeout must be at least 1 second".to_string()));
        }
        if self.session.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.output.trim().is_empty() {
            return Err(ConfigError::Invalid("output path is empty".to_string()));
        }
        Ok(())
    }

    /// Output path with `~` and environment variables expanded.
    pub fn output_path(&self) -> PathBuf {
        expand_path(&self.output)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.pool.job_timeout_secs)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.discovery.scroll_pause_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction.wait_timeout_secs)
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(path),
    }
}
