// The two ways of turning a listing page into product records

use crate::config::{AcquisitionMode, ScrapeConfig, expand_path};
use async_trait::async_trait;
use lazuli_scanner::error::{Result, ScanError};
use lazuli_scanner::{
    Capture, Dispatcher, ExtractionSequence, HttpRenderer, JobFailure, LinkDiscoverer,
    ProductRecord, ProgressCallback, RemoteCaptureClient, Renderer, RendererSession,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything one acquisition produced.
#[derive(Debug, Default)]
pub struct Harvest {
    /// Unique product links found (remote mode: products in the feed).
    pub discovered: usize,
    /// Detail pages dispatched to workers.
    pub jobs: usize,
    pub records: Vec<ProductRecord>,
    pub failures: Vec<JobFailure>,
}

#[async_trait]
pub trait Acquisition: Send + Sync {
    /// Run-fatal problems (listing unreachable, no links, transport) are
    /// errors; individual job failures are reported in the harvest.
    async fn acquire(&self, cancel: CancellationToken) -> Result<Harvest>;
}

/// Builds the acquisition selected by `config.mode`.
pub fn from_config(
    config: &ScrapeConfig,
    progress: Option<ProgressCallback>,
) -> Result<Box<dyn Acquisition>> {
    match config.mode {
        AcquisitionMode::Rendered => Ok(Box::new(RenderedAcquisition::from_config(config, progress))),
        AcquisitionMode::Remote => Ok(Box::new(RemoteAcquisition::from_config(config)?)),
    }
}

// ============================================================================
// Rendered: discover, then scrape every detail page
// ============================================================================

pub struct RenderedAcquisition<R: Renderer> {
    renderer: Arc<R>,
    listing_url: String,
    discoverer: LinkDiscoverer,
    dispatcher: Dispatcher<R>,
}

impl RenderedAcquisition<HttpRenderer> {
    pub fn from_config(config: &ScrapeConfig, progress: Option<ProgressCallback>) -> Self {
        let mut renderer = HttpRenderer::new(config.session.profile());
        if let Some(selector) = &config.discovery.load_more_selector {
            renderer = renderer.with_load_more(selector.clone());
        }
        let renderer = Arc::new(renderer);

        let discoverer = LinkDiscoverer::new(config.discovery.anchor_selector.clone())
            .with_max_scrolls(config.discovery.max_scrolls)
            .with_scroll_pause(config.scroll_pause());

        let sequence =
            ExtractionSequence::product_detail(&config.extraction.selectors, config.wait_timeout())
                .with_policy(config.extraction.policy);

        let mut dispatcher = Dispatcher::new(renderer.clone(), sequence)
            .with_workers(config.pool.workers)
            .with_max_jobs(config.pool.max_jobs)
            .with_job_timeout(config.job_timeout());
        if let Some(callback) = progress {
            dispatcher = dispatcher.with_progress_callback(callback);
        }

        Self::new(renderer, config.listing_url.clone(), discoverer, dispatcher)
    }
}

impl<R: Renderer> RenderedAcquisition<R> {
    pub fn new(
        renderer: Arc<R>,
        listing_url: impl Into<String>,
        discoverer: LinkDiscoverer,
        dispatcher: Dispatcher<R>,
    ) -> Self {
        Self {
            renderer,
            listing_url: listing_url.into(),
            discoverer,
            dispatcher,
        }
    }
}

#[async_trait]
impl<R: Renderer> Acquisition for RenderedAcquisition<R> {
    async fn acquire(&self, cancel: CancellationToken) -> Result<Harvest> {
        let mut session =
            self.renderer
                .open_session()
                .await
                .map_err(|e| ScanError::Discovery {
                    url: self.listing_url.clone(),
                    reason: format!("cannot open renderer session: {}", e),
                })?;

        let discovered = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            result = self.discoverer.discover(&mut session, &self.listing_url) => result,
        };
        if let Err(e) = session.close().await {
            warn!("Failed to close discovery session: {}", e);
        }
        let discovered = discovered?;

        if discovered.is_empty() {
            return Err(ScanError::Discovery {
                url: self.listing_url.clone(),
                reason: "no product links found".to_string(),
            });
        }

        let count = discovered.len();
        let report = self.dispatcher.run(discovered, cancel).await?;
        Ok(Harvest {
            discovered: count,
            jobs: report.jobs,
            records: report.records,
            failures: report.failures,
        })
    }
}

// ============================================================================
// Remote: one capture, records from the product feed exchange
// ============================================================================

pub struct RemoteAcquisition {
    client: RemoteCaptureClient,
    listing_url: String,
    capture_dump: Option<PathBuf>,
}

impl RemoteAcquisition {
    pub fn from_config(config: &ScrapeConfig) -> Result<Self> {
        let api_key = config.remote.resolve_api_key().ok_or_else(|| {
            ScanError::Transport(format!(
                "no API key configured (set remote.api_key or {})",
                crate::config::API_KEY_ENV
            ))
        })?;
        let client = RemoteCaptureClient::new(api_key, config.remote.options.clone())?;
        let capture_dump = config.remote.capture_dump.as_deref().map(expand_path);
        Ok(Self::new(client, config.listing_url.clone(), capture_dump))
    }

    pub fn new(
        client: RemoteCaptureClient,
        listing_url: impl Into<String>,
        capture_dump: Option<PathBuf>,
    ) -> Self {
        Self {
            client,
            listing_url: listing_url.into(),
            capture_dump,
        }
    }
}

#[async_trait]
impl Acquisition for RemoteAcquisition {
    async fn acquire(&self, cancel: CancellationToken) -> Result<Harvest> {
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            raw = self.client.fetch_raw(&self.listing_url) => raw?,
        };

        if let Some(path) = &self.capture_dump {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, &raw).await?;
            info!("Saved raw capture to {}", path.display());
        }

        let options = self.client.options();
        let records = Capture::parse(&raw)?
            .product_records(&options.data_endpoint_pattern, &options.site_base)?;
        if records.is_empty() {
            return Err(ScanError::Discovery {
                url: self.listing_url.clone(),
                reason: "no products in feed".to_string(),
            });
        }
        Ok(Harvest {
            discovered: records.len(),
            jobs: 0,
            records,
            failures: Vec::new(),
        })
    }
}
