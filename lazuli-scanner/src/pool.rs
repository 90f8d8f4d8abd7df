use crate::aggregate::{self, JobFailure, JobOutcome};
use crate::discover::DiscoveryResult;
use crate::error::{Result, ScanError};
use crate::extract::ExtractionSequence;
use crate::record::ProductRecord;
use crate::renderer::{Renderer, RendererSession};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// One detail page to scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub index: usize,
    pub url: String,
}

#[derive(Debug, Default)]
pub struct PoolReport {
    /// Number of jobs enqueued after applying the job cap.
    pub jobs: usize,
    pub records: Vec<ProductRecord>,
    pub failures: Vec<JobFailure>,
}

type JobQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Fixed-size worker pool. Each worker owns one renderer session for its
/// whole lifetime and runs one job at a time.
pub struct Dispatcher<R: Renderer> {
    renderer: Arc<R>,
    sequence: Arc<ExtractionSequence>,
    workers: usize,
    job_timeout: Duration,
    max_jobs: usize,
    progress_callback: Option<ProgressCallback>,
}

impl<R: Renderer> Dispatcher<R> {
    pub fn new(renderer: Arc<R>, sequence: ExtractionSequence) -> Self {
        Self {
            renderer,
            sequence: Arc::new(sequence),
            workers: 4,
            job_timeout: Duration::from_secs(60),
            max_jobs: 250,
            progress_callback: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Scrapes every URL (up to the job cap) and returns all outcomes.
    ///
    /// Every enqueued job ends up either in `records` or in `failures`.
    /// Cancelling `cancel` abandons in-flight jobs and fails the rest.
    pub async fn run(&self, mut urls: DiscoveryResult, cancel: CancellationToken) -> Result<PoolReport> {
        urls.truncate(self.max_jobs);
        let total = urls.len();
        if total == 0 {
            return Ok(PoolReport::default());
        }
        let workers = self.workers.clamp(1, total);
        info!("Dispatching {} jobs to {} workers", total, workers);

        // Fill once, then close: workers stop when the queue runs dry.
        let (job_tx, job_rx) = mpsc::channel::<Job>(total);
        for (index, url) in urls.into_urls().into_iter().enumerate() {
            job_tx
                .try_send(Job { index, url })
                .map_err(|e| ScanError::Other(format!("job queue rejected a job: {}", e)))?;
        }
        drop(job_tx);
        let job_rx: JobQueue = Arc::new(Mutex::new(job_rx));

        let (result_tx, result_rx) = mpsc::channel::<JobOutcome>(total);
        let mut worker_handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let handle = tokio::spawn(run_worker(
                worker_id,
                self.renderer.clone(),
                self.sequence.clone(),
                job_rx.clone(),
                result_tx.clone(),
                self.job_timeout,
                self.progress_callback.clone(),
                cancel.clone(),
            ));
            worker_handles.push(handle);
        }
        // The results channel closes once the last worker drops its sender.
        drop(result_tx);

        let mut collected = aggregate::collect(result_rx).await;

        for handle in worker_handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }

        // Jobs nobody picked up, e.g. when no worker could open a session.
        let mut queue = job_rx.lock().await;
        while let Ok(job) = queue.try_recv() {
            warn!("Job for {} was never run", job.url);
            collected.failures.push(JobFailure {
                url: job.url,
                reason: "no worker available".to_string(),
            });
        }

        info!(
            "Pool finished: {} records, {} failures",
            collected.records.len(),
            collected.failures.len()
        );
        Ok(PoolReport {
            jobs: total,
            records: collected.records,
            failures: collected.failures,
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_worker<R: Renderer>(
    worker_id: usize,
    renderer: Arc<R>,
    sequence: Arc<ExtractionSequence>,
    jobs: JobQueue,
    results: mpsc::Sender<JobOutcome>,
    job_timeout: Duration,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
) {
    let mut session = match renderer.open_session().await {
        Ok(session) => session,
        Err(e) => {
            warn!("Worker {} could not open a renderer session: {}", worker_id, e);
            return;
        }
    };
    debug!("Worker {} started", worker_id);

    loop {
        let job = jobs.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        if let Some(ref callback) = progress {
            callback(worker_id, job.url.clone());
        }

        let outcome = match run_job(&sequence, &mut session, &job, job_timeout, &cancel).await {
            Ok(record) => {
                debug!("[Worker {}] Scraped {}", worker_id, job.url);
                JobOutcome::Scraped(record)
            }
            Err(e) => {
                warn!("Scrape failed for {}: {}", job.url, e);
                JobOutcome::Failed(JobFailure {
                    url: job.url,
                    reason: e.to_string(),
                })
            }
        };

        if results.send(outcome).await.is_err() {
            warn!("Worker {} lost the result channel", worker_id);
            break;
        }
    }

    if let Err(e) = session.close().await {
        warn!("Worker {} failed to close its session: {}", worker_id, e);
    }
    debug!("Worker {} finished", worker_id);
}

/// Runs the extraction under the job deadline and the run's cancellation.
async fn run_job<S: RendererSession>(
    sequence: &ExtractionSequence,
    session: &mut S,
    job: &Job,
    job_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ProductRecord> {
    let token = cancel.child_token();
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ScanError::Cancelled),
        outcome = tokio::time::timeout(job_timeout, sequence.extract(session, &job.url)) => {
            match outcome {
                Ok(result) => result,
                Err(_) => Err(ScanError::Timeout(job_timeout)),
            }
        }
    }
}
