use crate::record::ProductRecord;
use tokio::sync::mpsc;

/// A job that produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub url: String,
    pub reason: String,
}

/// What one job sends to the aggregator, exactly once.
#[derive(Debug)]
pub enum JobOutcome {
    Scraped(ProductRecord),
    Failed(JobFailure),
}

#[derive(Debug, Default)]
pub struct Collected {
    pub records: Vec<ProductRecord>,
    pub failures: Vec<JobFailure>,
}

/// Drains `results` until every sender has been dropped.
///
/// Records arrive in completion order, which is not discovery order.
pub async fn collect(mut results: mpsc::Receiver<JobOutcome>) -> Collected {
    let mut collected = Collected::default();
    while let Some(outcome) = results.recv().await {
        match outcome {
            JobOutcome::Scraped(record) => collected.records.push(record),
            JobOutcome::Failed(failure) => collected.failures.push(failure),
        }
    }
    collected
}
