//! Extraction stage: submit an analysis job and poll it to completion.
//!
//! Document analysis is asynchronous on the service side: a request returns
//! a job id immediately and the result is fetched once the job reports a
//! terminal status. The only suspension point of the whole pipeline is the
//! fixed-interval sleep between two status queries.
//!
//! ## Bounded polling
//!
//! [`poll_job`] queries at most `max_poll_attempts` times and returns a typed
//! [`PollOutcome`]. A job that never finishes surfaces as
//! [`InvoiceError::PollTimeout`] instead of hanging the run.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::pipeline::response::RawResponse;
use crate::pipeline::upload::RemoteLocation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Status of an analysis job as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Succeeded,
    Failed { reason: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }
}

/// One in-flight call to the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: String,
    pub source: RemoteLocation,
    pub status: JobStatus,
}

/// The asynchronous document-analysis service.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Submit a table + form analysis of `source`; returns the job id.
    async fn start_analysis(&self, source: &RemoteLocation) -> Result<String, InvoiceError>;

    /// Query the current status of a job.
    async fn job_status(&self, job_id: &str) -> Result<JobStatus, InvoiceError>;

    /// Fetch the complete result of a succeeded job, all pages merged.
    async fn fetch_result(&self, job_id: &str) -> Result<RawResponse, InvoiceError>;
}

/// How a polling loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded,
    Failed(String),
    TimedOut { attempts: u32, elapsed_ms: u64 },
}

/// Submit a job for `source`.
pub async fn submit_job(
    analyzer: &dyn DocumentAnalyzer,
    source: &RemoteLocation,
) -> Result<ExtractionJob, InvoiceError> {
    let id = analyzer.start_analysis(source).await?;
    info!("Submitted analysis job {} for {}", id, source);
    Ok(ExtractionJob {
        id,
        source: source.clone(),
        status: JobStatus::InProgress,
    })
}

/// Poll `job` every `interval` until it is terminal or `max_attempts` queries
/// have been made. The job's status is updated in place.
///
/// Errors from the status query itself (network, auth) abort the loop and
/// are returned as-is; they are not retried.
pub async fn poll_job(
    analyzer: &dyn DocumentAnalyzer,
    job: &mut ExtractionJob,
    interval: Duration,
    max_attempts: u32,
) -> Result<PollOutcome, InvoiceError> {
    let start = Instant::now();
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        job.status = analyzer.job_status(&job.id).await?;
        debug!(
            "Job {}: poll {}/{} → {:?}",
            job.id, attempt, max_attempts, job.status
        );

        match &job.status {
            JobStatus::Succeeded => return Ok(PollOutcome::Succeeded),
            JobStatus::Failed { reason } => return Ok(PollOutcome::Failed(reason.clone())),
            JobStatus::InProgress if attempt < max_attempts => sleep(interval).await,
            JobStatus::InProgress => {}
        }
    }

    let elapsed_ms = start.elapsed().as_millis() as u64;
    warn!(
        "Job {} still in progress after {} polls ({}ms)",
        job.id, max_attempts, elapsed_ms
    );
    Ok(PollOutcome::TimedOut {
        attempts: max_attempts,
        elapsed_ms,
    })
}

/// Run one document through the analysis service: submit, poll, fetch.
///
/// Returns the finished job together with its complete response, or
/// [`InvoiceError::ExtractionFailed`] / [`InvoiceError::PollTimeout`].
pub async fn extract_document(
    analyzer: &dyn DocumentAnalyzer,
    source: &RemoteLocation,
    config: &ExtractionConfig,
    on_submitted: impl FnOnce(&str),
) -> Result<(ExtractionJob, RawResponse), InvoiceError> {
    let mut job = submit_job(analyzer, source).await?;
    on_submitted(&job.id);

    let interval = Duration::from_millis(config.poll_interval_ms);
    match poll_job(analyzer, &mut job, interval, config.max_poll_attempts).await? {
        PollOutcome::Succeeded => {
            let response = analyzer.fetch_result(&job.id).await?;
            debug!("Job {}: {} blocks", job.id, response.blocks.len());
            Ok((job, response))
        }
        PollOutcome::Failed(reason) => Err(InvoiceError::ExtractionFailed {
            job_id: job.id,
            reason,
        }),
        PollOutcome::TimedOut {
            attempts,
            elapsed_ms,
        } => Err(InvoiceError::PollTimeout {
            job_id: job.id,
            attempts,
            elapsed_ms,
        }),
    }
}
