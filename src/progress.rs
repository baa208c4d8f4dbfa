//! Progress-callback trait for per-file run events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline uploads, analyses and maps each invoice.
//!
//! # Example
//!
//! ```rust
//! use invoice2csv::{ExtractionConfig, RunProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rows: Arc<AtomicUsize>,
//! }
//!
//! impl RunProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, file_num: usize, total_files: usize, records: usize) {
//!         self.rows.fetch_add(records, Ordering::SeqCst);
//!         eprintln!("File {}/{}: {} rows", file_num, total_files, records);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     rows: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .remote_upload_path("s3://bucket/invoices/")
//!     .progress_callback(counter as Arc<dyn RunProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the run loop as it processes each input file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Files are processed one at a time, but the trait is
/// `Send + Sync` so a callback can be shared with other tasks (a progress
/// bar ticker, a status endpoint).
pub trait RunProgressCallback: Send + Sync {
    /// Called once after inputs are resolved, before any upload.
    fn on_run_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a file is uploaded.
    ///
    /// # Arguments
    /// * `file_num`    — 1-indexed position in the run
    /// * `total_files` — number of files in the run
    /// * `path`        — the local PDF
    fn on_file_start(&self, file_num: usize, total_files: usize, path: &Path) {
        let _ = (file_num, total_files, path);
    }

    /// Called once the analysis service accepted the job.
    fn on_job_submitted(&self, file_num: usize, job_id: &str) {
        let _ = (file_num, job_id);
    }

    /// Called when a file's records have been written.
    fn on_file_complete(&self, file_num: usize, total_files: usize, records: usize) {
        let _ = (file_num, total_files, records);
    }

    /// Called when a file fails; no rows were written for it.
    fn on_file_error(&self, file_num: usize, total_files: usize, error: &str) {
        let _ = (file_num, total_files, error);
    }

    /// Called once after every file has been attempted.
    fn on_run_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
