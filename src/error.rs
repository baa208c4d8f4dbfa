//! Error types for the invoice2csv library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`InvoiceError`] — **Fatal** for the operation that returned it: a
//!   missing input file, an unreachable bucket, a failed analysis job, an
//!   unwritable CSV. Returned as `Err(InvoiceError)` from every stage and
//!   from [`crate::run::run`].
//!
//! * [`FileError`] — **Non-fatal** for a run: one invoice failed but the
//!   others are fine. Stored inside [`crate::output::FileResult`] so callers
//!   can report per-file outcomes instead of losing the whole batch.
//!
//! Every [`InvoiceError`] also reports an [`ErrorKind`], which collapses the
//! variants into the handful of categories an operator acts on: fix the
//! local file, fix the bucket credentials, look at the analysis job.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Broad category of an [`InvoiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Local file input or output failure.
    Io,
    /// Remote object storage unreachable or unauthorised.
    Upload,
    /// The analysis job failed, timed out, or its result could not be mapped.
    Extraction,
    /// Configuration is missing or invalid.
    Config,
    /// Anything else.
    Internal,
}

/// All fatal errors returned by the invoice2csv library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    /// A glob pattern given as input could not be parsed.
    #[error("Invalid input pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A saved analysis response could not be read from disk.
    #[error("Failed to read analysis response '{path}': {source}")]
    ResponseReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Upload errors ─────────────────────────────────────────────────────
    /// The remote upload path is not of the form `s3://bucket/prefix`.
    #[error("Invalid remote upload path '{path}': {reason}")]
    InvalidRemotePath { path: String, reason: String },

    /// Copying the PDF to remote storage failed.
    #[error("Failed to upload '{path}' to '{destination}': {reason}")]
    UploadFailed {
        path: PathBuf,
        destination: String,
        reason: String,
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The analysis service rejected or could not answer a request.
    #[error("Document analysis request failed for '{location}': {reason}")]
    AnalysisRequestFailed { location: String, reason: String },

    /// The analysis job finished with a failure status.
    #[error("Extraction job {job_id} failed: {reason}")]
    ExtractionFailed { job_id: String, reason: String },

    /// The job was still running after the maximum number of polls.
    #[error("Extraction job {job_id} still in progress after {attempts} polls ({elapsed_ms}ms)\nIncrease --max-poll-attempts.")]
    PollTimeout {
        job_id: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    /// No table carrying the line-item marker was found in the response.
    #[error("No line-item table containing '{marker}' found in '{source_name}'")]
    TableNotFound { source_name: String, marker: String },

    /// The analysis response is structurally broken (dangling ids, bad JSON).
    #[error("Invalid analysis response: {0}")]
    InvalidResponse(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or open the output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV encoder failed while writing a record.
    #[error("Failed to write CSV record to '{path}': {source}")]
    CsvWriteFailed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The TOML configuration file could not be read or parsed.
    #[error("Failed to load configuration '{path}': {reason}")]
    ConfigReadFailed { path: PathBuf, reason: String },

    // ── Run errors ────────────────────────────────────────────────────────
    /// Every input file failed; nothing was written.
    #[error("All {total} files failed.\nFirst error: {first_error}")]
    AllFilesFailed { total: usize, first_error: String },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvoiceError {
    /// Classify this error into its [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        use InvoiceError::*;
        match self {
            FileNotFound { .. }
            | PermissionDenied { .. }
            | NotAPdf { .. }
            | InvalidPattern { .. }
            | ResponseReadFailed { .. }
            | OutputWriteFailed { .. }
            | CsvWriteFailed { .. } => ErrorKind::Io,
            InvalidRemotePath { .. } | UploadFailed { .. } => ErrorKind::Upload,
            AnalysisRequestFailed { .. }
            | ExtractionFailed { .. }
            | PollTimeout { .. }
            | TableNotFound { .. }
            | InvalidResponse(_) => ErrorKind::Extraction,
            InvalidConfig(_) | ConfigReadFailed { .. } => ErrorKind::Config,
            AllFilesFailed { .. } | Internal(_) => ErrorKind::Internal,
        }
    }
}

/// A non-fatal error for a single input file.
///
/// Stored in [`crate::output::FileResult`] when a file fails. The run
/// continues with the next file unless ALL files fail.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{path}: {message}")]
pub struct FileError {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

impl FileError {
    pub fn new(path: impl Into<PathBuf>, err: &InvoiceError) -> Self {
        Self {
            path: path.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_failed_display() {
        let e = InvoiceError::ExtractionFailed {
            job_id: "job-42".into(),
            reason: "UNSUPPORTED_DOCUMENT".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("job-42"), "got: {msg}");
        assert!(msg.contains("UNSUPPORTED_DOCUMENT"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::Extraction);
    }

    #[test]
    fn poll_timeout_display() {
        let e = InvoiceError::PollTimeout {
            job_id: "abc".into(),
            attempts: 12,
            elapsed_ms: 3000,
        };
        assert!(e.to_string().contains("12 polls"));
        assert!(e.to_string().contains("3000ms"));
    }

    #[test]
    fn kinds_cover_the_three_failure_classes() {
        let io = InvoiceError::FileNotFound {
            path: "missing.pdf".into(),
        };
        let upload = InvoiceError::UploadFailed {
            path: "a.pdf".into(),
            destination: "s3://bucket/a.pdf".into(),
            reason: "AccessDenied".into(),
        };
        let table = InvoiceError::TableNotFound {
            source_name: "a.pdf".into(),
            marker: "product name".into(),
        };
        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(upload.kind(), ErrorKind::Upload);
        assert_eq!(table.kind(), ErrorKind::Extraction);
    }

    #[test]
    fn file_error_keeps_kind_and_message() {
        let e = InvoiceError::InvalidConfig("remote_upload_path is required".into());
        let fe = FileError::new("x.pdf", &e);
        assert_eq!(fe.kind, ErrorKind::Config);
        assert!(fe.to_string().starts_with("x.pdf: "));
    }
}
