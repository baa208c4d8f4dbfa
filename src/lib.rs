//! # invoice2csv
//!
//! Extract line items from PDF invoices with AWS Textract and append them to
//! a CSV file.
//!
//! ## Why this crate?
//!
//! Supplier invoices arrive as PDFs with a date somewhere in a form block and
//! a table of products further down. Textract's document analysis already
//! recovers both as structured key/value pairs and table cells; what is left
//! is the plumbing around it (upload, job polling, finding the right table,
//! cleaning the cells) and a CSV that a spreadsheet or a bookkeeping import
//! can read.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve files / directories / globs, check %PDF magic
//!  ├─ 2. Upload   copy to s3://bucket/prefix/<file name>
//!  ├─ 3. Extract  start analysis (TABLES + FORMS), poll, fetch all pages
//!  ├─ 4. Parse    flat block list → typed key/value + table lookups
//!  ├─ 5. Map      invoice date + line-item tables → InvoiceRecords
//!  └─ 6. Output   append to CSV, header once
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice2csv::{run, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials come from the usual AWS chain (env, ~/.aws, IMDS)
//!     let config = ExtractionConfig::builder()
//!         .remote_upload_path("s3://my-bucket/invoices/")
//!         .output_csv_path("invoices.csv")
//!         .build()?;
//!     let report = run(&["invoices/"], &config).await?;
//!     eprintln!("{} rows from {} files",
//!         report.stats.records_written,
//!         report.stats.processed_files);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `aws`   | on      | S3 / Textract backends (aws-config + aws-sdk-*) |
//! | `cli`   | on      | Enables the `invoice2csv` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Without `aws`, supply your own [`ObjectStore`] and [`DocumentAnalyzer`]
//! through the config builder:
//! ```toml
//! invoice2csv = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

#[cfg(feature = "aws")]
pub mod aws;
pub mod config;
pub mod error;
pub mod labels;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConfigFile, ExtractionConfig, ExtractionConfigBuilder, FieldLabels};
pub use error::{ErrorKind, FileError, InvoiceError};
pub use output::{FileResult, InvoiceRecord, RunReport, RunStats, CSV_HEADER};
pub use pipeline::extract::{DocumentAnalyzer, ExtractionJob, JobStatus};
pub use pipeline::response::{RawBlock, RawRelationship, RawResponse};
pub use pipeline::upload::{ObjectStore, RemoteLocation};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use run::{remap_response, run, run_sync};
