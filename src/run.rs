//! Run entry points: inputs in, CSV rows out.
//!
//! [`run`] drives the whole pipeline for a batch of PDFs; [`remap_response`]
//! replays saved analysis responses through the mapper without touching the
//! cloud. Both append to the same kind of CSV and return a [`RunReport`].
//!
//! Files are processed one after another. A file's rows are buffered until
//! its job has succeeded and its mapping has completed, so a failed file
//! never leaves partial rows in the output.

use crate::config::ExtractionConfig;
use crate::error::{FileError, InvoiceError};
use crate::output::{FileResult, RunReport, RunStats};
use crate::pipeline::csv_out::CsvSink;
use crate::pipeline::extract::{self, DocumentAnalyzer, ExtractionJob};
use crate::pipeline::mapper::{self, MappedInvoice};
use crate::pipeline::response::{AnalysisDocument, RawResponse};
use crate::pipeline::upload::{self, ObjectStore, RemotePrefix};
use crate::pipeline::input;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract every invoice in `inputs` and append the line items to
/// `config.output_csv_path`.
///
/// `inputs` are files, directories (their `*.pdf` children) or glob
/// patterns. All of them are resolved and validated before the first
/// upload.
///
/// # Returns
/// `Ok(RunReport)` when at least one file succeeded; per-file failures are
/// in `report.files[..].error`.
///
/// # Errors
/// Returns `Err(InvoiceError)` only for fatal errors:
/// - an input is missing, unreadable or not a PDF
/// - no backend is available, or the output cannot be opened
/// - every file failed ([`InvoiceError::AllFilesFailed`])
pub async fn run<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<RunReport, InvoiceError> {
    let run_start = Instant::now();

    // ── Step 1: Resolve and validate inputs (no network yet) ─────────────
    let paths = input::resolve_inputs(inputs)?;
    if paths.is_empty() {
        return Err(InvoiceError::InvalidConfig(
            "no PDF files matched the given inputs".into(),
        ));
    }
    let total = paths.len();
    info!("Processing {} invoice(s)", total);

    // ── Step 2: Backends and output ──────────────────────────────────────
    let backends = Backends::resolve(config).await?;
    let prefix = config.remote_prefix();
    let mut sink = CsvSink::open(&config.output_csv_path)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    // ── Step 3: One file at a time ───────────────────────────────────────
    let mut files = Vec::with_capacity(total);
    for (i, path) in paths.iter().enumerate() {
        let file_num = i + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(file_num, total, path);
        }

        let result = process_pdf(path, file_num, config, &backends, &prefix, &mut sink).await;
        notify_file_done(config, file_num, total, &result);
        files.push(result);
    }

    finish(files, &sink, config, run_start)
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<RunReport, InvoiceError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(inputs, config))
}

/// Map saved analysis responses (`*.json`) to CSV rows without any cloud
/// call.
///
/// The responses are the ones written by a run with `responses_dir` set, or
/// any raw Textract `GetDocumentAnalysis` output with its blocks merged.
pub fn remap_response<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<RunReport, InvoiceError> {
    let run_start = Instant::now();
    let paths = input::resolve_response_inputs(inputs)?;
    if paths.is_empty() {
        return Err(InvoiceError::InvalidConfig(
            "no response files matched the given inputs".into(),
        ));
    }
    let total = paths.len();
    let mut sink = CsvSink::open(&config.output_csv_path)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    let mut files = Vec::with_capacity(total);
    for (i, path) in paths.iter().enumerate() {
        let file_num = i + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(file_num, total, path);
        }

        let start = Instant::now();
        let outcome = read_response(path)
            .and_then(|doc| mapper::map_document(&doc, &config.labels, &display_name(path)))
            .and_then(|mapped| write_records(&mut sink, mapped));
        let result = file_result(path, None, outcome, start);

        notify_file_done(config, file_num, total, &result);
        files.push(result);
    }

    finish(files, &sink, config, run_start)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The cloud-facing halves of the pipeline for one run.
struct Backends {
    store: Arc<dyn ObjectStore>,
    analyzer: Arc<dyn DocumentAnalyzer>,
}

impl Backends {
    /// Injected backends win; anything missing falls back to AWS.
    async fn resolve(config: &ExtractionConfig) -> Result<Self, InvoiceError> {
        if let (Some(store), Some(analyzer)) = (&config.store, &config.analyzer) {
            return Ok(Self {
                store: Arc::clone(store),
                analyzer: Arc::clone(analyzer),
            });
        }
        Self::aws(config).await
    }

    #[cfg(feature = "aws")]
    async fn aws(config: &ExtractionConfig) -> Result<Self, InvoiceError> {
        use crate::aws::{load_sdk_config, S3ObjectStore, TextractAnalyzer};

        let sdk = load_sdk_config(config).await;
        debug!("AWS region: {:?}", sdk.region());
        Ok(Self {
            store: config
                .store
                .clone()
                .unwrap_or_else(|| Arc::new(S3ObjectStore::new(&sdk)) as Arc<dyn ObjectStore>),
            analyzer: config.analyzer.clone().unwrap_or_else(|| {
                Arc::new(TextractAnalyzer::new(&sdk)) as Arc<dyn DocumentAnalyzer>
            }),
        })
    }

    #[cfg(not(feature = "aws"))]
    async fn aws(_config: &ExtractionConfig) -> Result<Self, InvoiceError> {
        Err(InvoiceError::InvalidConfig(
            "no object store or analyzer configured and the `aws` feature is disabled".into(),
        ))
    }
}

/// Upload, analyse, map and write one PDF.
async fn process_pdf(
    path: &Path,
    file_num: usize,
    config: &ExtractionConfig,
    backends: &Backends,
    prefix: &RemotePrefix,
    sink: &mut CsvSink,
) -> FileResult {
    let start = Instant::now();
    let name = display_name(path);
    let mut job: Option<ExtractionJob> = None;

    let outcome = async {
        let location = upload::upload_file(backends.store.as_ref(), prefix, path).await?;

        let (finished, raw) = extract::extract_document(
            backends.analyzer.as_ref(),
            &location,
            config,
            |job_id: &str| {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_job_submitted(file_num, job_id);
                }
            },
        )
        .await?;
        job = Some(finished);

        if let Some(ref dir) = config.responses_dir {
            save_response(dir, path, &raw);
        }

        let doc = AnalysisDocument::from_raw(&raw)?;
        let mapped = mapper::map_document(&doc, &config.labels, &name)?;
        write_records(sink, mapped)
    }
    .await;

    file_result(path, job, outcome, start)
}

/// Append a file's records in one go. Returns `(rows, date_found)`.
fn write_records(sink: &mut CsvSink, mapped: MappedInvoice) -> Result<(usize, bool), InvoiceError> {
    sink.append(&mapped.records)?;
    Ok((mapped.records.len(), mapped.invoice_date.is_some()))
}

fn file_result(
    path: &Path,
    job: Option<ExtractionJob>,
    outcome: Result<(usize, bool), InvoiceError>,
    start: Instant,
) -> FileResult {
    let duration_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok((records_written, date_found)) => {
            info!(
                "{}: {} row(s) in {}ms",
                path.display(),
                records_written,
                duration_ms
            );
            FileResult {
                path: path.to_path_buf(),
                job,
                records_written,
                date_found,
                duration_ms,
                error: None,
            }
        }
        Err(e) => {
            warn!("{}: {}", path.display(), e);
            FileResult {
                path: path.to_path_buf(),
                job,
                records_written: 0,
                date_found: false,
                duration_ms,
                error: Some(FileError::new(path, &e)),
            }
        }
    }
}

fn notify_file_done(config: &ExtractionConfig, file_num: usize, total: usize, result: &FileResult) {
    if let Some(ref cb) = config.progress_callback {
        match &result.error {
            None => cb.on_file_complete(file_num, total, result.records_written),
            Some(e) => cb.on_file_error(file_num, total, &e.message),
        }
    }
}

/// Aggregate per-file results into a report, or fail if nothing succeeded.
fn finish(
    files: Vec<FileResult>,
    sink: &CsvSink,
    config: &ExtractionConfig,
    run_start: Instant,
) -> Result<RunReport, InvoiceError> {
    let processed = files.iter().filter(|f| f.is_success()).count();
    let stats = RunStats {
        total_files: files.len(),
        processed_files: processed,
        failed_files: files.len() - processed,
        records_written: sink.rows_written(),
        files_without_date: files
            .iter()
            .filter(|f| f.is_success() && !f.date_found)
            .count(),
        total_duration_ms: run_start.elapsed().as_millis() as u64,
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(stats.total_files, processed);
    }

    if processed == 0 {
        let first_error = files
            .iter()
            .find_map(|f| f.error.as_ref())
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(InvoiceError::AllFilesFailed {
            total: files.len(),
            first_error,
        });
    }

    info!(
        "Run complete: {}/{} files, {} rows → {}, {}ms",
        processed,
        stats.total_files,
        stats.records_written,
        sink.path().display(),
        stats.total_duration_ms
    );

    Ok(RunReport {
        output_csv: sink.path().to_path_buf(),
        files,
        stats,
    })
}

fn read_response(path: &Path) -> Result<AnalysisDocument, InvoiceError> {
    let json = std::fs::read_to_string(path).map_err(|e| InvoiceError::ResponseReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    AnalysisDocument::from_json(&json)
}

/// Keep a copy of the raw response as `<dir>/<file stem>.json`.
///
/// A failed save is logged and does not fail the file.
fn save_response(dir: &Path, pdf: &Path, raw: &RawResponse) {
    let target = response_path(dir, pdf);
    let written = std::fs::create_dir_all(dir)
        .map_err(|e| e.to_string())
        .and_then(|_| serde_json::to_vec_pretty(raw).map_err(|e| e.to_string()))
        .and_then(|bytes| std::fs::write(&target, bytes).map_err(|e| e.to_string()));
    match written {
        Ok(()) => debug!("Saved response to {}", target.display()),
        Err(e) => warn!("Could not save response to {}: {}", target.display(), e),
    }
}

fn response_path(dir: &Path, pdf: &Path) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "response".to_string());
    dir.join(format!("{stem}.json"))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_path_uses_stem() {
        assert_eq!(
            response_path(Path::new("out"), Path::new("in/march.pdf")),
            PathBuf::from("out/march.json")
        );
    }

    #[test]
    fn failed_outcome_becomes_file_error() {
        let err = InvoiceError::ExtractionFailed {
            job_id: "j".into(),
            reason: "bad".into(),
        };
        let r = file_result(Path::new("a.pdf"), None, Err(err), Instant::now());
        assert!(!r.is_success());
        assert_eq!(r.records_written, 0);
        assert_eq!(
            r.error.unwrap().kind,
            crate::error::ErrorKind::Extraction
        );
    }

    #[test]
    fn remap_with_no_matches_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExtractionConfig::builder()
            .remote_upload_path("s3://b")
            .output_csv_path(dir.path().join("out.csv"))
            .build()
            .unwrap();
        let pattern = format!("{}/*.json", dir.path().display());
        let err = remap_response(&[pattern], &config).unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidConfig(_)));
    }
}
