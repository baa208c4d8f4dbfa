//! Whole-pipeline integration tests.
//!
//! The object store and the analysis service are replaced by in-memory
//! doubles; analysis results come from the JSON fixtures in
//! `tests/fixtures/`, keyed by the uploaded file's stem. No AWS access is
//! needed.

use async_trait::async_trait;
use invoice2csv::{
    remap_response, run, DocumentAnalyzer, ErrorKind, ExtractionConfig, InvoiceError, JobStatus,
    ObjectStore, RawResponse, RemoteLocation, RunProgressCallback,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const HEADER: &str = "description,quantity,unit_price,line_total,invoice_date\n";

const MILK_BREAD_ROWS: &str = "Milk 2L,1,3.50,3.50,2024-03-01\n\
                               Bread,2,2.00,4.00,2024-03-01\n";

const TWO_PAGE_ROWS: &str = "Eggs 12pcs,1,6.00,6.00,\n\
                             Flour 1kg,3,4.20,12.60,\n";

// ── Test doubles ─────────────────────────────────────────────────────────────

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load_fixture(name: &str) -> RawResponse {
    let json = std::fs::read_to_string(fixture(name)).unwrap();
    serde_json::from_str(&json).unwrap()
}

#[derive(Default)]
struct MemoryStore {
    uploads: Mutex<Vec<RemoteLocation>>,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, local: &Path, destination: &RemoteLocation) -> Result<(), InvoiceError> {
        assert!(local.is_file(), "uploading a missing file: {}", local.display());
        self.uploads.lock().unwrap().push(destination.clone());
        Ok(())
    }
}

/// What the fake service does with a document.
#[derive(Clone)]
enum Script {
    Succeed(RawResponse),
    Fail(&'static str),
    NeverFinish,
}

/// Analysis double: job id = object key, behaviour looked up by file stem.
#[derive(Default)]
struct ScriptedAnalyzer {
    scripts: HashMap<String, Script>,
    started: AtomicUsize,
    polls: AtomicUsize,
}

impl ScriptedAnalyzer {
    fn with(mut self, stem: &str, script: Script) -> Self {
        self.scripts.insert(stem.to_string(), script);
        self
    }

    fn script(&self, job_id: &str) -> Result<Script, InvoiceError> {
        let stem = Path::new(job_id)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.scripts
            .get(&stem)
            .cloned()
            .ok_or_else(|| InvoiceError::Internal(format!("no script for {stem}")))
    }
}

#[async_trait]
impl DocumentAnalyzer for ScriptedAnalyzer {
    async fn start_analysis(&self, source: &RemoteLocation) -> Result<String, InvoiceError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(source.key.clone())
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, InvoiceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(match self.script(job_id)? {
            Script::Succeed(_) => JobStatus::Succeeded,
            Script::Fail(reason) => JobStatus::Failed {
                reason: reason.to_string(),
            },
            Script::NeverFinish => JobStatus::InProgress,
        })
    }

    async fn fetch_result(&self, job_id: &str) -> Result<RawResponse, InvoiceError> {
        match self.script(job_id)? {
            Script::Succeed(raw) => Ok(raw),
            _ => Err(InvoiceError::Internal("fetch before success".into())),
        }
    }
}

struct Harness {
    dir: tempfile::TempDir,
    store: Arc<MemoryStore>,
    analyzer: Arc<ScriptedAnalyzer>,
}

impl Harness {
    fn new(analyzer: ScriptedAnalyzer) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            store: Arc::new(MemoryStore::default()),
            analyzer: Arc::new(analyzer),
        }
    }

    /// A minimal file with PDF magic bytes; the doubles never parse it.
    fn pdf(&self, name: &str) -> String {
        let path = self.dir.path().join("in").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"%PDF-1.4\n%stub\n").unwrap();
        path.display().to_string()
    }

    fn csv_path(&self) -> PathBuf {
        self.dir.path().join("out/invoices.csv")
    }

    fn builder(&self) -> invoice2csv::ExtractionConfigBuilder {
        ExtractionConfig::builder()
            .remote_upload_path("s3://test-bucket/uploads/")
            .output_csv_path(self.csv_path())
            .poll_interval_ms(1)
            .max_poll_attempts(3)
            .store(self.store.clone() as Arc<dyn ObjectStore>)
            .analyzer(self.analyzer.clone() as Arc<dyn DocumentAnalyzer>)
    }

    fn config(&self) -> ExtractionConfig {
        self.builder().build().unwrap()
    }

    fn csv(&self) -> String {
        std::fs::read_to_string(self.csv_path()).unwrap_or_default()
    }

    fn uploads(&self) -> usize {
        self.store.uploads.lock().unwrap().len()
    }
}

fn standard_analyzer() -> ScriptedAnalyzer {
    ScriptedAnalyzer::default()
        .with("milk_bread", Script::Succeed(load_fixture("milk_bread.json")))
        .with(
            "two_pages",
            Script::Succeed(load_fixture("two_pages_no_date.json")),
        )
        .with("rejected", Script::Fail("UNSUPPORTED_DOCUMENT"))
        .with("stuck", Script::NeverFinish)
        .with("no_table", Script::Succeed(RawResponse::default()))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_line_items_share_invoice_date() {
    let h = Harness::new(standard_analyzer());
    let input = h.pdf("milk_bread.pdf");

    let report = run(&[input], &h.config()).await.unwrap();

    assert_eq!(h.csv(), format!("{HEADER}{MILK_BREAD_ROWS}"));
    assert_eq!(report.stats.records_written, 2);
    assert_eq!(report.stats.processed_files, 1);
    assert!(report.files[0].date_found);

    let job = report.files[0].job.as_ref().unwrap();
    assert_eq!(job.source.to_string(), "s3://test-bucket/uploads/milk_bread.pdf");
    assert_eq!(job.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn test_header_written_once_across_files() {
    let h = Harness::new(standard_analyzer());
    let inputs = [h.pdf("milk_bread.pdf"), h.pdf("two_pages.pdf")];

    let report = run(&inputs, &h.config()).await.unwrap();

    assert_eq!(
        h.csv(),
        format!("{HEADER}{MILK_BREAD_ROWS}{TWO_PAGE_ROWS}")
    );
    assert_eq!(report.stats.records_written, 4);
    assert_eq!(report.stats.files_without_date, 1);
    assert_eq!(h.uploads(), 2);
}

#[tokio::test]
async fn test_directory_input_is_sorted() {
    let h = Harness::new(standard_analyzer());
    h.pdf("two_pages.pdf");
    h.pdf("milk_bread.pdf");
    let dir = h.dir.path().join("in").display().to_string();

    run(&[dir], &h.config()).await.unwrap();

    // milk_bread sorts before two_pages.
    assert_eq!(
        h.csv(),
        format!("{HEADER}{MILK_BREAD_ROWS}{TWO_PAGE_ROWS}")
    );
}

#[tokio::test]
async fn test_failed_job_writes_no_rows() {
    let h = Harness::new(standard_analyzer());
    let inputs = [h.pdf("rejected.pdf"), h.pdf("milk_bread.pdf")];

    let report = run(&inputs, &h.config()).await.unwrap();

    assert_eq!(h.csv(), format!("{HEADER}{MILK_BREAD_ROWS}"));
    assert_eq!(report.stats.failed_files, 1);

    let failed = &report.files[0];
    let err = failed.error.as_ref().unwrap();
    assert_eq!(err.kind, ErrorKind::Extraction);
    assert!(err.message.contains("UNSUPPORTED_DOCUMENT"), "{}", err.message);
    assert_eq!(failed.records_written, 0);
}

#[tokio::test]
async fn test_all_files_failed_is_fatal() {
    let h = Harness::new(standard_analyzer());
    let inputs = [h.pdf("rejected.pdf"), h.pdf("no_table.pdf")];

    let err = run(&inputs, &h.config()).await.unwrap_err();

    match err {
        InvoiceError::AllFilesFailed { total, first_error } => {
            assert_eq!(total, 2);
            assert!(first_error.contains("UNSUPPORTED_DOCUMENT"));
        }
        other => panic!("expected AllFilesFailed, got {other:?}"),
    }
    assert_eq!(h.csv(), "");
}

#[tokio::test]
async fn test_missing_table_fails_only_that_file() {
    let h = Harness::new(standard_analyzer());
    let inputs = [h.pdf("no_table.pdf"), h.pdf("two_pages.pdf")];

    let report = run(&inputs, &h.config()).await.unwrap();

    let err = report.files[0].error.as_ref().unwrap();
    assert_eq!(err.kind, ErrorKind::Extraction);
    assert!(err.message.contains("product name"), "{}", err.message);
    assert_eq!(h.csv(), format!("{HEADER}{TWO_PAGE_ROWS}"));
}

#[tokio::test]
async fn test_poll_timeout_is_bounded() {
    let h = Harness::new(standard_analyzer());
    let inputs = [h.pdf("stuck.pdf"), h.pdf("milk_bread.pdf")];

    let report = run(&inputs, &h.config()).await.unwrap();

    let err = report.files[0].error.as_ref().unwrap();
    assert_eq!(err.kind, ErrorKind::Extraction);
    assert!(err.message.contains("after 3 polls"), "{}", err.message);
    // 3 polls for the stuck job, 1 for the good one.
    assert_eq!(h.analyzer.polls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_missing_input_fails_before_any_upload() {
    let h = Harness::new(standard_analyzer());
    let missing = h.dir.path().join("in/nope.pdf").display().to_string();
    let inputs = [h.pdf("milk_bread.pdf"), missing];

    let err = run(&inputs, &h.config()).await.unwrap_err();

    assert!(matches!(err, InvoiceError::FileNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(h.uploads(), 0);
    assert_eq!(h.analyzer.started.load(Ordering::SeqCst), 0);
    assert!(!h.csv_path().exists());
}

#[tokio::test]
async fn test_non_pdf_input_fails_before_any_upload() {
    let h = Harness::new(standard_analyzer());
    let text = h.dir.path().join("notes.txt");
    std::fs::write(&text, "hello world").unwrap();

    let err = run(&[text.display().to_string()], &h.config())
        .await
        .unwrap_err();

    assert!(matches!(err, InvoiceError::NotAPdf { .. }));
    assert_eq!(h.uploads(), 0);
}

#[tokio::test]
async fn test_rerun_appends_second_set_of_rows() {
    let h = Harness::new(standard_analyzer());
    let input = h.pdf("milk_bread.pdf");
    let config = h.config();

    run(&[input.clone()], &config).await.unwrap();
    run(&[input], &config).await.unwrap();

    assert_eq!(
        h.csv(),
        format!("{HEADER}{MILK_BREAD_ROWS}{MILK_BREAD_ROWS}")
    );
}

#[tokio::test]
async fn test_progress_events_in_order() {
    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl RunProgressCallback for Recorder {
        fn on_run_start(&self, total: usize) {
            self.0.lock().unwrap().push(format!("start {total}"));
        }
        fn on_file_start(&self, n: usize, _total: usize, _path: &Path) {
            self.0.lock().unwrap().push(format!("file {n}"));
        }
        fn on_job_submitted(&self, n: usize, job_id: &str) {
            self.0.lock().unwrap().push(format!("job {n} {job_id}"));
        }
        fn on_file_complete(&self, n: usize, _total: usize, records: usize) {
            self.0.lock().unwrap().push(format!("done {n} {records}"));
        }
        fn on_file_error(&self, n: usize, _total: usize, _error: &str) {
            self.0.lock().unwrap().push(format!("error {n}"));
        }
        fn on_run_complete(&self, total: usize, ok: usize) {
            self.0.lock().unwrap().push(format!("end {ok}/{total}"));
        }
    }

    let h = Harness::new(standard_analyzer());
    let recorder = Arc::new(Recorder::default());
    let config = h
        .builder()
        .progress_callback(recorder.clone() as Arc<dyn RunProgressCallback>)
        .build()
        .unwrap();
    let inputs = [h.pdf("milk_bread.pdf"), h.pdf("rejected.pdf")];

    run(&inputs, &config).await.unwrap();

    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec![
            "start 2",
            "file 1",
            "job 1 uploads/milk_bread.pdf",
            "done 1 2",
            "file 2",
            "job 2 uploads/rejected.pdf",
            "error 2",
            "end 1/2",
        ]
    );
}

#[tokio::test]
async fn test_saved_responses_remap_to_same_rows() {
    let h = Harness::new(standard_analyzer());
    let responses = h.dir.path().join("responses");
    let config = h.builder().responses_dir(&responses).build().unwrap();

    run(&[h.pdf("milk_bread.pdf")], &config).await.unwrap();
    assert!(responses.join("milk_bread.json").is_file());

    let remapped = h.dir.path().join("remapped.csv");
    let offline = ExtractionConfig::builder()
        .output_csv_path(&remapped)
        .build_offline()
        .unwrap();
    let report = remap_response(&[responses.display().to_string()], &offline).unwrap();

    assert_eq!(report.stats.records_written, 2);
    assert_eq!(
        std::fs::read_to_string(remapped).unwrap(),
        format!("{HEADER}{MILK_BREAD_ROWS}")
    );
}

#[test]
fn test_remap_fixtures_without_cloud() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("fixtures.csv");
    let config = ExtractionConfig::builder()
        .output_csv_path(&out)
        .build_offline()
        .unwrap();
    let pattern = fixture("*.json").display().to_string();

    let report = remap_response(&[pattern], &config).unwrap();

    assert_eq!(report.stats.total_files, 2);
    assert!(report.files.iter().all(|f| f.job.is_none()));
    assert_eq!(
        std::fs::read_to_string(out).unwrap(),
        format!("{HEADER}{MILK_BREAD_ROWS}{TWO_PAGE_ROWS}")
    );
}

#[test]
fn test_remap_rejects_broken_json() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ not json").unwrap();
    let config = ExtractionConfig::builder()
        .output_csv_path(dir.path().join("out.csv"))
        .build_offline()
        .unwrap();

    let err = remap_response(&[broken.display().to_string()], &config).unwrap_err();

    match err {
        InvoiceError::AllFilesFailed { first_error, .. } => {
            assert!(first_error.contains("Invalid analysis response"), "{first_error}");
        }
        other => panic!("expected AllFilesFailed, got {other:?}"),
    }
}
