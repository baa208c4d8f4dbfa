//! Configuration types for invoice extraction runs.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built once
//! at startup via its [`ExtractionConfigBuilder`] and passed by reference to
//! every pipeline stage. There is no process-wide state.
//!
//! Settings can also come from a TOML file ([`ConfigFile`]); the CLI loads
//! it first and lets flags override individual values.

use crate::error::InvoiceError;
use crate::labels::{self, Field};
use crate::pipeline::extract::DocumentAnalyzer;
use crate::pipeline::upload::{ObjectStore, RemotePrefix};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use invoice2csv::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .remote_upload_path("s3://my-bucket/invoices/")
///     .output_csv_path("out/invoices.csv")
///     .poll_interval_ms(500)
///     .build()
///     .unwrap();
/// assert_eq!(config.remote_prefix().bucket, "my-bucket");
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Destination prefix for uploaded PDFs, `s3://bucket/prefix`. Required.
    ///
    /// Each file is stored under `prefix + file name`, so the analysis job
    /// can reference it by bucket and key. Set through the builder only,
    /// since `prefix` is parsed from it at build time.
    remote_upload_path: String,

    /// CSV file the records are appended to. Default: `invoices.csv`.
    pub output_csv_path: PathBuf,

    /// Named AWS credentials profile. `None` uses the SDK default chain.
    pub aws_profile: Option<String>,

    /// AWS region override. `None` uses the profile / environment region.
    pub aws_region: Option<String>,

    /// Delay between two job status queries in milliseconds. Default: 250.
    pub poll_interval_ms: u64,

    /// Maximum number of status queries before giving up. Default: 1200.
    ///
    /// With the default interval this is five minutes per document; a
    /// multi-page invoice usually finishes in well under thirty seconds.
    pub max_poll_attempts: u32,

    /// Labels used to find the date and the line-item table.
    pub labels: FieldLabels,

    /// When set, every raw analysis response is saved here as
    /// `<file stem>.json` for later re-mapping.
    pub responses_dir: Option<PathBuf>,

    /// Pre-constructed object store. Takes precedence over the AWS backend.
    pub store: Option<Arc<dyn ObjectStore>>,

    /// Pre-constructed analysis client. Takes precedence over the AWS backend.
    pub analyzer: Option<Arc<dyn DocumentAnalyzer>>,

    /// Progress events sink.
    pub progress_callback: Option<ProgressCallback>,

    prefix: Option<RemotePrefix>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            remote_upload_path: String::new(),
            output_csv_path: PathBuf::from("invoices.csv"),
            aws_profile: None,
            aws_region: None,
            poll_interval_ms: 250,
            max_poll_attempts: 1200,
            labels: FieldLabels::default(),
            responses_dir: None,
            store: None,
            analyzer: None,
            progress_callback: None,
            prefix: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("remote_upload_path", &self.remote_upload_path)
            .field("output_csv_path", &self.output_csv_path)
            .field("aws_profile", &self.aws_profile)
            .field("aws_region", &self.aws_region)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("labels", &self.labels)
            .field("responses_dir", &self.responses_dir)
            .field("store", &self.store.as_ref().map(|_| "<dyn ObjectStore>"))
            .field("analyzer", &self.analyzer.as_ref().map(|_| "<dyn DocumentAnalyzer>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The upload path as configured.
    pub fn remote_upload_path(&self) -> &str {
        &self.remote_upload_path
    }

    /// The parsed upload prefix.
    ///
    /// Only configs produced by [`ExtractionConfigBuilder::build`] carry a
    /// validated prefix; a hand-assembled config is parsed lazily and an
    /// invalid path yields an empty bucket that the uploader rejects.
    pub fn remote_prefix(&self) -> RemotePrefix {
        match &self.prefix {
            Some(p) => p.clone(),
            None => RemotePrefix::parse(&self.remote_upload_path).unwrap_or_default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn remote_upload_path(mut self, path: impl Into<String>) -> Self {
        self.config.remote_upload_path = path.into();
        self
    }

    pub fn output_csv_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_csv_path = path.into();
        self
    }

    pub fn aws_profile(mut self, profile: impl Into<String>) -> Self {
        self.config.aws_profile = Some(profile.into());
        self
    }

    pub fn aws_region(mut self, region: impl Into<String>) -> Self {
        self.config.aws_region = Some(region.into());
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.max_poll_attempts = n.max(1);
        self
    }

    pub fn labels(mut self, labels: FieldLabels) -> Self {
        self.config.labels = labels;
        self
    }

    pub fn responses_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.responses_dir = Some(dir.into());
        self
    }

    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.config.store = Some(store);
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn DocumentAnalyzer>) -> Self {
        self.config.analyzer = Some(analyzer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ExtractionConfig, InvoiceError> {
        if self.config.remote_upload_path.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "remote_upload_path is required (e.g. s3://my-bucket/invoices/)".into(),
            ));
        }
        self.validate_local()?;
        self.config.prefix = Some(RemotePrefix::parse(&self.config.remote_upload_path)?);
        Ok(self.config)
    }

    /// Build a configuration for re-mapping saved responses only.
    ///
    /// The upload path is not required; if one is set it is still parsed.
    pub fn build_offline(mut self) -> Result<ExtractionConfig, InvoiceError> {
        self.validate_local()?;
        if !self.config.remote_upload_path.trim().is_empty() {
            self.config.prefix = Some(RemotePrefix::parse(&self.config.remote_upload_path)?);
        }
        Ok(self.config)
    }

    fn validate_local(&self) -> Result<(), InvoiceError> {
        let c = &self.config;
        if c.output_csv_path.as_os_str().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "output_csv_path must not be empty".into(),
            ));
        }
        if c.poll_interval_ms == 0 {
            return Err(InvoiceError::InvalidConfig(
                "poll_interval_ms must be ≥ 1".into(),
            ));
        }
        c.labels.validate()
    }
}

// ── Labels ───────────────────────────────────────────────────────────────

/// Alias lists and markers the result mapper matches against.
///
/// Matching is case-insensitive and whitespace-insensitive. For table
/// headers, exact alias matches win over substring matches, so "Unit Price"
/// and "Total Price" columns are told apart even though both contain
/// "price".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldLabels {
    pub description: Vec<String>,
    pub quantity: Vec<String>,
    pub unit_price: Vec<String>,
    pub line_total: Vec<String>,
    /// A cell of the first table row must contain this to select the table.
    pub table_marker: String,
    /// Form keys containing this are tried as invoice date.
    pub date_key_marker: String,
    /// `chrono` parse formats for the date value.
    pub date_formats: Vec<String>,
}

impl Default for FieldLabels {
    fn default() -> Self {
        Self {
            description: labels::owned(labels::DEFAULT_DESCRIPTION_ALIASES),
            quantity: labels::owned(labels::DEFAULT_QUANTITY_ALIASES),
            unit_price: labels::owned(labels::DEFAULT_UNIT_PRICE_ALIASES),
            line_total: labels::owned(labels::DEFAULT_LINE_TOTAL_ALIASES),
            table_marker: labels::DEFAULT_TABLE_MARKER.to_string(),
            date_key_marker: labels::DEFAULT_DATE_KEY_MARKER.to_string(),
            date_formats: labels::owned(labels::DEFAULT_DATE_FORMATS),
        }
    }
}

impl FieldLabels {
    /// Aliases configured for one output field.
    pub fn aliases(&self, field: Field) -> &[String] {
        match field {
            Field::Description => &self.description,
            Field::Quantity => &self.quantity,
            Field::UnitPrice => &self.unit_price,
            Field::LineTotal => &self.line_total,
        }
    }

    fn validate(&self) -> Result<(), InvoiceError> {
        if labels::normalise_label(&self.table_marker).is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "labels.table_marker must not be empty".into(),
            ));
        }
        if self.description.is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "labels.description needs at least one alias".into(),
            ));
        }
        if self.date_formats.is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "labels.date_formats needs at least one format".into(),
            ));
        }
        Ok(())
    }
}

// ── TOML file ────────────────────────────────────────────────────────────

/// On-disk configuration, e.g. `config.toml`:
///
/// ```toml
/// [aws]
/// s3_upload_path = "s3://my-bucket/textract/"
/// profile = "default"
///
/// [data]
/// input_folder = "invoices"
/// output_csv = "output/invoices.csv"
///
/// [polling]
/// interval_ms = 250
///
/// [labels]
/// table_marker = "product name"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    pub aws: AwsSection,
    pub data: DataSection,
    pub polling: PollingSection,
    pub labels: Option<FieldLabels>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AwsSection {
    pub s3_upload_path: Option<String>,
    pub profile: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DataSection {
    /// Folder scanned for `*.pdf` when no inputs are given on the command line.
    pub input_folder: Option<PathBuf>,
    pub output_csv: Option<PathBuf>,
    pub responses_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingSection {
    pub interval_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

impl ConfigFile {
    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, InvoiceError> {
        let text = std::fs::read_to_string(path).map_err(|e| InvoiceError::ConfigReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text).map_err(|e| match e {
            InvoiceError::ConfigReadFailed { reason, .. } => InvoiceError::ConfigReadFailed {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse TOML configuration text.
    pub fn parse(text: &str) -> Result<Self, InvoiceError> {
        toml::from_str(text).map_err(|e| InvoiceError::ConfigReadFailed {
            path: PathBuf::new(),
            reason: e.to_string(),
        })
    }

    /// Seed a builder with every value present in the file.
    pub fn into_builder(self) -> ExtractionConfigBuilder {
        let mut b = ExtractionConfig::builder();
        if let Some(p) = self.aws.s3_upload_path {
            b = b.remote_upload_path(p);
        }
        if let Some(p) = self.aws.profile {
            b = b.aws_profile(p);
        }
        if let Some(r) = self.aws.region {
            b = b.aws_region(r);
        }
        if let Some(o) = self.data.output_csv {
            b = b.output_csv_path(o);
        }
        if let Some(d) = self.data.responses_dir {
            b = b.responses_dir(d);
        }
        if let Some(ms) = self.polling.interval_ms {
            b = b.poll_interval_ms(ms);
        }
        if let Some(n) = self.polling.max_attempts {
            b = b.max_poll_attempts(n);
        }
        if let Some(l) = self.labels {
            b = b.labels(l);
        }
        b
    }
}
