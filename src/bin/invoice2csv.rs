//! CLI binary for invoice2csv.
//!
//! A thin shim over the library crate that merges `config.toml` with CLI
//! flags into an `ExtractionConfig`, runs the batch and prints a summary.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice2csv::{
    remap_response, run, ConfigFile, ExtractionConfig, ExtractionConfigBuilder, ProgressCallback,
    RunProgressCallback, RunReport,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar over the batch plus one log line
/// per finished invoice.
struct CliProgressCallback {
    bar: ProgressBar,
    /// File name and start time per in-flight file.
    files: Mutex<HashMap<usize, (String, Instant)>>,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` tells us how many files there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving inputs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            files: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn take_file(&self, file_num: usize) -> (String, f64) {
        self.files
            .lock()
            .unwrap()
            .remove(&file_num)
            .map(|(name, t)| (name, t.elapsed().as_secs_f64()))
            .unwrap_or_else(|| (format!("file {file_num}"), 0.0))
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_files} invoice(s)…"))
        ));
    }

    fn on_file_start(&self, file_num: usize, _total: usize, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.bar.set_message(format!("uploading {name}"));
        self.files
            .lock()
            .unwrap()
            .insert(file_num, (name, Instant::now()));
    }

    fn on_job_submitted(&self, _file_num: usize, job_id: &str) {
        self.bar.set_message(format!("job {job_id}"));
    }

    fn on_file_complete(&self, file_num: usize, total: usize, records: usize) {
        let (name, secs) = self.take_file(file_num);
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<32}  {:<10}  {}",
            green("✓"),
            file_num,
            total,
            name,
            dim(&format!("{records:>4} rows")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, file_num: usize, total: usize, error: &str) {
        let (name, secs) = self.take_file(file_num);

        // Keep each line on one row; the full message is in the logs / JSON.
        let first_line = error.lines().next().unwrap_or_default();
        let msg: String = if first_line.chars().count() > 80 {
            first_line.chars().take(79).chain(['…']).collect()
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<32}  {}  {}",
            red("✗"),
            file_num,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} invoice(s) extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} invoices extracted  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Everything in [data] input_folder of ./config.toml
  invoice2csv

  # Explicit files, appended to a chosen CSV
  invoice2csv march.pdf april.pdf -o out/invoices.csv

  # A whole folder, with an upload prefix given on the command line
  invoice2csv --remote-path s3://my-bucket/textract/ invoices/

  # Keep raw responses, then re-map them later without any AWS call
  invoice2csv --save-responses responses/ invoices/
  invoice2csv --from-response 'responses/*.json' -o remapped.csv

  # JSON run report on stdout
  invoice2csv --json invoices/ > report.json

CONFIG FILE (config.toml):
  [aws]
  s3_upload_path = "s3://my-bucket/textract/"
  profile        = "default"

  [data]
  input_folder = "invoices"
  output_csv   = "invoices.csv"

  [polling]
  interval_ms  = 250
  max_attempts = 1200

  [labels]
  table_marker = "product name"
  quantity     = ["qty", "quantity"]

ENVIRONMENT VARIABLES:
  AWS_PROFILE / AWS_REGION / AWS_ACCESS_KEY_ID …   standard AWS SDK settings
  RUST_LOG                                          log filter, e.g. invoice2csv=debug

OUTPUT:
  description,quantity,unit_price,line_total,invoice_date
  The file is appended to; the header is written only when it is empty.
"#;

/// Extract invoice line items from PDFs with AWS Textract into CSV.
#[derive(Parser, Debug)]
#[command(
    name = "invoice2csv",
    version,
    about = "Extract invoice line items from PDFs with AWS Textract into CSV",
    long_about = "Upload PDF invoices to S3, analyse them with Textract (tables + forms), \
find the invoice date and the product table, and append one CSV row per line item.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files, directories or glob patterns. Default: `[data] input_folder`.
    inputs: Vec<String>,

    /// TOML configuration file. Default: ./config.toml when present.
    #[arg(short, long, env = "INVOICE2CSV_CONFIG")]
    config: Option<PathBuf>,

    /// Upload prefix, `s3://bucket/prefix/`. Overrides `[aws] s3_upload_path`.
    #[arg(long, env = "INVOICE2CSV_REMOTE_PATH")]
    remote_path: Option<String>,

    /// CSV file to append to. Overrides `[data] output_csv`.
    #[arg(short, long, env = "INVOICE2CSV_OUTPUT")]
    output: Option<PathBuf>,

    /// AWS credentials profile. Overrides `[aws] profile`.
    #[arg(long, env = "INVOICE2CSV_PROFILE")]
    profile: Option<String>,

    /// AWS region. Overrides `[aws] region`.
    #[arg(long, env = "INVOICE2CSV_REGION")]
    region: Option<String>,

    /// Delay between job status queries in milliseconds.
    #[arg(long, env = "INVOICE2CSV_POLL_INTERVAL_MS",
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: Option<u64>,

    /// Status queries per job before giving up.
    #[arg(long, env = "INVOICE2CSV_MAX_POLL_ATTEMPTS")]
    max_poll_attempts: Option<u32>,

    /// Treat inputs as saved analysis responses (*.json); no AWS calls.
    #[arg(long)]
    from_response: bool,

    /// Save every raw analysis response as JSON into this directory.
    #[arg(long, env = "INVOICE2CSV_SAVE_RESPONSES")]
    save_responses: Option<PathBuf>,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "INVOICE2CSV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "INVOICE2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INVOICE2CSV_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Config file ──────────────────────────────────────────────────────
    let file = load_config_file(cli.config.as_deref())?;
    let inputs = resolve_cli_inputs(&cli, &file)?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn RunProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, file, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = if cli.from_response {
        remap_response(&inputs, &config).context("Re-mapping saved responses failed")?
    } else {
        run(&inputs, &config).await.context("Extraction failed")?
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, show_progress);
    }

    Ok(())
}

/// Load `--config`, or `./config.toml` if it exists, or nothing.
fn load_config_file(path: Option<&Path>) -> Result<ConfigFile> {
    match path {
        Some(p) => ConfigFile::load(p).with_context(|| format!("Failed to load {}", p.display())),
        None => {
            let default = Path::new("config.toml");
            if default.is_file() {
                ConfigFile::load(default).context("Failed to load ./config.toml")
            } else {
                Ok(ConfigFile::default())
            }
        }
    }
}

/// Inputs from the command line, else the configured input folder.
fn resolve_cli_inputs(cli: &Cli, file: &ConfigFile) -> Result<Vec<String>> {
    if !cli.inputs.is_empty() {
        return Ok(cli.inputs.clone());
    }
    match file.data.input_folder {
        Some(ref dir) => Ok(vec![dir.display().to_string()]),
        None => bail!(
            "No inputs given and no [data] input_folder configured.\n\
             Try: invoice2csv invoices/*.pdf --remote-path s3://bucket/prefix/"
        ),
    }
}

/// Merge the config file with CLI overrides into an `ExtractionConfig`.
fn build_config(
    cli: &Cli,
    file: ConfigFile,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let mut builder: ExtractionConfigBuilder = file.into_builder();

    if let Some(ref p) = cli.remote_path {
        builder = builder.remote_upload_path(p.clone());
    }
    if let Some(ref o) = cli.output {
        builder = builder.output_csv_path(o.clone());
    }
    if let Some(ref p) = cli.profile {
        builder = builder.aws_profile(p.clone());
    }
    if let Some(ref r) = cli.region {
        builder = builder.aws_region(r.clone());
    }
    if let Some(ms) = cli.poll_interval_ms {
        builder = builder.poll_interval_ms(ms);
    }
    if let Some(n) = cli.max_poll_attempts {
        builder = builder.max_poll_attempts(n);
    }
    if let Some(ref d) = cli.save_responses {
        builder = builder.responses_dir(d.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let config = if cli.from_response {
        builder.build_offline()
    } else {
        builder.build()
    };
    config.context("Invalid configuration")
}

fn print_summary(report: &RunReport, show_progress: bool) {
    let stats = &report.stats;

    // The progress callback already printed per-file lines.
    if !show_progress {
        for f in report.files.iter().filter(|f| !f.is_success()) {
            if let Some(ref e) = f.error {
                eprintln!("{} {}: {}", red("✗"), f.path.display(), e.message);
            }
        }
    }

    eprintln!(
        "{}  {}/{} files  {} rows  {}ms  →  {}",
        if stats.failed_files == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.processed_files,
        stats.total_files,
        stats.records_written,
        stats.total_duration_ms,
        bold(&report.output_csv.display().to_string()),
    );
    if stats.files_without_date > 0 {
        eprintln!(
            "   {}",
            dim(&format!(
                "{} file(s) without a recognised invoice date",
                stats.files_without_date
            ))
        );
    }
}
