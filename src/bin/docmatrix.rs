//! CLI binary for edgequake-docmatrix.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and writes results to disk.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docmatrix::convert::write_result;
use edgequake_docmatrix::pipeline::input::resolve_input;
use edgequake_docmatrix::{
    batch_archive_name, convert, inspect, merge, package_batch, ConversionConfig,
    ConversionProgressCallback, ConversionResult, DocumentInfo, FileStatus, OcrSettings,
    Orchestrator, ProgressCallback, SourceDocument, SourceFormat, TargetFormat, Tool,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

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

/// Terminal progress callback: one bar counting settled files, plus a log
/// line per file. Files settle out of order when the batch runs concurrently.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-file wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<Uuid, Instant>>,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading inputs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
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
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn elapsed(&self, file_id: Uuid) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&file_id)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Clear the bar; the caller prints its own summary.
    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, _batch_id: Uuid, files: usize) {
        self.activate_bar(files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting conversion of {files} files…"))
        ));
    }

    fn on_file_start(&self, file_id: Uuid, name: &str) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file_id, Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, file_id: Uuid, name: &str, bytes: usize) {
        let secs = self.elapsed(file_id);
        self.bar.println(format!(
            "  {} {:<40}  {:<12}  {}",
            green("✓"),
            name,
            dim(&format!("{bytes:>8} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, file_id: Uuid, name: &str, error: &str) {
        let secs = self.elapsed(file_id);
        let msg: String = if error.chars().count() > 80 {
            let mut cut: String = error.chars().take(79).collect();
            cut.push('\u{2026}');
            cut
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            red("✗"),
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _batch_id: Uuid, files: usize) {
        self.bar.println(format!(
            "{} {} files converted successfully",
            green("✔"),
            bold(&files.to_string())
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One file, output named after the input (report_converted.docx)
  docmatrix report.pdf --to word

  # Explicit output path
  docmatrix sales.xlsx --to pdf -o sales.pdf

  # Scanned image to editable text (needs an OCR endpoint)
  docmatrix scan.png --to text

  # PDF pages as PNG images into a directory
  docmatrix slides.pdf --to image -o pages/

  # Batch: every file converted separately, then zipped
  docmatrix a.docx b.docx c.docx --to pdf --zip

  # Merge several files into one output
  docmatrix q1.xlsx q2.xlsx q3.xlsx --to excel --merge -o year.xlsx

  # Inspect inputs without converting
  docmatrix --inspect-only --json deck.pptx notes.txt

FORMATS:
  pdf, word (docx), excel (xlsx), ppt (pptx), text (txt), image (png/jpg/webp)

ENVIRONMENT VARIABLES:
  DOCMATRIX_OCR_URL       OCR service endpoint
  DOCMATRIX_OCR_MODEL     OCR model name
  DOCMATRIX_OCR_API_KEY   OCR API key (falls back to MISTRAL_API_KEY)
  PDFIUM_LIB_PATH         Path to an existing libpdfium
"#;

/// Convert between PDF, Word, Excel, PowerPoint, text and images.
#[derive(Parser, Debug)]
#[command(
    name = "docmatrix",
    version,
    about = "Convert between PDF, Word, Excel, PowerPoint, text and images",
    long_about = "Convert documents between PDF, Word (DOCX), Excel (XLSX), PowerPoint (PPTX), \
plain text and raster images. Every conversion runs in-process except image recognition, \
which is sent to an OCR service.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Target format: pdf, word, excel, ppt, text, image.
    #[arg(long, env = "DOCMATRIX_TO", value_parser = parse_target,
          required_unless_present = "inspect_only")]
    to: Option<TargetFormat>,

    /// Expected source format; inputs of any other format fail validation.
    #[arg(long, env = "DOCMATRIX_FROM", value_parser = parse_source)]
    from: Option<SourceFormat>,

    /// Output file, or directory for page images and batches.
    #[arg(short, long, env = "DOCMATRIX_OUTPUT")]
    output: Option<PathBuf>,

    /// Merge every input into a single output.
    #[arg(long, conflicts_with = "zip")]
    merge: bool,

    /// Package batch results into one ZIP archive.
    #[arg(long)]
    zip: bool,

    /// Print a JSON summary instead of human-readable lines.
    #[arg(long, env = "DOCMATRIX_JSON")]
    json: bool,

    /// Print document information only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// OCR service endpoint (overrides DOCMATRIX_OCR_URL).
    #[arg(long)]
    ocr_url: Option<String>,

    /// OCR call timeout in seconds.
    #[arg(long, env = "DOCMATRIX_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCMATRIX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Files converted at once in batch mode.
    #[arg(short, long, env = "DOCMATRIX_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Disable progress bar.
    #[arg(long, env = "DOCMATRIX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCMATRIX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCMATRIX_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

fn parse_target(s: &str) -> Result<TargetFormat, String> {
    s.parse().map_err(|e: edgequake_docmatrix::DocMatrixError| e.to_string())
}

fn parse_source(s: &str) -> Result<SourceFormat, String> {
    s.parse().map_err(|e: edgequake_docmatrix::DocMatrixError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs in batch mode.
    let batch_mode = cli.inputs.len() > 1 && !cli.merge;
    let show_progress = batch_mode && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress || cli.json {
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

    let documents = resolve_all(&cli.inputs, cli.download_timeout).await?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let infos = documents
            .iter()
            .map(|doc| inspect(doc).with_context(|| format!("Failed to inspect {}", doc.name)))
            .collect::<Result<Vec<DocumentInfo>>>()?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&infos).context("Failed to serialize metadata")?
            );
        } else {
            for info in &infos {
                println!("File:         {}", info.name);
                println!("Format:       {}", info.format);
                println!("Size:         {} bytes", info.size_bytes);
                println!("{:<14}{}", format!("{}:", capitalise(&info.unit)), info.units);
                if let Some((w, h)) = info.dimensions {
                    println!("Dimensions:   {w}x{h}");
                }
                println!();
            }
        }
        return Ok(());
    }

    let target = cli.to.context("--to is required")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<(Arc<CliProgressCallback>, ProgressCallback)> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        let dyn_cb: ProgressCallback = cb.clone();
        Some((cb, dyn_cb))
    } else {
        None
    };
    let config = build_config(&cli, progress_cb.as_ref().map(|(_, cb)| Arc::clone(cb)))?;

    // ── Run conversion ───────────────────────────────────────────────────
    if cli.merge {
        let title = batch_title(&cli, &documents, target);
        let result = merge(&title, documents, target, &config)
            .await
            .context("Merge failed")?;
        let path = cli
            .output
            .clone()
            .unwrap_or_else(|| default_path(&result));
        let written = write_result(&result, &path)
            .await
            .context("Failed to write merged output")?;
        report_single(&cli, &result, &written);
        return Ok(());
    }

    if !batch_mode {
        let mut doc = documents
            .into_iter()
            .next()
            .context("No input documents")?;
        if let Some(from) = cli.from {
            doc = doc.accept_as(from).context("Input validation failed")?;
        }
        let result = convert(doc, target, &config)
            .await
            .context("Conversion failed")?;
        let path = cli
            .output
            .clone()
            .unwrap_or_else(|| default_path(&result));
        let written = write_result(&result, &path)
            .await
            .context("Failed to write output")?;
        report_single(&cli, &result, &written);
        return Ok(());
    }

    // ── Batch mode ───────────────────────────────────────────────────────
    let from = match cli.from {
        Some(from) => from,
        None => documents
            .first()
            .map(|d| d.format)
            .context("No input documents")?,
    };
    let tool = Tool::new(from, target);
    let orchestrator = Orchestrator::new(config).context("Invalid conversion registry")?;
    let report = orchestrator
        .run_batch(tool, documents)
        .await
        .with_context(|| format!("{} is not supported", tool.title()))?;
    if let Some((cb, _)) = &progress_cb {
        cb.finish();
    }

    let results: Vec<&ConversionResult> = report.results().into_iter().map(|(_, r)| r).collect();
    let mut written: Vec<PathBuf> = Vec::new();
    if cli.zip && !results.is_empty() {
        let bytes = package_batch(results.iter().copied()).context("Failed to build archive")?;
        let name = batch_archive_name(&tool.title());
        let path = match &cli.output {
            Some(p) if p.is_dir() => p.join(name),
            Some(p) => p.clone(),
            None => PathBuf::from(name),
        };
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    } else {
        let dir = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
        for result in &results {
            let path = match result {
                ConversionResult::Images(_) => dir.clone(),
                _ => dir.join(result.filename()),
            };
            written.extend(
                write_result(result, &path)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?,
            );
        }
    }

    let failed: Vec<_> = report.failed().collect();
    if cli.json {
        let files: Vec<_> = report
            .files
            .iter()
            .map(|f| {
                json!({
                    "name": f.name,
                    "status": f.status,
                    "output": f.result.as_ref().map(|r| r.filename().to_string()),
                    "error": f.error,
                })
            })
            .collect();
        let summary = json!({
            "tool": tool.id(),
            "batch_id": report.batch_id,
            "all_succeeded": report.all_succeeded(),
            "files": files,
            "written": written,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        let ok = report
            .files
            .iter()
            .filter(|f| f.status == FileStatus::Success)
            .count();
        eprintln!(
            "{}  {}/{} files  →  {}",
            if failed.is_empty() {
                green("✔")
            } else if ok == 0 {
                red("✘")
            } else {
                cyan("⚠")
            },
            ok,
            report.files.len(),
            bold(&describe_written(&written)),
        );
        if !show_progress {
            for f in &failed {
                let msg = f.error.as_ref().map(|e| e.message.as_str()).unwrap_or("");
                eprintln!("  {} {}  {}", red("✗"), f.name, red(msg));
            }
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("{} of {} files failed", failed.len(), report.files.len());
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut ocr = OcrSettings::from_env();
    if let Some(url) = &cli.ocr_url {
        ocr.endpoint = url.clone();
    }

    let mut builder = ConversionConfig::builder()
        .concurrency(cli.concurrency)
        .server_timeout_secs(cli.timeout)
        .download_timeout_secs(cli.download_timeout)
        .ocr_settings(ocr);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Read every input concurrently, failing on the first unreadable one.
async fn resolve_all(inputs: &[String], timeout_secs: u64) -> Result<Vec<SourceDocument>> {
    let resolved = futures::future::join_all(
        inputs.iter().map(|input| resolve_input(input, timeout_secs)),
    )
    .await;
    inputs
        .iter()
        .zip(resolved)
        .map(|(input, doc)| doc.with_context(|| format!("Failed to read {input}")))
        .collect()
}

/// Title used to name merged outputs and batch archives.
fn batch_title(cli: &Cli, documents: &[SourceDocument], target: TargetFormat) -> String {
    let from = cli.from.or_else(|| {
        let first = documents.first()?.format;
        documents.iter().all(|d| d.format == first).then_some(first)
    });
    match from {
        Some(from) => Tool::new(from, target).title(),
        None => format!("Documents to {target}"),
    }
}

/// Default location for a single result: its suggested filename, or the
/// current directory for page images.
fn default_path(result: &ConversionResult) -> PathBuf {
    match result {
        ConversionResult::Images(_) => PathBuf::from("."),
        _ => PathBuf::from(result.filename()),
    }
}

fn report_single(cli: &Cli, result: &ConversionResult, written: &[PathBuf]) {
    if cli.json {
        let summary = json!({
            "target": result.target(),
            "mime_type": result.mime_type(),
            "bytes": result.byte_len(),
            "written": written,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("{} {e}", red("✗")),
        }
    } else if !cli.quiet {
        eprintln!(
            "{}  {} bytes  →  {}",
            green("✔"),
            result.byte_len(),
            bold(&describe_written(written)),
        );
    }
}

fn describe_written(written: &[PathBuf]) -> String {
    match written {
        [] => "nothing written".to_string(),
        [one] => one.display().to_string(),
        [first, ..] => format!(
            "{} files in {}",
            written.len(),
            first
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
                .display()
        ),
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
