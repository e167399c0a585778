//! CLI binary for tender2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `NormalizeConfig` / `BatchConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tender2md::{
    normalize_tree, run_batch, AnalysisMode, BatchConfig, BatchProgressCallback, ConversionConfig,
    Converter, FallbackBackend, JobOutcome, LegacyConfig, NormalizeConfig, OcrEngine, ProgressCallback,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress for the batch driver: one bar plus a log line per
/// document. Lines are printed through the bar so they never tear it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Walking tender tree…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn relative(&self, path: &Path) -> String {
        let name = path.display().to_string();
        if name.chars().count() > 70 {
            let tail: String = name.chars().rev().take(69).collect::<Vec<_>>().into_iter().rev().collect();
            format!("\u{2026}{tail}")
        } else {
            name
        }
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_files as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_files} documents…"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, source: &Path) {
        self.bar.set_message(self.relative(source));
    }

    fn on_file_complete(&self, index: usize, total: usize, source: &Path, markdown_len: usize) {
        self.bar.println(format!(
            "  {} {:>4}/{:<4} {}  {}",
            green("✓"),
            index,
            total,
            self.relative(source),
            dim(&format!("{markdown_len} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_file_skipped(&self, index: usize, total: usize, source: &Path, reason: &str) {
        self.bar.println(format!(
            "  {} {:>4}/{:<4} {}  {}",
            yellow("–"),
            index,
            total,
            self.relative(source),
            dim(reason),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, source: &Path, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 80 {
            let head: String = first_line.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            first_line.to_string()
        };
        self.bar.println(format!(
            "  {} {:>4}/{:<4} {}  {}",
            red("✗"),
            index,
            total,
            self.relative(source),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, converted: usize, skipped: usize, failed: usize) {
        self.bar.finish_and_clear();
        let mark = if failed == 0 { green("✔") } else { cyan("⚠") };
        eprintln!(
            "{} {} converted, {} skipped, {} failed",
            mark,
            bold(&converted.to_string()),
            skipped,
            if failed == 0 {
                failed.to_string()
            } else {
                red(&failed.to_string())
            },
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Unpack archives, convert .doc/.odt/.rtf, drop duplicate renditions
  tender2md normalize docs_refined/2024-05-14

  # One document to stdout (general mode: last 20 pages of a PDF)
  tender2md convert смета.pdf

  # One document to a file, exhaustive-detail mode (last 3 pages)
  tender2md convert смета.pdf --mode ed -o смета.md

  # Whole hierarchy: docs_refined/<date>/<client>/<template>/<tender>/{ed,common}
  tender2md batch --input docs_refined --output docs_md --sync-back

  # Page count and the range that would be analyzed
  tender2md pages смета.pdf --mode ed

  # Budget of 60 s, in-process text fallback instead of the external engine
  tender2md --timeout 60 --fallback pdfium-text convert scan.pdf

ENGINE CONTRACT:
  <engine> [engine args] --backend layout|simple|flow --ocr easyocr|tesseract|mac
           [--lang ru,en] [--pages S-E] [--images] <file>
  prints a JSON document tree on stdout; exit 3 = unreadable document.

ENVIRONMENT VARIABLES:
  TENDER2MD_ENGINE            Structure-extraction program (default: docling-tree)
  TENDER2MD_TIMEOUT           Full-fidelity budget in seconds (default: 180)
  TENDER2MD_FALLBACK          engine | pdfium-text | disabled
  TENDER2MD_PDFIUM_LIBRARY    Path to libpdfium (page counts, text fallback)
  RUST_LOG                    Overrides --verbose / --quiet log filtering
"#;

/// Normalize procurement document bundles and convert them to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "tender2md",
    version,
    about = "Normalize procurement document bundles and convert them to Markdown",
    long_about = "Unpack nested archives, convert legacy office formats, collapse duplicate \
renditions, and convert PDF/DOCX/PPTX/XLSX documents to Markdown with a latency-bounded \
layout pipeline that falls back to a cheaper engine when the full one is too slow.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    engine: EngineArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TENDER2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TENDER2MD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Unpack archives, convert legacy formats and remove duplicates in place.
    Normalize(NormalizeArgs),
    /// Convert one document.
    Convert(ConvertArgs),
    /// Convert every document of a date/client/template/tender hierarchy.
    Batch(BatchArgs),
    /// Print the page count of a PDF and the range that would be analyzed.
    Pages(PagesArgs),
}

/// Conversion settings shared by `convert`, `batch` and `pages`.
#[derive(Args, Debug)]
struct EngineArgs {
    /// Structure-extraction program.
    #[arg(long, global = true, env = "TENDER2MD_ENGINE", default_value = "docling-tree")]
    engine: PathBuf,

    /// Extra argument passed to the engine before the generated flags (repeatable).
    #[arg(long = "engine-arg", global = true, allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// OCR engine for the full-fidelity pipeline: easyocr, tesseract, mac.
    #[arg(long, global = true, env = "TENDER2MD_OCR", default_value = "easyocr")]
    ocr: OcrEngine,

    /// OCR engine for the fallback pipeline.
    #[arg(long, global = true, env = "TENDER2MD_FALLBACK_OCR", default_value = "tesseract")]
    fallback_ocr: OcrEngine,

    /// What runs once the full-fidelity budget is exhausted.
    #[arg(long, global = true, env = "TENDER2MD_FALLBACK", value_enum, default_value = "engine")]
    fallback: FallbackArg,

    /// OCR languages, comma-separated.
    #[arg(long, global = true, env = "TENDER2MD_LANG", value_delimiter = ',', default_value = "ru,en")]
    lang: Vec<String>,

    /// Full-fidelity budget in seconds.
    #[arg(long, global = true, env = "TENDER2MD_TIMEOUT", default_value_t = 180,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Skip .xlsx files larger than this many KB.
    #[arg(long, global = true, env = "TENDER2MD_XLSX_LIMIT_KB", default_value_t = 50)]
    xlsx_limit_kb: u64,

    /// Write picture pixels returned by the engine next to the Markdown.
    #[arg(long, global = true, env = "TENDER2MD_EXTRACT_IMAGES")]
    extract_images: bool,

    /// Do not pair PDF tables with an image reference.
    #[arg(long, global = true, env = "TENDER2MD_NO_TABLE_IMAGES")]
    no_table_images: bool,

    /// Asset directory name, relative to each Markdown file.
    #[arg(long, global = true, env = "TENDER2MD_IMAGES_DIR", default_value = "images")]
    images_dir: String,

    /// Path to libpdfium (page counts and the pdfium-text fallback).
    #[arg(long, global = true, env = "TENDER2MD_PDFIUM_LIBRARY")]
    pdfium_library: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FallbackArg {
    Engine,
    PdfiumText,
    Disabled,
}

impl From<FallbackArg> for FallbackBackend {
    fn from(v: FallbackArg) -> Self {
        match v {
            FallbackArg::Engine => FallbackBackend::Engine,
            FallbackArg::PdfiumText => FallbackBackend::PdfiumText,
            FallbackArg::Disabled => FallbackBackend::Disabled,
        }
    }
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    /// Directory to normalize in place.
    dir: PathBuf,

    /// Skip legacy-format conversion.
    #[arg(long, env = "TENDER2MD_NO_LEGACY")]
    no_legacy: bool,

    /// Legacy converter program.
    #[arg(long, env = "TENDER2MD_CONVERTER", default_value = "unoconv")]
    converter: PathBuf,

    /// Per-file legacy conversion timeout in seconds.
    #[arg(long, env = "TENDER2MD_LEGACY_TIMEOUT", default_value_t = 90)]
    legacy_timeout: u64,

    /// Extension preference for duplicate renditions, best first.
    #[arg(long, env = "TENDER2MD_PRIORITY", value_delimiter = ',', default_value = ".xlsx,.docx,.pdf")]
    priority: Vec<String>,

    /// Maximum archive extraction passes.
    #[arg(long, env = "TENDER2MD_MAX_PASSES", default_value_t = 16)]
    max_passes: usize,

    /// Code page for non-UTF-8 zip entry names.
    #[arg(long, env = "TENDER2MD_ZIP_ENCODING", default_value = "ibm866")]
    zip_encoding: String,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Document to convert (pdf, docx, pptx, xlsx).
    input: PathBuf,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "TENDER2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Page-selection mode: ed (last 3 pages) or common (last 20 pages).
    #[arg(long, default_value = "common")]
    mode: AnalysisMode,

    /// Output structured JSON (ConversionOutput) instead of Markdown.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Root of the date/client/template/tender hierarchy.
    #[arg(long, env = "TENDER2MD_INPUT", default_value = "docs_refined")]
    input: PathBuf,

    /// Root of the mirrored Markdown tree.
    #[arg(long, env = "TENDER2MD_OUTPUT_ROOT", default_value = "docs_md")]
    output: PathBuf,

    /// Move the Markdown back into the input tree afterwards.
    #[arg(long, env = "TENDER2MD_SYNC_BACK")]
    sync_back: bool,

    /// Documents converted at once.
    #[arg(short, long, env = "TENDER2MD_CONCURRENCY", default_value_t = 1,
          value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: u64,

    /// Disable progress bar.
    #[arg(long, env = "TENDER2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Print the batch report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PagesArgs {
    /// PDF to inspect.
    input: PathBuf,

    /// Page-selection mode: ed or common.
    #[arg(long, default_value = "common")]
    mode: AnalysisMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The batch progress bar carries the per-file feedback, so library INFO
    // logs are suppressed while it is visible.
    let bar_visible = matches!(&cli.command, Command::Batch(b) if !b.no_progress && !b.json);
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || bar_visible {
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

    match &cli.command {
        Command::Normalize(args) => cmd_normalize(&cli, args).await,
        Command::Convert(args) => cmd_convert(&cli, args).await,
        Command::Batch(args) => cmd_batch(&cli, args, bar_visible && !cli.quiet).await,
        Command::Pages(args) => cmd_pages(&cli, args).await,
    }
}

async fn cmd_normalize(cli: &Cli, args: &NormalizeArgs) -> Result<()> {
    let defaults = NormalizeConfig::default();
    let config = NormalizeConfig {
        max_archive_passes: args.max_passes,
        zip_name_encoding: Some(args.zip_encoding.clone()),
        convert_legacy: !args.no_legacy,
        legacy: LegacyConfig {
            program: args.converter.clone(),
            timeout_secs: args.legacy_timeout,
            ..defaults.legacy
        },
        priority_order: args.priority.clone(),
    };

    let report = normalize_tree(&args.dir, &config)
        .await
        .with_context(|| format!("Failed to normalize {}", args.dir.display()))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{} {} archive(s) extracted in {} pass(es), {} legacy file(s) converted, {} duplicate(s) removed",
            if report.errors.is_empty() { green("✔") } else { cyan("⚠") },
            bold(&report.archives_extracted.to_string()),
            report.archive_passes,
            bold(&report.legacy_converted.to_string()),
            bold(&report.duplicates_removed.len().to_string()),
        );
        for e in &report.errors {
            eprintln!("  {} {}", red("✗"), e);
        }
    }
    Ok(())
}

async fn cmd_convert(cli: &Cli, args: &ConvertArgs) -> Result<()> {
    let converter = Converter::new(build_config(&cli.engine)?);
    let job = converter
        .plan(&args.input, args.output.clone(), args.mode)
        .await
        .with_context(|| format!("Failed to plan {}", args.input.display()))?;
    let outcome = converter.run(&job).await.context("Conversion failed")?;

    let output = match outcome {
        JobOutcome::Converted(output) => output,
        JobOutcome::Skipped(reason) => {
            if !cli.quiet {
                eprintln!("{} skipped {}: {}", yellow("–"), args.input.display(), reason);
            }
            return Ok(());
        }
    };

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if args.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.markdown.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        let range = output
            .stats
            .page_range
            .map(|r| format!("pages {r}"))
            .unwrap_or_else(|| "whole document".to_string());
        let tier = if output.stats.fell_back {
            yellow(output.stats.tier.as_str())
        } else {
            green(output.stats.tier.as_str())
        };
        eprintln!(
            "{}  {} tier  {}  {} items  {}ms{}",
            green("✔"),
            tier,
            dim(&range),
            output.stats.item_count,
            output.stats.total_duration_ms,
            args.output
                .as_ref()
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
        );
    }
    Ok(())
}

async fn cmd_batch(cli: &Cli, args: &BatchArgs, show_progress: bool) -> Result<()> {
    let converter = Converter::new(build_config(&cli.engine)?);
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = BatchConfig {
        input_root: args.input.clone(),
        output_root: args.output.clone(),
        concurrency: usize::try_from(args.concurrency).unwrap_or(usize::MAX),
        sync_back: args.sync_back,
        progress,
        ..BatchConfig::default()
    };

    let report = run_batch(&converter, &config)
        .await
        .with_context(|| format!("Batch over {} failed", args.input.display()))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        eprintln!(
            "   {} documents  {} via fallback  {}ms{}",
            report.total(),
            report.fallbacks,
            report.duration_ms,
            if args.sync_back {
                format!("  {} synced back", report.synced)
            } else {
                String::new()
            },
        );
        if !show_progress {
            for f in &report.failed {
                eprintln!("  {} {}: {}", red("✗"), f.source.display(), f.error);
            }
        }
    }
    if let Some(ref e) = report.sync_error {
        anyhow::bail!("Sync back into {} failed: {e}", args.input.display());
    }
    Ok(())
}

async fn cmd_pages(cli: &Cli, args: &PagesArgs) -> Result<()> {
    let converter = Converter::new(build_config(&cli.engine)?);
    let job = converter
        .plan(&args.input, None, args.mode)
        .await
        .with_context(|| format!("Failed to inspect {}", args.input.display()))?;

    println!("File:    {}", job.source.display());
    println!("Format:  {}", job.format.as_str());
    if let Some(total) = job.total_pages {
        println!("Pages:   {total}");
        println!("Range:   {} ({} mode)", job.page_range, args.mode.dir_name());
    } else {
        println!("Range:   whole document");
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(args: &EngineArgs) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .engine_program(args.engine.clone())
        .engine_args(args.engine_args.clone())
        .ocr_engine(args.ocr)
        .fallback_ocr_engine(args.fallback_ocr)
        .fallback(args.fallback.into())
        .ocr_languages(args.lang.clone())
        .full_fidelity_timeout_secs(args.timeout)
        .spreadsheet_size_limit_bytes(args.xlsx_limit_kb * 1024)
        .extract_images(args.extract_images)
        .table_images(!args.no_table_images)
        .images_dir(args.images_dir.clone());

    if let Some(ref lib) = args.pdfium_library {
        builder = builder.pdfium_library(lib.clone());
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = Cli::try_parse_from(["tender2md", "batch", "--concurrency", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn concurrency_accepts_positive_values() {
        let cli = Cli::try_parse_from(["tender2md", "batch", "-c", "4"]).unwrap();
        match cli.command {
            Command::Batch(args) => assert_eq!(args.concurrency, 4),
            other => panic!("unexpected {other:?}"),
        }
    }
}
