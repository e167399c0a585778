//! Conversion orchestrator: one document in, one Markdown file out.
//!
//! ## Dispatch
//!
//! A [`ConversionJob`] is classified into a [`Pipeline`]:
//!
//! * [`Pipeline::Pdf`] runs the full-fidelity engine (layout backend, the
//!   configured OCR engine, page range applied) under a wall-clock budget.
//!   When the budget expires the attempt is aborted and the fallback engine
//!   converts the whole document with the lighter OCR engine.
//! * [`Pipeline::Office`] runs the flow engine once, without a budget.
//!
//! ## Why abort instead of racing?
//!
//! Layout analysis with OCR saturates the machine. Letting the slow attempt
//! keep running next to the fallback would only slow the fallback down, so at
//! most one engine runs per document: the fallback starts only after the full
//! attempt has been aborted. A full result that arrives after the deadline is
//! discarded.
//!
//! Generated assets are namespaced per tier (`images/<stem>/full/…` vs
//! `images/<stem>/fallback/…`), so references in the Markdown never point at
//! files written by an abandoned run.

use crate::config::{AnalysisMode, ConversionConfig, FallbackBackend, PageRange};
use crate::error::Tender2MdError;
use crate::output::{ConversionOutput, ConversionStats, JobOutcome, SkipReason, Tier};
use crate::pipeline::assets;
use crate::pipeline::engine::{Backend, CommandEngine, LayoutEngine, ParseRequest};
use crate::pipeline::input::{self, FormatKind};
use crate::pipeline::layout::{LayoutAnalyzer, PendingAsset, Strategy};
use crate::pipeline::pages::{self, PageCounter};
use crate::pipeline::pdfium::{PdfiumPageCounter, PdfiumTextEngine};
use crate::pipeline::{assemble, tree::DocumentTree};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One planned conversion. Immutable once built by [`Converter::plan`].
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source: PathBuf,
    /// Markdown destination; `None` renders without writing.
    pub target: Option<PathBuf>,
    pub format: FormatKind,
    /// Source size in bytes, used by the spreadsheet gate.
    pub size: u64,
    pub mode: AnalysisMode,
    /// Page count of a paginated source, as seen at planning time.
    pub total_pages: Option<usize>,
    /// Analyzed pages. Ignored by the flow pipeline.
    pub page_range: PageRange,
}

/// Pipeline selected for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// Time-bounded layout pipeline with fallback.
    Pdf { range: PageRange },
    /// Flow-format pipeline for docx/pptx/xlsx.
    Office,
}

impl ConversionJob {
    pub fn pipeline(&self) -> Pipeline {
        match self.format {
            FormatKind::Pdf => Pipeline::Pdf {
                range: self.page_range,
            },
            FormatKind::Docx | FormatKind::Pptx | FormatKind::Xlsx => Pipeline::Office,
        }
    }
}

/// Engine output before assembly.
struct Parsed {
    tree: DocumentTree,
    tier: Tier,
    page_range: Option<PageRange>,
    abandoned_ms: u64,
}

/// Runs conversion jobs with a fixed configuration and engine set.
#[derive(Clone)]
pub struct Converter {
    config: ConversionConfig,
    full: Arc<dyn LayoutEngine>,
    fallback: Option<Arc<dyn LayoutEngine>>,
    flow: Arc<dyn LayoutEngine>,
    page_counter: Arc<dyn PageCounter>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("full", &self.full.name())
            .field("fallback", &self.fallback.as_ref().map(|e| e.name().to_string()))
            .field("flow", &self.flow.name())
            .finish()
    }
}

impl Converter {
    /// Build a converter with the engines described by `config`.
    pub fn new(config: ConversionConfig) -> Self {
        let command: Arc<dyn LayoutEngine> = Arc::new(
            CommandEngine::new(&config.engine_program).with_args(config.engine_args.clone()),
        );
        let fallback: Option<Arc<dyn LayoutEngine>> = match config.fallback {
            FallbackBackend::Engine => Some(command.clone()),
            FallbackBackend::PdfiumText => Some(Arc::new(PdfiumTextEngine::new(
                config.pdfium_library.clone(),
            ))),
            FallbackBackend::Disabled => None,
        };
        let page_counter = Arc::new(PdfiumPageCounter::new(config.pdfium_library.clone()));
        Self {
            full: command.clone(),
            flow: command,
            fallback,
            page_counter,
            config,
        }
    }

    /// Build a converter with explicit engines.
    pub fn with_engines(
        config: ConversionConfig,
        full: Arc<dyn LayoutEngine>,
        fallback: Option<Arc<dyn LayoutEngine>>,
        flow: Arc<dyn LayoutEngine>,
    ) -> Self {
        let page_counter = Arc::new(PdfiumPageCounter::new(config.pdfium_library.clone()));
        Self {
            config,
            full,
            fallback,
            flow,
            page_counter,
        }
    }

    /// Replace the page counter used by [`Converter::plan`].
    pub fn with_page_counter(mut self, counter: Arc<dyn PageCounter>) -> Self {
        self.page_counter = counter;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Count the pages of a PDF on the blocking pool.
    pub async fn page_count(&self, path: &Path) -> Result<usize, Tender2MdError> {
        let counter = self.page_counter.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || counter.page_count(&path))
            .await
            .map_err(|e| Tender2MdError::Internal(format!("Page count task panicked: {}", e)))?
    }

    /// Validate `source` and resolve its page range.
    pub async fn plan(
        &self,
        source: &Path,
        target: Option<PathBuf>,
        mode: AnalysisMode,
    ) -> Result<ConversionJob, Tender2MdError> {
        let resolved = input::resolve_input(source)?;
        let total_pages = if resolved.format.is_paginated() {
            Some(self.page_count(&resolved.path).await?)
        } else {
            None
        };
        let page_range =
            pages::select_page_range(resolved.format, total_pages, mode, &self.config);
        debug!(
            "Planned {} ({}, {:?}, pages {})",
            resolved.path.display(),
            resolved.format.as_str(),
            mode,
            page_range
        );
        Ok(ConversionJob {
            source: resolved.path,
            target,
            format: resolved.format,
            size: resolved.size,
            mode,
            total_pages,
            page_range,
        })
    }

    /// Convert a job to Markdown without writing anything.
    pub async fn render(&self, job: &ConversionJob) -> Result<JobOutcome, Tender2MdError> {
        Ok(self.execute(job).await?.0)
    }

    /// Convert a job and write its picture assets, then its Markdown, to `job.target`.
    ///
    /// Without a target this behaves like [`Converter::render`].
    pub async fn run(&self, job: &ConversionJob) -> Result<JobOutcome, Tender2MdError> {
        let (outcome, pending) = self.execute(job).await?;
        let Some(target) = &job.target else {
            return Ok(outcome);
        };
        let mut output = match outcome {
            JobOutcome::Converted(output) => output,
            skipped => return Ok(skipped),
        };

        // A failed asset write must leave no Markdown behind.
        if !pending.is_empty() {
            let base = target.parent().unwrap_or_else(|| Path::new("."));
            output.stats.assets_written = assets::materialize_assets(base, pending).await?;
        }
        write_atomic(target, &output.markdown).await?;
        info!("Wrote {} ({} bytes)", target.display(), output.markdown.len());
        Ok(JobOutcome::Converted(output))
    }

    /// Plan and run in one step.
    pub async fn convert_file(
        &self,
        source: &Path,
        target: Option<PathBuf>,
        mode: AnalysisMode,
    ) -> Result<JobOutcome, Tender2MdError> {
        let job = self.plan(source, target, mode).await?;
        self.run(&job).await
    }

    async fn execute(
        &self,
        job: &ConversionJob,
    ) -> Result<(JobOutcome, Vec<PendingAsset>), Tender2MdError> {
        let started = Instant::now();

        if job.format == FormatKind::Xlsx && job.size > self.config.spreadsheet_size_limit_bytes {
            let reason = SkipReason::SpreadsheetTooLarge {
                size: job.size,
                limit: self.config.spreadsheet_size_limit_bytes,
            };
            info!("Skipping {}: {}", job.source.display(), reason);
            return Ok((JobOutcome::Skipped(reason), Vec::new()));
        }

        let (parsed, strategy) = match job.pipeline() {
            Pipeline::Pdf { range } => (self.parse_pdf(job, range).await?, Strategy::Paginated),
            Pipeline::Office => (self.parse_office(job).await?, Strategy::Flow),
        };

        let stem = job
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let prefix = format!("{}/{}/{}", self.config.images_dir, stem, parsed.tier.as_str());
        let analyzed = LayoutAnalyzer::new(strategy, prefix)
            .with_table_images(self.config.table_images)
            .with_extract_images(self.config.extract_images)
            .analyze(&parsed.tree);
        let markdown = assemble::assemble(&analyzed.items);

        let stats = ConversionStats {
            tier: parsed.tier,
            page_range: parsed.page_range,
            item_count: analyzed.items.len(),
            assets_written: 0,
            fell_back: parsed.tier == Tier::Fallback,
            abandoned_ms: parsed.abandoned_ms,
            total_duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Converted {} via {} tier: {} items in {}ms",
            job.source.display(),
            stats.tier.as_str(),
            stats.item_count,
            stats.total_duration_ms
        );

        let output = ConversionOutput {
            source: job.source.clone(),
            markdown,
            items: analyzed.items,
            stats,
        };
        Ok((JobOutcome::Converted(output), analyzed.assets))
    }

    async fn parse_pdf(
        &self,
        job: &ConversionJob,
        range: PageRange,
    ) -> Result<Parsed, Tender2MdError> {
        let budget = Duration::from_secs(self.config.full_fidelity_timeout_secs);
        let request = ParseRequest {
            path: job.source.clone(),
            page_range: Some(range),
            ocr: self.config.ocr_engine,
            backend: Backend::Layout,
            languages: self.config.ocr_languages.clone(),
            include_images: self.config.extract_images,
        };
        let engine = self.full.clone();
        let engine_name = engine.name().to_string();
        let started = Instant::now();

        let mut handle = tokio::spawn(async move { engine.parse(&request).await });

        match tokio::time::timeout(budget, &mut handle).await {
            Ok(joined) => {
                let tree = joined
                    .map_err(|e| Tender2MdError::Internal(format!("Engine task panicked: {}", e)))?
                    .map_err(|e| Tender2MdError::from_engine(&engine_name, &job.source, e))?;
                Ok(Parsed {
                    tree,
                    tier: Tier::FullFidelity,
                    page_range: Some(range),
                    abandoned_ms: 0,
                })
            }
            Err(_) => {
                handle.abort();
                let abandoned_ms = started.elapsed().as_millis() as u64;
                warn!(
                    "Full-fidelity conversion of {} exceeded {}s, falling back",
                    job.source.display(),
                    budget.as_secs()
                );
                let Some(fallback) = &self.fallback else {
                    return Err(Tender2MdError::Timeout {
                        path: job.source.clone(),
                        secs: budget.as_secs(),
                    });
                };
                let request = ParseRequest {
                    path: job.source.clone(),
                    page_range: None,
                    ocr: self.config.fallback_ocr_engine,
                    backend: Backend::Simple,
                    languages: self.config.ocr_languages.clone(),
                    include_images: self.config.extract_images,
                };
                let tree = fallback
                    .parse(&request)
                    .await
                    .map_err(|e| Tender2MdError::from_engine(fallback.name(), &job.source, e))?;
                Ok(Parsed {
                    tree,
                    tier: Tier::Fallback,
                    page_range: None,
                    abandoned_ms,
                })
            }
        }
    }

    async fn parse_office(&self, job: &ConversionJob) -> Result<Parsed, Tender2MdError> {
        let request = ParseRequest {
            path: job.source.clone(),
            page_range: None,
            ocr: self.config.ocr_engine,
            backend: Backend::Flow,
            languages: self.config.ocr_languages.clone(),
            include_images: self.config.extract_images,
        };
        let tree = self
            .flow
            .parse(&request)
            .await
            .map_err(|e| Tender2MdError::from_engine(self.flow.name(), &job.source, e))?;
        Ok(Parsed {
            tree,
            tier: Tier::Flow,
            page_range: None,
            abandoned_ms: 0,
        })
    }
}

/// Write `contents` to `path` via a temp file in the same directory + rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), Tender2MdError> {
    let path = path.to_path_buf();
    let contents = contents.to_owned();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &contents))
        .await
        .map_err(|e| Tender2MdError::Internal(format!("Write task panicked: {}", e)))?
}

fn write_atomic_blocking(path: &Path, contents: &str) -> Result<(), Tender2MdError> {
    let write_err = |source| Tender2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Synchronous wrapper around [`Converter::convert_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    config: ConversionConfig,
    source: &Path,
    target: Option<PathBuf>,
    mode: AnalysisMode,
) -> Result<JobOutcome, Tender2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Tender2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(Converter::new(config).convert_file(source, target, mode))
}
