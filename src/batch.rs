//! Batch driver over the `date/client/template/tender` document hierarchy.
//!
//! ```text
//! input_root/2024-05-14/client/template/tender-17/ed/смета.pdf
//!         ──▶ output_root/2024-05-14/client/template/tender-17/ed/смета.md
//! ```
//!
//! Within a tender the `ed` subfolder holds exhaustive-detail documents (last
//! few pages analyzed) and `common` everything else. A failure on one document
//! is logged with its path and recorded in the [`BatchReport`]; it never stops
//! the batch.

use crate::config::{AnalysisMode, BatchConfig};
use crate::convert::Converter;
use crate::error::{ErrorClass, Tender2MdError};
use crate::output::JobOutcome;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// One eligible document and where its Markdown goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDocument {
    pub source: PathBuf,
    pub target: PathBuf,
    pub mode: AnalysisMode,
}

/// A document that failed to convert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub source: PathBuf,
    pub class: ErrorClass,
    pub error: String,
}

/// Outcome of [`run_batch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub converted: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, String)>,
    pub failed: Vec<BatchFailure>,
    /// Converted documents that needed the fallback tier.
    pub fallbacks: usize,
    /// Markdown files moved back by the sync phase.
    pub synced: usize,
    /// Why the sync phase stopped early, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.converted.len() + self.skipped.len() + self.failed.len()
    }
}

// ── Discovery ────────────────────────────────────────────────────────────

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>, Tender2MdError> {
    let entries = fs::read_dir(dir).map_err(|e| Tender2MdError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Tender directories four levels below `root`, sorted at every level.
pub fn discover_tenders(root: &Path) -> Result<Vec<PathBuf>, Tender2MdError> {
    let mut level = vec![root.to_path_buf()];
    for _ in 0..4 {
        let mut next = Vec::new();
        for dir in &level {
            next.extend(sorted_subdirs(dir)?);
        }
        level = next;
    }
    Ok(level)
}

/// Recursively collect files under `dir` with one of `extensions`, sorted.
pub fn collect_documents(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut docs: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|x| x.to_string_lossy())
                .is_some_and(|x| extensions.iter().any(|want| want.eq_ignore_ascii_case(&x)))
        })
        .map(|e| e.into_path())
        .collect();
    docs.sort();
    docs
}

/// Mirror `source` (under `input_root`) to an `.md` path under `output_root`.
pub fn target_path(input_root: &Path, output_root: &Path, source: &Path) -> Option<PathBuf> {
    let rel = source.strip_prefix(input_root).ok()?;
    Some(output_root.join(rel).with_extension("md"))
}

/// Every eligible document of the batch, in processing order.
pub fn plan_batch(config: &BatchConfig) -> Result<Vec<BatchDocument>, Tender2MdError> {
    let mut docs = Vec::new();
    for tender in discover_tenders(&config.input_root)? {
        debug!("Tender {}", tender.display());
        for mode in AnalysisMode::ALL {
            let mode_dir = tender.join(mode.dir_name());
            if !mode_dir.is_dir() {
                continue;
            }
            for source in collect_documents(&mode_dir, &config.extensions) {
                let Some(target) = target_path(&config.input_root, &config.output_root, &source)
                else {
                    continue;
                };
                docs.push(BatchDocument {
                    source,
                    target,
                    mode,
                });
            }
        }
    }
    Ok(docs)
}

// ── Execution ────────────────────────────────────────────────────────────

enum DocResult {
    Converted { fell_back: bool },
    Skipped(String),
    Failed(Tender2MdError),
}

/// Convert every document of the batch.
///
/// Documents run through a bounded pool of `config.concurrency` (default 1,
/// i.e. strictly sequential). Errors are isolated per document.
pub async fn run_batch(
    converter: &Converter,
    config: &BatchConfig,
) -> Result<BatchReport, Tender2MdError> {
    let started = Instant::now();
    let docs = plan_batch(config)?;
    let total = docs.len();
    info!(
        "Batch: {} document(s) under {}",
        total,
        config.input_root.display()
    );
    if let Some(ref cb) = config.progress {
        cb.on_batch_start(total);
    }

    let results: Vec<(BatchDocument, DocResult)> =
        stream::iter(docs.into_iter().enumerate().map(|(i, doc)| {
            let progress = config.progress.clone();
            async move {
                let index = i + 1;
                if let Some(ref cb) = progress {
                    cb.on_file_start(index, total, &doc.source);
                }
                let result = match converter
                    .convert_file(&doc.source, Some(doc.target.clone()), doc.mode)
                    .await
                {
                    Ok(JobOutcome::Converted(out)) => {
                        if let Some(ref cb) = progress {
                            cb.on_file_complete(index, total, &doc.source, out.markdown.len());
                        }
                        DocResult::Converted {
                            fell_back: out.stats.fell_back,
                        }
                    }
                    Ok(JobOutcome::Skipped(reason)) => {
                        let reason = reason.to_string();
                        if let Some(ref cb) = progress {
                            cb.on_file_skipped(index, total, &doc.source, &reason);
                        }
                        DocResult::Skipped(reason)
                    }
                    Err(e) => {
                        match e.class() {
                            ErrorClass::Conversion => {
                                warn!("ConversionError: {}: {}", doc.source.display(), e)
                            }
                            _ => error!("ERROR: {}: {}", doc.source.display(), e),
                        }
                        if let Some(ref cb) = progress {
                            cb.on_file_error(index, total, &doc.source, &e.to_string());
                        }
                        DocResult::Failed(e)
                    }
                };
                (doc, result)
            }
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let mut report = BatchReport::default();
    for (doc, result) in results {
        match result {
            DocResult::Converted { fell_back } => {
                report.fallbacks += usize::from(fell_back);
                report.converted.push(doc.source);
            }
            DocResult::Skipped(reason) => report.skipped.push((doc.source, reason)),
            DocResult::Failed(e) => report.failed.push(BatchFailure {
                source: doc.source,
                class: e.class(),
                error: e.to_string(),
            }),
        }
    }
    report.converted.sort();
    report.skipped.sort();
    report.failed.sort_by(|a, b| a.source.cmp(&b.source));

    if config.sync_back {
        match sync_back(&config.output_root, &config.input_root) {
            Ok(moved) => report.synced = moved,
            Err(e) => {
                error!("Sync back failed: {e}");
                report.sync_error = Some(e.to_string());
            }
        }
    }

    report.duration_ms = started.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress {
        cb.on_batch_complete(report.converted.len(), report.skipped.len(), report.failed.len());
    }
    info!(
        "Batch done: {} converted ({} via fallback), {} skipped, {} failed in {}ms",
        report.converted.len(),
        report.fallbacks,
        report.skipped.len(),
        report.failed.len(),
        report.duration_ms
    );
    Ok(report)
}

/// Move every `.md` under `md_root` to the same relative path under `refined_root`.
///
/// Returns the number of files moved.
pub fn sync_back(md_root: &Path, refined_root: &Path) -> Result<usize, Tender2MdError> {
    let mut moved = 0;
    for entry in WalkDir::new(md_root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|x| x.eq_ignore_ascii_case("md"))
        })
    {
        let Ok(rel) = entry.path().strip_prefix(md_root) else {
            continue;
        };
        let dest = refined_root.join(rel);
        let io_err = |source| Tender2MdError::Io {
            path: dest.clone(),
            source,
        };
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        if fs::rename(entry.path(), &dest).is_err() {
            // Different filesystem: copy, then remove the original.
            fs::copy(entry.path(), &dest).map_err(io_err)?;
            fs::remove_file(entry.path()).map_err(|source| Tender2MdError::Io {
                path: entry.path().to_path_buf(),
                source,
            })?;
        }
        debug!("Synced {}", dest.display());
        moved += 1;
    }
    info!("Synced {moved} Markdown file(s) into {}", refined_root.display());
    Ok(moved)
}
