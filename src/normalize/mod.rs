//! Archive normalizer: turn a raw tender bundle into a flat set of documents.
//!
//! Three steps run in order over one directory tree:
//!
//! 1. [`archive::extract_archives`] — unpack zip/rar/7z in place, recursively
//! 2. [`legacy::convert_legacy_formats`] — `.doc`/`.odt`/`.rtf` → `.docx`
//! 3. [`dedup::remove_duplicates`] — keep one rendition per stem
//!
//! Failures are per file and non-fatal: they land in
//! [`NormalizeReport::errors`] and the remaining files are still processed.
//! Archive and duplicate passes are filesystem-bound and run on the blocking
//! pool; the legacy step awaits its external converter.

pub mod archive;
pub mod dedup;
pub mod legacy;

use crate::config::NormalizeConfig;
use crate::error::{NormalizeError, Tender2MdError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Summary of one [`normalize_tree`] run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub archives_extracted: usize,
    /// Number of extraction passes that found at least one archive.
    pub archive_passes: usize,
    pub legacy_converted: usize,
    pub duplicates_removed: Vec<PathBuf>,
    pub errors: Vec<NormalizeError>,
}

/// Run archive extraction, legacy conversion and duplicate removal on `dir`.
pub async fn normalize_tree(
    dir: &Path,
    config: &NormalizeConfig,
) -> Result<NormalizeReport, Tender2MdError> {
    if !dir.is_dir() {
        return Err(Tender2MdError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }
    info!("Normalizing {}", dir.display());

    let root = dir.to_path_buf();
    let cfg = config.clone();
    let mut report = tokio::task::spawn_blocking(move || {
        let mut report = NormalizeReport::default();
        archive::extract_archives(&root, &cfg, &mut report);
        report
    })
    .await
    .map_err(|e| Tender2MdError::Internal(format!("Archive task panicked: {}", e)))?;

    if config.convert_legacy {
        legacy::convert_legacy_formats(dir, &config.legacy, &mut report).await;
    }

    let root = dir.to_path_buf();
    let priority = config.priority_order.clone();
    let report = tokio::task::spawn_blocking(move || {
        dedup::remove_duplicates(&root, &priority, &mut report);
        report
    })
    .await
    .map_err(|e| Tender2MdError::Internal(format!("Dedup task panicked: {}", e)))?;

    info!(
        "Normalized {}: {} archive(s), {} legacy file(s), {} duplicate(s), {} error(s)",
        dir.display(),
        report.archives_extracted,
        report.legacy_converted,
        report.duplicates_removed.len(),
        report.errors.len()
    );
    Ok(report)
}
