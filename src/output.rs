//! Results of converting a single document.

use crate::config::PageRange;
use crate::content::ContentItem;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which pipeline produced the Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Layout model + selected OCR engine, page range applied.
    FullFidelity,
    /// Reduced-fidelity pipeline that ran after the budget expired.
    Fallback,
    /// Flow-format (docx/pptx/xlsx) pipeline.
    Flow,
}

impl Tier {
    /// Directory name used to namespace generated assets.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::FullFidelity => "full",
            Tier::Fallback => "fallback",
            Tier::Flow => "flow",
        }
    }
}

/// Timing and provenance for one conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionStats {
    pub tier: Tier,
    /// Range analyzed; `None` when the whole document was converted.
    pub page_range: Option<PageRange>,
    pub item_count: usize,
    pub assets_written: usize,
    /// True when the full-fidelity attempt timed out.
    pub fell_back: bool,
    /// Time spent in the abandoned full-fidelity attempt.
    pub abandoned_ms: u64,
    pub total_duration_ms: u64,
}

/// Markdown plus the structure it was assembled from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub source: PathBuf,
    pub markdown: String,
    pub items: Vec<ContentItem>,
    pub stats: ConversionStats,
}

/// Why a document was not converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Spreadsheet above the size gate.
    SpreadsheetTooLarge { size: u64, limit: u64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::SpreadsheetTooLarge { size, limit } => {
                write!(f, "spreadsheet too large ({size} bytes > {limit} bytes)")
            }
        }
    }
}

/// Outcome of running the orchestrator on one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobOutcome {
    Converted(ConversionOutput),
    Skipped(SkipReason),
}

impl JobOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, JobOutcome::Converted(_))
    }

    pub fn output(&self) -> Option<&ConversionOutput> {
        match self {
            JobOutcome::Converted(out) => Some(out),
            JobOutcome::Skipped(_) => None,
        }
    }
}
