//! Page-range selection for paginated documents.
//!
//! Estimate totals and signature blocks cluster at the end of procurement
//! documents, and full-document layout analysis is too slow, so only the tail
//! of a PDF is analyzed. Exhaustive-detail mode looks at the last few pages,
//! general mode at a longer tail.

use crate::config::{AnalysisMode, ConversionConfig, PageRange};
use crate::error::Tender2MdError;
use crate::pipeline::input::FormatKind;
use std::path::Path;

/// Source of page counts for paginated documents.
pub trait PageCounter: Send + Sync {
    fn page_count(&self, path: &Path) -> Result<usize, Tender2MdError>;
}

/// Select the tail of an `n`-page document.
///
/// `tail` is the number of trailing pages to keep. A zero-page document is
/// treated as a single page so the result is always a valid 1-based range.
pub fn tail_range(total_pages: usize, tail: usize) -> PageRange {
    let end = total_pages.max(1);
    let start = end.saturating_sub(tail.saturating_sub(1)).max(1);
    PageRange::new(start, end)
}

/// Pick the analyzed range for a document.
///
/// `total_pages` is only consulted for paginated formats; flow formats get
/// the configured default range, which their pipeline ignores.
pub fn select_page_range(
    format: FormatKind,
    total_pages: Option<usize>,
    mode: AnalysisMode,
    config: &ConversionConfig,
) -> PageRange {
    if !format.is_paginated() {
        return config.default_page_range;
    }
    let Some(total) = total_pages else {
        return config.default_page_range;
    };
    let tail = match mode {
        AnalysisMode::ExhaustiveDetail => config.exhaustive_tail_pages,
        AnalysisMode::General => config.general_tail_pages,
    };
    tail_range(total, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(n: usize, mode: AnalysisMode) -> (usize, usize) {
        let r = select_page_range(FormatKind::Pdf, Some(n), mode, &ConversionConfig::default());
        (r.start, r.end)
    }

    #[test]
    fn exhaustive_keeps_last_three_pages() {
        for n in 1..=60 {
            assert_eq!(pick(n, AnalysisMode::ExhaustiveDetail), ((n.max(3) - 2), n), "n={n}");
        }
    }

    #[test]
    fn general_keeps_last_twenty_pages() {
        for n in 1..=60 {
            let expected_start = if n > 19 { n - 19 } else { 1 };
            assert_eq!(pick(n, AnalysisMode::General), (expected_start, n), "n={n}");
        }
    }

    #[test]
    fn single_page_document() {
        assert_eq!(pick(1, AnalysisMode::ExhaustiveDetail), (1, 1));
        assert_eq!(pick(1, AnalysisMode::General), (1, 1));
    }

    #[test]
    fn five_page_pdf_in_general_mode() {
        assert_eq!(pick(5, AnalysisMode::General), (1, 5));
    }

    #[test]
    fn empty_document_is_one_page() {
        assert_eq!(pick(0, AnalysisMode::General), (1, 1));
    }

    #[test]
    fn flow_formats_use_default_range() {
        let config = ConversionConfig::default();
        let r = select_page_range(FormatKind::Docx, Some(300), AnalysisMode::General, &config);
        assert_eq!(r, PageRange::new(1, 20));
    }
}
