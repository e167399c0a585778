//! In-process PDF access via pdfium: page counts and text-layer extraction.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which keeps
//! thread-local state and blocks for the whole duration of a load or a text
//! extraction. Every call therefore runs on tokio's blocking pool so the async
//! workers driving the orchestrator's timer keep running.
//!
//! Binding happens per call. Loading the shared library is cheap next to
//! opening a procurement PDF, and it keeps [`PdfiumPageCounter`] and
//! [`PdfiumTextEngine`] free of non-`Send` state.

use crate::config::PageRange;
use crate::error::{EngineError, Tender2MdError};
use crate::pipeline::engine::{LayoutEngine, ParseRequest};
use crate::pipeline::pages::PageCounter;
use crate::pipeline::tree::{DocumentTree, Element, ElementLabel, PageInfo};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind to libpdfium at `library`, or to the system library when `None`.
pub fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, Tender2MdError> {
    let bindings = match library {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Tender2MdError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

// ── Page counter ─────────────────────────────────────────────────────────

/// Counts pages by opening the PDF with pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumPageCounter {
    library: Option<PathBuf>,
}

impl PdfiumPageCounter {
    pub fn new(library: Option<PathBuf>) -> Self {
        Self { library }
    }
}

impl PageCounter for PdfiumPageCounter {
    fn page_count(&self, path: &Path) -> Result<usize, Tender2MdError> {
        let pdfium = bind_pdfium(self.library.as_deref())?;
        let document =
            pdfium
                .load_pdf_from_file(path, None)
                .map_err(|e| Tender2MdError::Conversion {
                    path: path.to_path_buf(),
                    detail: format!("{:?}", e),
                })?;
        let n = document.pages().len() as usize;
        debug!("{}: {} pages", path.display(), n);
        Ok(n)
    }
}

// ── Text-layer engine ────────────────────────────────────────────────────

/// Text-layer-only engine used as an OCR-free fallback.
///
/// Each page's text is split into paragraphs on blank lines; paragraphs that
/// start with a bullet or an enumerator become list items. Scanned pages
/// without a text layer yield nothing.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextEngine {
    library: Option<PathBuf>,
}

impl PdfiumTextEngine {
    pub fn new(library: Option<PathBuf>) -> Self {
        Self { library }
    }
}

#[async_trait]
impl LayoutEngine for PdfiumTextEngine {
    fn name(&self) -> &str {
        "pdfium-text"
    }

    async fn parse(&self, request: &ParseRequest) -> Result<DocumentTree, EngineError> {
        let path = request.path.clone();
        let library = self.library.clone();
        let range = request.page_range;

        tokio::task::spawn_blocking(move || extract_text_blocking(library.as_deref(), &path, range))
            .await
            .map_err(|e| EngineError::Failed(format!("Text extraction task panicked: {}", e)))?
    }
}

fn extract_text_blocking(
    library: Option<&Path>,
    path: &Path,
    range: Option<PageRange>,
) -> Result<DocumentTree, EngineError> {
    let pdfium = bind_pdfium(library).map_err(|e| EngineError::Failed(e.to_string()))?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| EngineError::Unreadable(format!("{:?}", e)))?;

    let pages = document.pages();
    let total = pages.len() as usize;
    let (first, last) = match range {
        Some(r) => (r.start.max(1), r.end.min(total)),
        None => (1, total),
    };

    let mut tree = DocumentTree::default();
    for page_no in first..=last {
        let page = pages
            .get((page_no - 1) as u16)
            .map_err(|e| EngineError::Failed(format!("page {page_no}: {:?}", e)))?;
        let width = page.width().value;
        let height = page.height().value;
        let text = page
            .text()
            .map_err(|e| EngineError::Failed(format!("page {page_no} text: {:?}", e)))?
            .all();

        tree.pages.push(PageInfo {
            page_no: page_no as u32,
            width,
            height,
        });
        tree.elements.extend(
            split_paragraphs(&text)
                .into_iter()
                .map(|el| el.on_page(page_no as u32).with_bbox(0.0, height, width, 0.0)),
        );
    }

    info!(
        "Extracted text layer of {} pages ({} blocks)",
        tree.pages.len(),
        tree.elements.len()
    );
    Ok(tree)
}

static RE_BLANK_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());
static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-•*·▪]|\d+[.)])\s+").unwrap());

/// Split raw page text into paragraph and list-item elements.
pub fn split_paragraphs(text: &str) -> Vec<Element> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    RE_BLANK_SPLIT
        .split(&text)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| match RE_BULLET.find(block) {
            Some(m) => Element::new(ElementLabel::ListItem, block[m.end()..].trim()),
            None => Element::new(ElementLabel::Text, block),
        })
        .collect()
}
