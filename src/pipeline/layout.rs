//! Layout analysis: document tree → ordered content items.
//!
//! Two strategies share one walk. The paginated strategy (PDF) drops
//! zero-area elements and pairs every table with an image reference; the
//! flow strategy (docx/pptx/xlsx) has no reliable geometry and keeps
//! everything.
//!
//! Asset references are generated here, not by the engine: the analyzer
//! numbers tables and pictures in emission order and places them under a
//! per-document, per-tier prefix. Pixels, when the engine supplied them,
//! are returned as [`PendingAsset`]s for [`crate::pipeline::assets`] to
//! write at exactly those paths.

use crate::content::ContentItem;
use crate::pipeline::table;
use crate::pipeline::tree::{DocumentTree, Element, ElementLabel, ImagePayload};
use tracing::{debug, trace};

/// Which family of documents the tree came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Paginated,
    Flow,
}

/// Picture pixels waiting to be written at `reference`.
#[derive(Debug, Clone)]
pub struct PendingAsset {
    /// Path relative to the Markdown file.
    pub reference: String,
    pub payload: ImagePayload,
}

/// Output of [`LayoutAnalyzer::analyze`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzedDocument {
    pub items: Vec<ContentItem>,
    pub assets: Vec<PendingAsset>,
}

/// Normalizes a [`DocumentTree`] into a [`ContentItem`] sequence.
#[derive(Debug, Clone)]
pub struct LayoutAnalyzer {
    strategy: Strategy,
    /// Directory prefix for generated references, without trailing slash.
    asset_prefix: String,
    table_images: bool,
    extract_images: bool,
}

impl LayoutAnalyzer {
    pub fn new(strategy: Strategy, asset_prefix: impl Into<String>) -> Self {
        Self {
            strategy,
            asset_prefix: asset_prefix.into().trim_end_matches('/').to_string(),
            table_images: true,
            extract_images: false,
        }
    }

    /// Pair tables with an image reference (paginated strategy only).
    pub fn with_table_images(mut self, v: bool) -> Self {
        self.table_images = v;
        self
    }

    /// Collect picture pixels for materialization.
    pub fn with_extract_images(mut self, v: bool) -> Self {
        self.extract_images = v;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Walk the tree in reading order and emit content items.
    pub fn analyze(&self, tree: &DocumentTree) -> AnalyzedDocument {
        let mut out = AnalyzedDocument::default();
        let mut tables = 0usize;
        let mut pictures = 0usize;

        for (el, depth) in tree.walk() {
            if el.label.is_furniture() {
                trace!("Dropping {:?} furniture", el.label);
                continue;
            }
            if self.strategy == Strategy::Paginated {
                if let Some(bbox) = el.bbox {
                    if bbox.area() <= 0.0 {
                        trace!("Dropping zero-area {:?}", el.label);
                        continue;
                    }
                }
            }

            let kind = match el.label {
                label if label.is_heading() => {
                    let text = clean_text(&el.text);
                    if text.is_empty() {
                        continue;
                    }
                    let level = el
                        .level
                        .unwrap_or_else(|| u8::try_from(depth + 1).unwrap_or(u8::MAX));
                    ContentItem::heading(level.clamp(1, 6), text)
                }
                ElementLabel::ListItem => {
                    let text = clean_text(&el.text);
                    if text.is_empty() {
                        continue;
                    }
                    ContentItem::list_item(text)
                }
                label if label.is_table() => {
                    let Some(html) = table_html(el) else {
                        debug!("Table without HTML or cell grid, skipping");
                        continue;
                    };
                    tables += 1;
                    let image_ref = (self.strategy == Strategy::Paginated && self.table_images)
                        .then(|| self.reference("table", tables));
                    ContentItem::table(html, image_ref)
                }
                ElementLabel::Picture => {
                    pictures += 1;
                    let reference = self.reference("picture", pictures);
                    if self.extract_images {
                        if let Some(payload) = &el.image {
                            out.assets.push(PendingAsset {
                                reference: reference.clone(),
                                payload: payload.clone(),
                            });
                        }
                    }
                    ContentItem::image(reference)
                }
                label if label.is_text() => {
                    let text = clean_text(&el.text);
                    if text.is_empty() {
                        continue;
                    }
                    ContentItem::paragraph(text)
                }
                // Containers and unknown labels: children are still visited.
                _ => continue,
            };

            let ordinal = out.items.len() + 1;
            out.items.push(ContentItem::new(ordinal, el.page_no, kind));
        }

        debug!(
            "Layout analysis: {} items, {} tables, {} pictures",
            out.items.len(),
            tables,
            pictures
        );
        out
    }

    fn reference(&self, kind: &str, n: usize) -> String {
        if self.asset_prefix.is_empty() {
            format!("{kind}-{n}.png")
        } else {
            format!("{}/{kind}-{n}.png", self.asset_prefix)
        }
    }
}

fn table_html(el: &Element) -> Option<String> {
    match (&el.html, &el.table) {
        (Some(html), _) if !html.trim().is_empty() => Some(html.trim().to_string()),
        (_, Some(grid)) => Some(table::export_html(grid)),
        _ => None,
    }
}

/// Normalize engine text: LF line endings, no invisible characters, trimmed.
pub fn clean_text(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(
            [
                '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
            ],
            "",
        )
        .trim()
        .to_string()
}
