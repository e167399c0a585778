//! Document tree returned by a layout engine.
//!
//! This is the JSON shape the external engine writes to stdout: a list of
//! hierarchical elements, each with a structural label, text, optional
//! geometry, and optional table or picture payloads.

use serde::{Deserialize, Serialize};

/// Hierarchical element tree for one parsed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentTree {
    #[serde(default)]
    pub pages: Vec<PageInfo>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page_no: u32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
}

/// Structural label assigned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementLabel {
    Title,
    SectionHeader,
    Text,
    Paragraph,
    ListItem,
    Caption,
    Footnote,
    Formula,
    Code,
    Reference,
    CheckboxSelected,
    CheckboxUnselected,
    Table,
    DocumentIndex,
    Picture,
    PageHeader,
    PageFooter,
    Form,
    KeyValueRegion,
    Group,
    #[serde(other)]
    Unknown,
}

impl ElementLabel {
    pub fn is_furniture(&self) -> bool {
        matches!(self, ElementLabel::PageHeader | ElementLabel::PageFooter)
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, ElementLabel::Title | ElementLabel::SectionHeader)
    }

    pub fn is_table(&self) -> bool {
        matches!(self, ElementLabel::Table | ElementLabel::DocumentIndex)
    }

    /// Labels whose payload is running text.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            ElementLabel::Title
                | ElementLabel::SectionHeader
                | ElementLabel::Text
                | ElementLabel::Paragraph
                | ElementLabel::ListItem
                | ElementLabel::Caption
                | ElementLabel::Footnote
                | ElementLabel::Formula
                | ElementLabel::Code
                | ElementLabel::Reference
                | ElementLabel::CheckboxSelected
                | ElementLabel::CheckboxUnselected
        )
    }
}

/// Rendered bounds in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub l: f32,
    pub t: f32,
    pub r: f32,
    pub b: f32,
}

impl BoundingBox {
    /// Area, independent of coordinate origin.
    pub fn area(&self) -> f32 {
        (self.r - self.l).abs() * (self.t - self.b).abs()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub text: String,
    pub start_row: usize,
    pub start_col: usize,
    #[serde(default = "one")]
    pub row_span: usize,
    #[serde(default = "one")]
    pub col_span: usize,
    #[serde(default)]
    pub column_header: bool,
    #[serde(default)]
    pub row_header: bool,
}

fn one() -> usize {
    1
}

/// Cell grid of a table element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableGrid {
    pub num_rows: usize,
    pub num_cols: usize,
    #[serde(default)]
    pub cells: Vec<TableCell>,
}

/// Encoded picture pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    #[serde(default = "default_mime")]
    pub mime: String,
    /// Base64 of the encoded image.
    pub data: String,
}

fn default_mime() -> String {
    "image/png".to_string()
}

/// One node of the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub label: ElementLabel,
    #[serde(default)]
    pub text: String,
    /// Heading depth reported by the engine.
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub page_no: Option<u32>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    /// Pre-rendered HTML for tables.
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub table: Option<TableGrid>,
    #[serde(default)]
    pub image: Option<ImagePayload>,
    #[serde(default)]
    pub children: Vec<Element>,
}

impl Element {
    /// A bare element with only a label and text.
    pub fn new(label: ElementLabel, text: impl Into<String>) -> Self {
        Self {
            label,
            text: text.into(),
            level: None,
            page_no: None,
            bbox: None,
            html: None,
            table: None,
            image: None,
            children: Vec::new(),
        }
    }

    pub fn on_page(mut self, page_no: u32) -> Self {
        self.page_no = Some(page_no);
        self
    }

    pub fn with_bbox(mut self, l: f32, t: f32, r: f32, b: f32) -> Self {
        self.bbox = Some(BoundingBox { l, t, r, b });
        self
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_children(mut self, children: Vec<Element>) -> Self {
        self.children = children;
        self
    }
}

impl DocumentTree {
    /// Depth-first pre-order walk yielding `(element, depth)`.
    pub fn walk(&self) -> Vec<(&Element, usize)> {
        let mut out = Vec::new();
        let mut stack: Vec<(&Element, usize)> =
            self.elements.iter().rev().map(|e| (e, 0)).collect();
        while let Some((el, depth)) = stack.pop() {
            out.push((el, depth));
            stack.extend(el.children.iter().rev().map(|c| (c, depth + 1)));
        }
        out
    }
}
