//! Typed content items produced by layout analysis.
//!
//! A document becomes an ordered `Vec<ContentItem>` in reading order. The
//! assembler turns that sequence into Markdown without looking at the source
//! document again.

use serde::{Deserialize, Serialize};

/// One structural element of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// 1-based position among the emitted items.
    pub ordinal: usize,
    /// Source page for paginated documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(flatten)]
    pub kind: ContentKind,
}

/// The kind-specific payload of a [`ContentItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentKind {
    Heading {
        level: u8,
        text: String,
    },
    Paragraph {
        text: String,
    },
    ListItem {
        text: String,
    },
    Table {
        html: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_ref: Option<String>,
    },
    Image {
        image_ref: String,
    },
    /// A kind this version does not know how to render.
    #[serde(other)]
    Unknown,
}

impl ContentItem {
    pub fn new(ordinal: usize, page: Option<u32>, kind: ContentKind) -> Self {
        Self {
            ordinal,
            page,
            kind,
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> ContentKind {
        ContentKind::Heading {
            level: level.max(1),
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> ContentKind {
        ContentKind::Paragraph { text: text.into() }
    }

    pub fn list_item(text: impl Into<String>) -> ContentKind {
        ContentKind::ListItem { text: text.into() }
    }

    pub fn table(html: impl Into<String>, image_ref: Option<String>) -> ContentKind {
        ContentKind::Table {
            html: html.into(),
            image_ref,
        }
    }

    pub fn image(image_ref: impl Into<String>) -> ContentKind {
        ContentKind::Image {
            image_ref: image_ref.into(),
        }
    }
}

/// Number a sequence of kinds 1..=n without page information.
///
/// Handy for flow documents and for tests.
pub fn sequence<I>(kinds: I) -> Vec<ContentItem>
where
    I: IntoIterator<Item = ContentKind>,
{
    kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| ContentItem::new(i + 1, None, kind))
        .collect()
}
