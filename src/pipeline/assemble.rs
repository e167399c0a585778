//! Markdown assembly: content items → Markdown text.
//!
//! Assembly is a pure function. The same item sequence always yields the same
//! bytes, which keeps re-runs of a batch diffable.
//!
//! ## Layout rules
//!
//! Every rendered item is followed by one blank line. List items are the
//! exception on the leading side: a list item retracts the blank line left by
//! the previous item, so consecutive items form one tight Markdown list.

use crate::content::{ContentItem, ContentKind};

/// Render an item sequence as Markdown.
///
/// Every line, including the trailing blank line, ends in `\n`.
pub fn assemble(items: &[ContentItem]) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(items.len() * 2);

    for item in items {
        match &item.kind {
            ContentKind::Heading { level, text } => {
                let hashes = "#".repeat(usize::from((*level).max(1)));
                lines.push(format!("{hashes} {text}"));
            }
            ContentKind::Paragraph { text } => lines.push(text.clone()),
            ContentKind::ListItem { text } => {
                if lines.last().is_some_and(|l| l.is_empty()) {
                    lines.pop();
                }
                lines.push(format!("- {text}"));
            }
            ContentKind::Table { html, image_ref } => {
                if let Some(src) = image_ref {
                    lines.push(format!("![Table]({src})"));
                }
                lines.push(html.clone());
            }
            ContentKind::Image { image_ref } => lines.push(format!("![Image]({image_ref})")),
            ContentKind::Unknown => continue,
        }
        lines.push(String::new());
    }

    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}
