//! Pipeline stages for document-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the engine can be swapped without touching the
//! analyzer or the assembler.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pages ──▶ engine ──▶ layout ──▶ assemble
//! (format)  (range)   (tree)     (items)    (Markdown)
//!                                  │
//!                                  └──▶ assets (PNG files)
//! ```
//!
//! 1. [`input`]    — classify by extension and validate the file
//! 2. [`pages`]    — pick the analyzed page span of a PDF
//! 3. [`engine`]   — run the structure-extraction engine; [`pdfium`] provides
//!    page counts and an in-process text-layer engine
//! 4. [`layout`]   — normalize the [`tree`] into ordered content items, with
//!    [`table`] exporting cell grids as HTML
//! 5. [`assemble`] — deterministic Markdown rendering
//! 6. [`assets`]   — write picture pixels at the referenced paths

pub mod assemble;
pub mod assets;
pub mod engine;
pub mod input;
pub mod layout;
pub mod pages;
pub mod pdfium;
pub mod table;
pub mod tree;
