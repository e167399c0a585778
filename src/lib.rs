//! # tender2md
//!
//! Normalize procurement document bundles and convert them to Markdown.
//!
//! ## Why this crate?
//!
//! Tender documentation arrives as nested archives of scanned PDFs, Word files
//! from three decades of office suites and spreadsheets of estimates.
//! Downstream summarization wants one clean Markdown file per document. Full
//! layout analysis with OCR gives the best structure but can take minutes on a
//! bad scan, so this crate bounds the latency of every document: when the
//! high-fidelity pipeline runs out of time it is aborted and a cheaper pipeline
//! produces the Markdown instead.
//!
//! ## Pipeline Overview
//!
//! ```text
//! tender bundle
//!  │
//!  ├─ 1. Normalize  unpack archives, .doc → .docx, drop duplicate renditions
//!  ├─ 2. Plan       format, size gate, page range (last 3 / last 20 pages)
//!  ├─ 3. Engine     structure extraction (external process, abortable)
//!  ├─ 4. Layout     document tree → ordered content items
//!  ├─ 5. Assemble   deterministic Markdown
//!  └─ 6. Output     atomic write + picture assets
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tender2md::{AnalysisMode, ConversionConfig, Converter, JobOutcome};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(ConversionConfig::default());
//!     let outcome = converter
//!         .convert_file(Path::new("смета.pdf"), None, AnalysisMode::ExhaustiveDetail)
//!         .await?;
//!     if let JobOutcome::Converted(out) = outcome {
//!         println!("{}", out.markdown);
//!         eprintln!("tier: {}", out.stats.tier.as_str());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tender2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! tender2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod content;
pub mod convert;
pub mod error;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, sync_back, BatchReport};
pub use config::{
    AnalysisMode, BatchConfig, ConversionConfig, ConversionConfigBuilder, FallbackBackend,
    LegacyConfig, NormalizeConfig, OcrEngine, PageRange,
};
pub use content::{ContentItem, ContentKind};
pub use convert::{convert_sync, ConversionJob, Converter, Pipeline};
pub use error::{EngineError, ErrorClass, NormalizeError, Tender2MdError};
pub use normalize::{normalize_tree, NormalizeReport};
pub use output::{ConversionOutput, ConversionStats, JobOutcome, SkipReason, Tier};
pub use pipeline::assemble::assemble;
pub use pipeline::engine::{Backend, CommandEngine, LayoutEngine, ParseRequest};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
