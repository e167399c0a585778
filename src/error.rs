//! Error types for the tender2md library.
//!
//! Three error types reflect three failure scopes:
//!
//! * [`Tender2MdError`] — **Fatal for one document**: the conversion of a
//!   single file cannot produce Markdown (unsupported format, corrupt file,
//!   engine failure, output not writable). The batch driver catches it,
//!   logs it with the source path and moves on to the next file.
//!
//! * [`EngineError`] — reported by a [`crate::pipeline::engine::LayoutEngine`].
//!   The orchestrator maps it into [`Tender2MdError`], keeping "document is
//!   unreadable" separate from every other engine failure.
//!
//! * [`NormalizeError`] — **Non-fatal**: one archive or one legacy file could
//!   not be processed. Stored inside [`crate::normalize::NormalizeReport`];
//!   the rest of the tree is still normalized.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used by callers that handle failures per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorClass {
    /// The file extension has no pipeline.
    UnsupportedFormat,
    /// The engine reported the document as unreadable or corrupt.
    Conversion,
    /// The time budget ran out and no fallback was available.
    Timeout,
    /// Anything else.
    Generic,
}

/// All fatal errors returned by the tender2md library.
#[derive(Debug, Error)]
pub enum Tender2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// No pipeline handles this extension.
    #[error("Unsupported format '{extension}' for '{path}' (expected pdf, docx, pptx or xlsx)")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The file has a `.pdf` extension but does not start with `%PDF`.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The layout engine reported the document as unreadable or corrupt.
    #[error("Conversion error for '{path}': {detail}")]
    Conversion { path: PathBuf, detail: String },

    /// The full-fidelity pipeline exceeded its budget and no fallback is configured.
    #[error("Full-fidelity conversion of '{path}' timed out after {secs}s and the fallback is disabled")]
    Timeout { path: PathBuf, secs: u64 },

    /// The layout engine failed for a reason other than an unreadable document.
    #[error("Layout engine '{engine}' failed on '{path}': {detail}")]
    EngineFailed {
        engine: String,
        path: PathBuf,
        detail: String,
    },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set --pdfium-library (or TENDER2MD_PDFIUM_LIBRARY) to the path of libpdfium,\n\
or install it where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A filesystem operation other than writing output failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Tender2MdError {
    /// Classify the error into the coarse taxonomy used for reporting.
    pub fn class(&self) -> ErrorClass {
        match self {
            Tender2MdError::UnsupportedFormat { .. } => ErrorClass::UnsupportedFormat,
            Tender2MdError::Conversion { .. } | Tender2MdError::NotAPdf { .. } => {
                ErrorClass::Conversion
            }
            Tender2MdError::Timeout { .. } => ErrorClass::Timeout,
            _ => ErrorClass::Generic,
        }
    }

    /// Attach a document path to an engine error.
    pub fn from_engine(engine: &str, path: impl Into<PathBuf>, err: EngineError) -> Self {
        let path = path.into();
        match err {
            EngineError::Unreadable(detail) => Tender2MdError::Conversion { path, detail },
            other => Tender2MdError::EngineFailed {
                engine: engine.to_string(),
                path,
                detail: other.to_string(),
            },
        }
    }
}

/// Errors reported by a layout engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not read the document (corrupt, encrypted, truncated).
    #[error("document unreadable: {0}")]
    Unreadable(String),

    /// The engine ran but failed.
    #[error("engine failed: {0}")]
    Failed(String),

    /// The engine's output could not be parsed as a document tree.
    #[error("invalid engine output: {0}")]
    InvalidOutput(String),

    /// The engine could not be started or its output not read.
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A non-fatal error for a single file during tree normalization.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum NormalizeError {
    /// Archive extraction failed; the archive is left in place.
    #[error("{path:?}: archive extraction failed: {detail}")]
    ArchiveFailed { path: PathBuf, detail: String },

    /// The legacy converter exceeded its timeout and was killed.
    #[error("{path:?}: legacy conversion timed out after {secs}s")]
    LegacyTimeout { path: PathBuf, secs: u64 },

    /// The legacy converter exited unsuccessfully or produced no output.
    #[error("{path:?}: legacy conversion failed: {detail}")]
    LegacyFailed { path: PathBuf, detail: String },

    /// A duplicate or an extracted archive could not be deleted.
    #[error("{path:?}: delete failed: {detail}")]
    DeleteFailed { path: PathBuf, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_engine_error_becomes_conversion_error() {
        let e = Tender2MdError::from_engine(
            "docling-tree",
            "/tmp/a.pdf",
            EngineError::Unreadable("xref table broken".into()),
        );
        assert_eq!(e.class(), ErrorClass::Conversion);
        assert!(e.to_string().contains("xref table broken"), "got: {e}");
    }

    #[test]
    fn other_engine_errors_are_generic() {
        let e = Tender2MdError::from_engine(
            "docling-tree",
            "/tmp/a.pdf",
            EngineError::Failed("exit status 1".into()),
        );
        assert_eq!(e.class(), ErrorClass::Generic);
        assert!(e.to_string().contains("docling-tree"));
    }

    #[test]
    fn unsupported_format_display() {
        let e = Tender2MdError::UnsupportedFormat {
            path: "/tmp/a.txt".into(),
            extension: "txt".into(),
        };
        assert_eq!(e.class(), ErrorClass::UnsupportedFormat);
        assert!(e.to_string().contains("'txt'"));
    }

    #[test]
    fn timeout_display() {
        let e = Tender2MdError::Timeout {
            path: "/tmp/a.pdf".into(),
            secs: 180,
        };
        assert_eq!(e.class(), ErrorClass::Timeout);
        assert!(e.to_string().contains("180s"));
    }

    #[test]
    fn legacy_timeout_display() {
        let e = NormalizeError::LegacyTimeout {
            path: "/tmp/a.doc".into(),
            secs: 90,
        };
        assert!(e.to_string().contains("90s"));
    }
}
