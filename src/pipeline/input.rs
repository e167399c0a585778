//! Input resolution: classify a document by extension and validate it.
//!
//! The engine is an external process, so a missing or mislabelled file would
//! otherwise surface as an opaque engine exit code. Checking existence,
//! permissions and the PDF magic bytes up front gives the caller a precise
//! error instead.

use crate::error::Tender2MdError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Document formats with a conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
}

impl FormatKind {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::from_extension(&ext)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.') {
            "pdf" => Some(FormatKind::Pdf),
            "docx" => Some(FormatKind::Docx),
            "pptx" => Some(FormatKind::Pptx),
            "xlsx" => Some(FormatKind::Xlsx),
            _ => None,
        }
    }

    /// Paginated formats get a page range; flow formats are one logical unit.
    pub fn is_paginated(&self) -> bool {
        matches!(self, FormatKind::Pdf)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Pdf => "pdf",
            FormatKind::Docx => "docx",
            FormatKind::Pptx => "pptx",
            FormatKind::Xlsx => "xlsx",
        }
    }
}

/// A validated local document.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub path: PathBuf,
    pub format: FormatKind,
    pub size: u64,
}

/// Lowercase extension of a path, empty when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Validate that `path` exists, is readable and has a supported format.
pub fn resolve_input(path: &Path) -> Result<ResolvedInput, Tender2MdError> {
    let format = FormatKind::from_path(path).ok_or_else(|| Tender2MdError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: extension_of(path),
    })?;

    let meta = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        Ok(_) => {
            return Err(Tender2MdError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Tender2MdError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => {
            return Err(Tender2MdError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
    };

    match std::fs::File::open(path) {
        Ok(mut f) => {
            if format == FormatKind::Pdf {
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                    return Err(Tender2MdError::NotAPdf {
                        path: path.to_path_buf(),
                        magic,
                    });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Tender2MdError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Tender2MdError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Resolved {} document: {}", format.as_str(), path.display());
    Ok(ResolvedInput {
        path: path.to_path_buf(),
        format,
        size: meta.len(),
    })
}
