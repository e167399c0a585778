//! In-place archive extraction until no archives remain.
//!
//! Tender bundles routinely nest archives (a `.zip` holding a `.rar` holding
//! scans). Each pass extracts every archive it finds into the archive's own
//! directory and deletes it; the tree is rescanned until a pass finds nothing
//! new. Archives that fail are remembered and not retried, and the pass count
//! is capped, so a zip bomb of self-reproducing archives still terminates.

use crate::config::NormalizeConfig;
use crate::error::NormalizeError;
use crate::normalize::NormalizeReport;
use encoding_rs::Encoding;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Archive formats handled by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Rar,
    SevenZ,
}

impl ArchiveKind {
    /// Detect from the extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(ArchiveKind::Zip),
            "rar" => Some(ArchiveKind::Rar),
            "7z" => Some(ArchiveKind::SevenZ),
            _ => None,
        }
    }
}

/// Extract every archive under `dir`, rescanning until none are left.
pub fn extract_archives(dir: &Path, config: &NormalizeConfig, report: &mut NormalizeReport) {
    let fallback = config
        .zip_name_encoding
        .as_deref()
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    let mut failed: HashSet<PathBuf> = HashSet::new();

    for pass in 1..=config.max_archive_passes {
        let archives = find_archives(dir, &failed);
        if archives.is_empty() {
            debug!("Archive scan pass {pass}: nothing left");
            return;
        }
        info!("Archive pass {pass}: {} archive(s)", archives.len());
        report.archive_passes = pass;

        for (path, kind) in archives {
            let dest = path.parent().unwrap_or(dir).to_path_buf();
            match extract_one(&path, kind, &dest, fallback) {
                Ok(()) => match fs::remove_file(&path) {
                    Ok(()) => {
                        debug!("Extracted and removed {}", path.display());
                        report.archives_extracted += 1;
                    }
                    Err(e) => {
                        warn!("Extracted {} but could not delete it: {e}", path.display());
                        report.errors.push(NormalizeError::DeleteFailed {
                            path: path.clone(),
                            detail: e.to_string(),
                        });
                        failed.insert(path);
                    }
                },
                Err(detail) => {
                    warn!("Error extracting {}: {detail}", path.display());
                    report.errors.push(NormalizeError::ArchiveFailed {
                        path: path.clone(),
                        detail,
                    });
                    failed.insert(path);
                }
            }
        }
    }

    let remaining = find_archives(dir, &failed).len();
    if remaining > 0 {
        warn!(
            "Stopped after {} archive passes with {remaining} archive(s) left",
            config.max_archive_passes
        );
    }
}

fn find_archives(dir: &Path, skip: &HashSet<PathBuf>) -> Vec<(PathBuf, ArchiveKind)> {
    let mut found: Vec<(PathBuf, ArchiveKind)> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let kind = ArchiveKind::from_path(e.path())?;
            (!skip.contains(e.path())).then(|| (e.into_path(), kind))
        })
        .collect();
    found.sort_by(|a, b| a.0.cmp(&b.0));
    found
}

fn extract_one(
    path: &Path,
    kind: ArchiveKind,
    dest: &Path,
    name_encoding: Option<&'static Encoding>,
) -> Result<(), String> {
    match kind {
        ArchiveKind::Zip => extract_zip(path, dest, name_encoding).map(|n| {
            debug!("{}: {n} entries", path.display());
        }),
        ArchiveKind::SevenZ => sevenz_rust::decompress_file(path, dest)
            .map_err(|e| format!("Failed to extract 7z: {e}")),
        ArchiveKind::Rar => {
            let path_str = path.to_str().ok_or("RAR path contains invalid UTF-8")?;
            let dest_str = dest.to_str().ok_or("Dest path contains invalid UTF-8")?;
            rar::Archive::extract_all(path_str, dest_str, "")
                .map(|_| ())
                .map_err(|e| format!("Failed to extract RAR: {e:?}"))
        }
    }
}

fn extract_zip(
    archive_path: &Path,
    dest: &Path,
    name_encoding: Option<&'static Encoding>,
) -> Result<usize, String> {
    let file = fs::File::open(archive_path).map_err(|e| format!("Failed to open archive: {e}"))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| format!("Invalid or corrupt ZIP: {e}"))?;

    let mut count = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| format!("Failed to read entry {i}: {e}"))?;

        let name = decode_entry_name(entry.name_raw(), name_encoding);
        let Some(relative) = safe_relative_path(&name) else {
            warn!("Skipping unsafe zip entry {name:?} in {}", archive_path.display());
            continue;
        };
        let output_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&output_path).map_err(|e| format!("Failed to create dir: {e}"))?;
        } else {
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent).map_err(|e| format!("Failed to create parent: {e}"))?;
            }
            let mut outfile = fs::File::create(&output_path)
                .map_err(|e| format!("Failed to create file: {e}"))?;
            io::copy(&mut entry, &mut outfile).map_err(|e| format!("Failed to write file: {e}"))?;
            count += 1;
        }
    }
    Ok(count)
}

/// Decode a raw zip entry name.
///
/// Valid UTF-8 is taken as is. Anything else was written by a DOS-era tool in
/// an OEM code page; `fallback` decodes it (IBM866 for Cyrillic archives).
pub fn decode_entry_name(raw: &[u8], fallback: Option<&'static Encoding>) -> String {
    if let Ok(s) = std::str::from_utf8(raw) {
        return s.to_string();
    }
    match fallback {
        Some(enc) => enc.decode_without_bom_handling(raw).0.into_owned(),
        None => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Turn an entry name into a path confined to the extraction directory.
///
/// Absolute paths, drive prefixes and `..` components are rejected.
pub fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return None;
    }
    let mut out = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => {
                if part.to_string_lossy().contains(':') {
                    return None;
                }
                out.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_kind_is_case_insensitive() {
        assert_eq!(ArchiveKind::from_path(Path::new("a/B.ZIP")), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_path(Path::new("x.Rar")), Some(ArchiveKind::Rar));
        assert_eq!(ArchiveKind::from_path(Path::new("x.7z")), Some(ArchiveKind::SevenZ));
        assert_eq!(ArchiveKind::from_path(Path::new("x.tar")), None);
    }

    #[test]
    fn unsafe_entry_names_are_rejected() {
        assert_eq!(safe_relative_path("../etc/passwd"), None);
        assert_eq!(safe_relative_path("/abs/file"), None);
        assert_eq!(safe_relative_path("a/../../b"), None);
        assert_eq!(safe_relative_path("C:\\evil.txt"), None);
        assert_eq!(safe_relative_path(""), None);
        assert_eq!(
            safe_relative_path("docs\\./смета.xlsx"),
            Some(PathBuf::from("docs/смета.xlsx"))
        );
    }

    #[test]
    fn non_utf8_names_use_fallback_code_page() {
        // "Смета" in IBM866.
        let raw = [0x91, 0xAC, 0xA5, 0xE2, 0xA0];
        let enc = Encoding::for_label(b"ibm866");
        assert!(enc.is_some());
        assert_eq!(decode_entry_name(&raw, enc), "Смета");
        assert_eq!(decode_entry_name("Смета".as_bytes(), enc), "Смета");
    }
}
