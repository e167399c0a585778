//! Duplicate-rendition removal.
//!
//! Tender bundles often ship the same document several times (`смета.xlsx`,
//! `смета.pdf`, and after legacy conversion `смета.doc` + `смета.docx`). Per
//! directory, files sharing a stem are ranked by extension preference and only
//! the best one is kept.

use crate::error::NormalizeError;
use crate::normalize::NormalizeReport;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Delete all but the preferred rendition of every stem, per directory.
///
/// `priority_order` lists extensions best-first (`.xlsx` and `xlsx` are
/// equivalent, case-insensitive). Extensions not listed rank after all listed
/// ones; ties are broken by extension, then by file name, so the survivor is
/// deterministic.
pub fn remove_duplicates(dir: &Path, priority_order: &[String], report: &mut NormalizeReport) {
    let priority: Vec<String> = priority_order.iter().map(|e| normalize_ext(e)).collect();

    let mut groups: BTreeMap<(PathBuf, String), Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.into_path();
        let (Some(parent), Some(stem)) = (path.parent(), path.file_stem()) else {
            continue;
        };
        let key = (parent.to_path_buf(), stem.to_string_lossy().into_owned());
        groups.entry(key).or_default().push(path);
    }

    for ((_, stem), mut files) in groups {
        if files.len() < 2 {
            continue;
        }
        files.sort_by_key(|p| rank(p, &priority));
        debug!("Stem {stem:?}: keeping {}", files[0].display());
        for dup in &files[1..] {
            match fs::remove_file(dup) {
                Ok(()) => {
                    debug!("Deleted duplicate {}", dup.display());
                    report.duplicates_removed.push(dup.clone());
                }
                Err(e) => {
                    warn!("Error deleting duplicate {}: {e}", dup.display());
                    report.errors.push(NormalizeError::DeleteFailed {
                        path: dup.clone(),
                        detail: e.to_string(),
                    });
                }
            }
        }
    }
}

fn normalize_ext(ext: &str) -> String {
    let lower = ext.trim().to_ascii_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

fn rank(path: &Path, priority: &[String]) -> (usize, String, String) {
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default();
    let index = priority
        .iter()
        .position(|p| *p == ext)
        .unwrap_or(priority.len());
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (index, ext, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    fn remaining(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn defaults() -> Vec<String> {
        vec![".xlsx".into(), ".docx".into(), ".pdf".into()]
    }

    #[test]
    fn keeps_highest_priority_rendition() {
        let dir = tempfile::tempdir().unwrap();
        for n in ["a.xlsx", "a.docx", "a.pdf", "b.pdf"] {
            touch(dir.path(), n);
        }
        let mut report = NormalizeReport::default();
        remove_duplicates(dir.path(), &defaults(), &mut report);
        assert_eq!(remaining(dir.path()), vec!["a.xlsx", "b.pdf"]);
        assert_eq!(report.duplicates_removed.len(), 2);
    }

    #[test]
    fn unlisted_extensions_lose_and_tie_break_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        for n in ["c.rtf", "c.doc", "d.txt", "d.odt"] {
            touch(dir.path(), n);
        }
        let mut report = NormalizeReport::default();
        remove_duplicates(dir.path(), &defaults(), &mut report);
        assert_eq!(remaining(dir.path()), vec!["c.doc", "d.odt"]);
    }

    #[test]
    fn legacy_source_loses_to_converted_docx() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "договор.doc");
        touch(dir.path(), "договор.DOCX");
        let mut report = NormalizeReport::default();
        remove_duplicates(dir.path(), &defaults(), &mut report);
        assert_eq!(remaining(dir.path()), vec!["договор.DOCX"]);
    }

    #[test]
    fn groups_are_per_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("ed")).unwrap();
        touch(dir.path(), "a.pdf");
        touch(&dir.path().join("ed"), "a.docx");
        let mut report = NormalizeReport::default();
        remove_duplicates(dir.path(), &defaults(), &mut report);
        assert!(report.duplicates_removed.is_empty());
    }

    #[test]
    fn priority_entries_accept_missing_dot() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "x.pdf");
        touch(dir.path(), "x.docx");
        let mut report = NormalizeReport::default();
        remove_duplicates(dir.path(), &["PDF".to_string()], &mut report);
        assert_eq!(remaining(dir.path()), vec!["x.pdf"]);
    }
}
