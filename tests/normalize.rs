//! Normalizer tests over real archive trees built in a temp directory.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tender2md::{normalize_tree, NormalizeConfig, NormalizeError};
use tokio_test::assert_ok;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn files_under(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    names.sort();
    names
}

fn no_legacy() -> NormalizeConfig {
    NormalizeConfig {
        convert_legacy: false,
        ..NormalizeConfig::default()
    }
}

#[tokio::test]
async fn nested_archives_are_flattened_and_duplicates_removed() {
    let dir = tempfile::tempdir().unwrap();
    let inner = zip_bytes(&[
        ("смета.pdf", &b"%PDF-1.4 scan"[..]),
        ("смета.xlsx", &b"sheet"[..]),
        ("ТЗ/техзадание.docx", &b"doc"[..]),
    ]);
    let outer = zip_bytes(&[("вложение.zip", &inner[..]), ("письмо.pdf", &b"%PDF-1.4"[..])]);
    fs::write(dir.path().join("bundle.zip"), outer).unwrap();

    let report = assert_ok!(normalize_tree(dir.path(), &no_legacy()).await);

    assert_eq!(report.archives_extracted, 2);
    assert_eq!(report.archive_passes, 2);
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.duplicates_removed.len(), 1);
    assert!(report.duplicates_removed[0].ends_with("смета.pdf"));
    assert_eq!(
        files_under(dir.path()),
        vec!["ТЗ/техзадание.docx", "письмо.pdf", "смета.xlsx"]
    );
}

#[tokio::test]
async fn corrupt_archive_is_reported_and_kept() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.zip"), b"PK\x03\x04 not really").unwrap();
    fs::write(
        dir.path().join("good.zip"),
        zip_bytes(&[("акт.pdf", &b"%PDF-1.4"[..])]),
    )
    .unwrap();

    let report = assert_ok!(normalize_tree(dir.path(), &no_legacy()).await);

    assert_eq!(report.archives_extracted, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(
        &report.errors[0],
        NormalizeError::ArchiveFailed { path, .. } if path.ends_with("broken.zip")
    ));
    assert_eq!(files_under(dir.path()), vec!["broken.zip", "акт.pdf"]);
}

#[tokio::test]
async fn pass_cap_bounds_self_nesting_archives() {
    let dir = tempfile::tempdir().unwrap();
    let mut payload = zip_bytes(&[("deepest.pdf", &b"%PDF-1.4"[..])]);
    for level in 0..5 {
        let name = format!("level{level}.zip");
        payload = zip_bytes(&[(name.as_str(), &payload[..])]);
    }
    fs::write(dir.path().join("top.zip"), payload).unwrap();

    let config = NormalizeConfig {
        max_archive_passes: 3,
        ..no_legacy()
    };
    let report = assert_ok!(normalize_tree(dir.path(), &config).await);

    assert_eq!(report.archive_passes, 3);
    assert_eq!(report.archives_extracted, 3);
    let left = files_under(dir.path());
    assert_eq!(left.len(), 1);
    assert!(left[0].ends_with(".zip"));
}

#[tokio::test]
async fn duplicate_priority_is_configurable() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.xlsx", "a.docx", "a.pdf"] {
        fs::write(dir.path().join(name), b"x").unwrap();
    }
    let config = NormalizeConfig {
        priority_order: vec![".pdf".into(), ".docx".into(), ".xlsx".into()],
        ..no_legacy()
    };

    let report = assert_ok!(normalize_tree(dir.path(), &config).await);
    assert_eq!(report.duplicates_removed.len(), 2);
    assert_eq!(files_under(dir.path()), vec!["a.pdf"]);
}

#[tokio::test]
async fn missing_directory_is_an_error() {
    let result = normalize_tree(Path::new("/nonexistent/tender"), &no_legacy()).await;
    assert!(result.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn legacy_documents_are_converted_then_deduplicated() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    let converter = bin.path().join("fake-unoconv");
    // Invoked as: fake-unoconv -f docx -o <target> <source>
    fs::write(&converter, "#!/bin/sh\ncp \"$5\" \"$4\"\n").unwrap();
    fs::set_permissions(&converter, fs::Permissions::from_mode(0o755)).unwrap();

    fs::write(dir.path().join("договор.doc"), b"legacy").unwrap();
    fs::write(dir.path().join("договор.pdf"), b"%PDF-1.4").unwrap();

    let mut config = NormalizeConfig::default();
    config.legacy.program = converter;
    config.legacy.daemon_names.clear();

    let report = assert_ok!(normalize_tree(dir.path(), &config).await);

    assert_eq!(report.legacy_converted, 1);
    assert_eq!(files_under(dir.path()), vec!["договор.docx"]);
    assert_eq!(
        fs::read(dir.path().join("договор.docx")).unwrap(),
        b"legacy"
    );
}
