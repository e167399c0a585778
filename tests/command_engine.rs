//! `CommandEngine` against small shell scripts standing in for the real engine.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tender2md::pipeline::tree::ElementLabel;
use tender2md::{Backend, CommandEngine, EngineError, LayoutEngine, OcrEngine, PageRange, ParseRequest};
use tokio_test::{assert_err, assert_ok};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn request(path: &Path) -> ParseRequest {
    ParseRequest {
        path: path.to_path_buf(),
        page_range: Some(PageRange::new(18, 20)),
        ocr: OcrEngine::EasyOcr,
        backend: Backend::Layout,
        languages: vec!["ru".into(), "en".into()],
        include_images: false,
    }
}

const TREE_JSON: &str = r#"{"pages":[{"page_no":18,"width":595.0,"height":842.0}],"elements":[{"label":"title","text":"Смета","page_no":18},{"label":"text","text":"Итого: 100","page_no":18},{"label":"chart","text":"?"}]}"#;

#[tokio::test]
async fn parses_tree_from_stdout_and_passes_flags() {
    let dir = tempfile::tempdir().unwrap();
    let args_file = dir.path().join("args.txt");
    let program = script(
        dir.path(),
        "engine",
        &format!(
            "echo \"$@\" > '{}'\ncat <<'EOF'\n{TREE_JSON}\nEOF",
            args_file.display()
        ),
    );

    let engine = CommandEngine::new(&program).with_args(["--quiet"]);
    let tree = assert_ok!(engine.parse(&request(Path::new("/data/doc.pdf"))).await);

    assert_eq!(tree.pages.len(), 1);
    assert_eq!(tree.elements.len(), 3);
    assert_eq!(tree.elements[0].label, ElementLabel::Title);
    assert_eq!(tree.elements[1].text, "Итого: 100");
    assert_eq!(tree.elements[2].label, ElementLabel::Unknown);

    let args = fs::read_to_string(args_file).unwrap();
    assert_eq!(
        args.trim(),
        "--quiet --backend layout --ocr easyocr --lang ru,en --pages 18-20 /data/doc.pdf"
    );
}

#[tokio::test]
async fn exit_code_three_means_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(dir.path(), "engine", "echo 'PDF header damaged' >&2\nexit 3");

    let err = assert_err!(CommandEngine::new(program).parse(&request(Path::new("x.pdf"))).await);
    match err {
        EngineError::Unreadable(detail) => assert_eq!(detail, "PDF header damaged"),
        other => panic!("expected Unreadable, got {other:?}"),
    }
}

#[tokio::test]
async fn other_exit_codes_are_failures() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(dir.path(), "engine", "echo 'model not found' >&2\nexit 1");

    let err = assert_err!(CommandEngine::new(program).parse(&request(Path::new("x.pdf"))).await);
    assert!(matches!(err, EngineError::Failed(ref d) if d.contains("model not found")));
}

#[tokio::test]
async fn garbage_stdout_is_invalid_output() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(dir.path(), "engine", "echo 'not json'");

    let err = assert_err!(CommandEngine::new(program).parse(&request(Path::new("x.pdf"))).await);
    assert!(matches!(err, EngineError::InvalidOutput(_)));
}

#[tokio::test]
async fn missing_program_is_an_io_error() {
    let engine = CommandEngine::new("/nonexistent/engine");
    let err = assert_err!(engine.parse(&request(Path::new("x.pdf"))).await);
    assert!(matches!(err, EngineError::Io(_)));
}

#[tokio::test]
async fn dropped_parse_kills_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("finished");
    let program = script(
        dir.path(),
        "engine",
        &format!("sleep 2\ntouch '{}'", marker.display()),
    );
    let engine = CommandEngine::new(program);

    let started = Instant::now();
    let result = tokio::time::timeout(
        Duration::from_millis(300),
        engine.parse(&request(Path::new("x.pdf"))),
    )
    .await;
    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(2));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!marker.exists(), "engine kept running after cancellation");
}

#[tokio::test]
async fn dropped_parse_kills_forked_workers() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("worker-finished");
    let program = script(
        dir.path(),
        "engine",
        &format!("(sleep 2; touch '{}') &\nwait", marker.display()),
    );
    let engine = CommandEngine::new(program);

    let result = tokio::time::timeout(
        Duration::from_millis(300),
        engine.parse(&request(Path::new("x.pdf"))),
    )
    .await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!marker.exists(), "forked worker outlived the cancelled parse");
}

#[tokio::test]
async fn non_utf8_path_reaches_the_engine_intact() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join(OsStr::from_bytes(b"\xd1\xec\xe5\xf2\xe0.json"));
    fs::write(&doc, TREE_JSON).unwrap();
    // Echo back the file named by the last argument.
    let program = script(dir.path(), "engine", "for a; do last=\"$a\"; done\ncat \"$last\"");

    let mut req = request(&doc);
    req.page_range = None;
    let tree = assert_ok!(CommandEngine::new(program).parse(&req).await);
    assert_eq!(tree.elements.len(), 3);
}
