//! Structure-extraction engines.
//!
//! A [`LayoutEngine`] turns a document on disk into a [`DocumentTree`]. The
//! production engine is [`CommandEngine`], which runs an external program and
//! reads the tree as JSON from its stdout. The in-process
//! [`crate::pipeline::pdfium::PdfiumTextEngine`] covers the text-layer-only
//! fallback when no external engine is available.
//!
//! ## Cancellation
//!
//! The orchestrator aborts a full-fidelity parse that runs over budget by
//! dropping its future. `CommandEngine` spawns the child with
//! `kill_on_drop(true)` as the leader of its own process group, and a guard
//! sends SIGKILL to that group when the future is dropped before the child
//! finishes. Workers the engine forked die with it.

use crate::config::{OcrEngine, PageRange};
use crate::error::EngineError;
use crate::pipeline::tree::DocumentTree;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit code a command engine uses to report an unreadable document.
pub const UNREADABLE_EXIT_CODE: i32 = 3;

/// Parsing backend requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Layout model with table structure recognition.
    Layout,
    /// Lightweight text-layer backend used by the fallback.
    Simple,
    /// Flow-format parser for docx/pptx/xlsx.
    Flow,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Layout => "layout",
            Backend::Simple => "simple",
            Backend::Flow => "flow",
        }
    }
}

/// One parse request.
#[derive(Debug, Clone)]
pub struct ParseRequest {
    pub path: PathBuf,
    /// Pages to analyze; `None` means the whole document.
    pub page_range: Option<PageRange>,
    pub ocr: OcrEngine,
    pub backend: Backend,
    pub languages: Vec<String>,
    /// Ask the engine to return picture pixels.
    pub include_images: bool,
}

/// Produces a document tree from a file.
#[async_trait]
pub trait LayoutEngine: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    async fn parse(&self, request: &ParseRequest) -> Result<DocumentTree, EngineError>;
}

// ── Command engine ───────────────────────────────────────────────────────

/// Runs an external structure-extraction program.
///
/// Invocation: `<program> <args…> --backend B --ocr O [--lang L] [--pages S-E]
/// [--images] <path>`. The program prints a JSON [`DocumentTree`] on stdout.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before the generated flags.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Full argument list for a request. The document path is passed as-is,
    /// without a lossy UTF-8 round trip.
    pub fn command_args(&self, request: &ParseRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push("--backend".into());
        args.push(request.backend.as_str().into());
        args.push("--ocr".into());
        args.push(request.ocr.as_str().into());
        if !request.languages.is_empty() {
            args.push("--lang".into());
            args.push(request.languages.join(",").into());
        }
        if let Some(range) = request.page_range {
            args.push("--pages".into());
            args.push(range.to_string().into());
        }
        if request.include_images {
            args.push("--images".into());
        }
        args.push(request.path.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl LayoutEngine for CommandEngine {
    fn name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("engine")
    }

    async fn parse(&self, request: &ParseRequest) -> Result<DocumentTree, EngineError> {
        let args = self.command_args(request);
        debug!("Running {} {:?}", self.program.display(), args);

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn()?;
        let mut guard = GroupGuard(child.id());
        let output = child.wait_with_output().await;
        guard.disarm();
        let output = output?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        match output.status.code() {
            Some(0) => {}
            Some(UNREADABLE_EXIT_CODE) => return Err(EngineError::Unreadable(stderr)),
            code => {
                let status = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                return Err(EngineError::Failed(format!("exit status {status}: {stderr}")));
            }
        }

        if !stderr.is_empty() {
            warn!("{}: {}", self.name(), stderr);
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::InvalidOutput(e.to_string()))
    }
}

/// Kills the engine's process group if dropped while armed.
struct GroupGuard(Option<u32>);

impl GroupGuard {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        let Some(pid) = self.0.take() else {
            return;
        };
        #[cfg(unix)]
        if let Ok(pgid) = libc::pid_t::try_from(pid) {
            // SAFETY: killpg only sends a signal; the child leads its own group.
            let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
            if rc != 0 {
                debug!("killpg({pgid}) failed: {}", std::io::Error::last_os_error());
            }
        }
        #[cfg(not(unix))]
        let _ = pid;
    }
}
