//! Legacy office formats (`.doc`, `.odt`, `.rtf`) → `.docx` via an external converter.
//!
//! The converter (unoconv by default) talks to a LibreOffice daemon that
//! occasionally hangs forever on malformed input. Each invocation therefore
//! runs in its own process group under a hard timeout. On expiry the whole
//! group gets SIGTERM, the direct child is killed, and any stray
//! `soffice`/`libreoffice` process is reclaimed so the next file starts from a
//! clean daemon.

use crate::config::LegacyConfig;
use crate::error::NormalizeError;
use crate::normalize::NormalizeReport;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Convert every legacy-format file under `dir` to a sibling `.docx`.
///
/// The source file is left in place; duplicate removal deletes it afterwards
/// when the converted rendition ranks higher.
pub async fn convert_legacy_formats(
    dir: &Path,
    config: &LegacyConfig,
    report: &mut NormalizeReport,
) {
    let files = find_legacy_files(dir, config);
    if files.is_empty() {
        return;
    }
    info!("Converting {} legacy file(s) via {}", files.len(), config.program.display());

    for file in files {
        match convert_one(&file, config).await {
            Ok(target) => {
                debug!("Converted {} → {}", file.display(), target.display());
                report.legacy_converted += 1;
            }
            Err(e) => {
                warn!("{e}");
                report.errors.push(e);
            }
        }
    }
}

fn find_legacy_files(dir: &Path, config: &LegacyConfig) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                .is_some_and(|ext| config.extensions.iter().any(|x| x.eq_ignore_ascii_case(&ext)))
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Convert one file; returns the produced sibling path.
pub async fn convert_one(source: &Path, config: &LegacyConfig) -> Result<PathBuf, NormalizeError> {
    let target = source.with_extension(&config.target_extension);
    let failed = |detail: String| NormalizeError::LegacyFailed {
        path: source.to_path_buf(),
        detail,
    };

    let mut cmd = Command::new(&config.program);
    cmd.arg("-f")
        .arg(&config.target_extension)
        .arg("-o")
        .arg(&target)
        .arg(source)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .map_err(|e| failed(format!("could not start {}: {e}", config.program.display())))?;

    // Drained alongside the wait so a chatty converter never blocks on a full pipe.
    let stderr_task = child.stderr.take().map(|mut pipe| {
        tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf).await;
            buf
        })
    });

    let budget = Duration::from_secs(config.timeout_secs);
    match tokio::time::timeout(budget, child.wait()).await {
        Ok(Ok(status)) if status.success() => {}
        Ok(Ok(status)) => {
            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => Vec::new(),
            };
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(failed(format!("{status}: {}", stderr.trim())));
        }
        Ok(Err(e)) => return Err(failed(e.to_string())),
        Err(_) => {
            warn!(
                "Timeout converting {}, killing converter processes",
                source.display()
            );
            #[cfg(unix)]
            if let Some(pid) = child.id() {
                terminate_group(pid);
            }
            let _ = child.start_kill();
            let _ = child.wait().await;
            if let Some(task) = stderr_task {
                task.abort();
            }
            kill_daemons(&config.daemon_names);
            return Err(NormalizeError::LegacyTimeout {
                path: source.to_path_buf(),
                secs: config.timeout_secs,
            });
        }
    }

    if !target.is_file() {
        return Err(failed(format!("no output at {}", target.display())));
    }
    Ok(target)
}

/// Send SIGTERM to the converter's process group.
#[cfg(unix)]
fn terminate_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the child leads its own group.
    let rc = unsafe { libc::killpg(pgid, libc::SIGTERM) };
    if rc != 0 {
        debug!("killpg({pgid}) failed: {}", std::io::Error::last_os_error());
    }
}

/// Kill every process whose name contains one of `names`.
pub fn kill_daemons(names: &[String]) -> usize {
    if names.is_empty() {
        return 0;
    }
    let mut sys = sysinfo::System::new_all();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

    let mut killed = 0;
    for process in sys.processes().values() {
        let name = process.name().to_string_lossy();
        if names.iter().any(|n| name.contains(n.as_str())) && process.kill() {
            debug!("Killed {} ({})", name, process.pid());
            killed += 1;
        }
    }
    killed
}
