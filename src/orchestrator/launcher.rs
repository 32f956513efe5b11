//! Script process launcher.
//!
//! Starts a session's script inside a detached `screen` container named
//! after the session id. The launcher process's stdout and stderr are
//! forwarded line by line into `tracing`, and its exit code is logged when
//! it completes. Failures after the spawn are only logged.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::models::session::{validate_script_name, ScriptReference};
use crate::{AppError, Result};

use super::registry::ProcessHandle;

/// Arguments passed to the multiplexer to start a detached session.
///
/// Produces `-dmS <session_id> <interpreter> <script_path> --country <c>
/// --operator <o>`.
#[must_use]
pub fn launch_args(
    session_id: &str,
    interpreter: &str,
    script_path: &Path,
    script: &ScriptReference,
) -> Vec<OsString> {
    vec![
        "-dmS".into(),
        session_id.into(),
        interpreter.into(),
        script_path.as_os_str().to_owned(),
        "--country".into(),
        script.country.clone().into(),
        "--operator".into(),
        script.operator.clone().into(),
    ]
}

/// Spawn the detached container for a session.
///
/// Must be called from within a Tokio runtime: output forwarding and the
/// exit watcher run as background tasks.
///
/// # Errors
///
/// Returns `AppError::LaunchFailed` if the script name is unsafe, the
/// script file does not exist, or the multiplexer cannot be spawned.
pub fn launch(
    multiplexer: &str,
    interpreter: &str,
    scripts_dir: &Path,
    session_id: &str,
    script: &ScriptReference,
) -> Result<ProcessHandle> {
    validate_script_name(&script.script_name)
        .map_err(|err| AppError::LaunchFailed(err.to_string()))?;

    let script_path = scripts_dir.join(&script.script_name);
    if !script_path.is_file() {
        return Err(AppError::LaunchFailed(format!(
            "script not found: {}",
            script_path.display()
        )));
    }

    let mut child = Command::new(multiplexer)
        .args(launch_args(session_id, interpreter, &script_path, script))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| AppError::LaunchFailed(format!("failed to spawn {multiplexer}: {err}")))?;

    let pid = child.id();
    info!(
        session_id,
        pid = pid.unwrap_or(0),
        script = %script_path.display(),
        country = %script.country,
        operator = %script.operator,
        "session process spawned"
    );

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(session_id.to_owned(), stdout, OutputStream::Stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(session_id.to_owned(), stderr, OutputStream::Stderr));
    }

    let owned_id = session_id.to_owned();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                info!(session_id = %owned_id, exit_code = ?status.code(), "session process exited");
            }
            Err(err) => {
                warn!(session_id = %owned_id, %err, "failed waiting for session process");
            }
        }
    });

    Ok(ProcessHandle::new(session_id, pid))
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

async fn forward_lines<R>(session_id: String, reader: R, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match stream {
                    OutputStream::Stdout => info!(session_id, output = line, "session stdout"),
                    OutputStream::Stderr => error!(session_id, output = line, "session stderr"),
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(session_id, %err, "failed reading session output");
                break;
            }
        }
    }
}
