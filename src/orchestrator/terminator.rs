//! Detached container termination and listing.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{AppError, Result};

/// State reported by `screen -ls` for a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// A terminal is attached.
    Attached,
    /// Running with no terminal attached.
    Detached,
    /// Anything else (`Dead ???`, `Multi, attached`, ...).
    Other(String),
}

/// One entry of the multiplexer's session list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    /// Pid of the container's server process.
    pub pid: u32,
    /// Container name; a session id for containers we launched.
    pub name: String,
    /// Reported state.
    pub state: ContainerState,
}

impl Container {
    /// Unambiguous `<pid>.<name>` reference accepted by `screen -S`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.pid, self.name)
    }

    /// Whether nobody is attached to the container.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.state == ContainerState::Detached
    }

    /// Whether the container's server process is gone and only a stale
    /// socket remains.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        matches!(&self.state, ContainerState::Other(state) if state.starts_with("Dead"))
    }
}

fn container_line() -> Option<&'static Regex> {
    static LINE: OnceLock<Option<Regex>> = OnceLock::new();
    LINE.get_or_init(|| Regex::new(r"^\s*(\d+)\.(\S+)\s.*\(([^()]+)\)\s*$").ok())
        .as_ref()
}

/// Parse the output of `screen -ls` into containers.
///
/// Header and footer lines are ignored.
#[must_use]
pub fn parse_container_list(output: &str) -> Vec<Container> {
    let Some(re) = container_line() else {
        return Vec::new();
    };

    output
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            let pid = caps.get(1)?.as_str().parse().ok()?;
            let name = caps.get(2)?.as_str().to_owned();
            let state = match caps.get(3)?.as_str() {
                "Detached" => ContainerState::Detached,
                "Attached" => ContainerState::Attached,
                other => ContainerState::Other(other.to_owned()),
            };
            Some(Container { pid, name, state })
        })
        .collect()
}

/// Ask the container addressed by `target` to quit.
///
/// Waits for the quit command itself (bounded by `timeout`), not for the
/// script to exit.
///
/// # Errors
///
/// Returns `AppError::Io` if the command cannot be run, exits non-zero, or
/// does not finish within `timeout`.
pub async fn terminate(multiplexer: &str, target: &str, timeout: Duration) -> Result<()> {
    let output = run_with_timeout(
        Command::new(multiplexer).args(["-X", "-S", target, "quit"]),
        timeout,
    )
    .await?;

    if output.status.success() {
        info!(container = target, "container asked to quit");
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        Err(AppError::Io(format!(
            "{multiplexer} quit for {target} exited with {:?}: {}",
            output.status.code(),
            first_non_empty(&stderr, &stdout)
        )))
    }
}

/// List containers known to the multiplexer.
///
/// `screen -ls` exits non-zero when there are no sockets, so the exit
/// status is ignored and only the output is parsed.
///
/// # Errors
///
/// Returns `AppError::Io` if the command cannot be run or times out.
pub async fn list_containers(multiplexer: &str, timeout: Duration) -> Result<Vec<Container>> {
    let output = run_with_timeout(Command::new(multiplexer).arg("-ls"), timeout).await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let containers = parse_container_list(&stdout);
    debug!(count = containers.len(), "listed containers");
    Ok(containers)
}

async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<std::process::Output> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(AppError::Io(format!("failed to run command: {err}"))),
        Err(_) => Err(AppError::Io(format!("command timed out after {timeout:?}"))),
    }
}

fn first_non_empty<'a>(a: &'a str, b: &'a str) -> &'a str {
    let a = a.trim();
    if a.is_empty() {
        b.trim()
    } else {
        a
    }
}
