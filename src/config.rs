//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// External process settings for launching and stopping session scripts.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProcessConfig {
    /// Detachable terminal multiplexer binary.
    #[serde(default = "default_multiplexer")]
    pub multiplexer: String,
    /// Interpreter used to run uploaded scripts.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Fixed pause between stopping and relaunching on restart.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    /// Upper bound for any terminate or list command.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    /// Kill every detached container when the server boots.
    #[serde(default = "default_true")]
    pub kill_detached_on_startup: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            multiplexer: default_multiplexer(),
            interpreter: default_interpreter(),
            restart_delay_ms: default_restart_delay_ms(),
            command_timeout_seconds: default_command_timeout(),
            kill_detached_on_startup: true,
        }
    }
}

impl ProcessConfig {
    /// Delay applied between terminate and relaunch during a restart.
    #[must_use]
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    /// Timeout applied to terminate and list commands.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }
}

/// Reconciliation loop settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MonitorConfig {
    /// Whether the reconciliation loop runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between container polls.
    #[serde(default = "default_monitor_interval")]
    pub interval_seconds: u64,
    /// Seconds a freshly launched process may stay absent from the
    /// container list before it counts as gone.
    #[serde(default = "default_launch_grace")]
    pub launch_grace_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_monitor_interval(),
            launch_grace_seconds: default_launch_grace(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_multiplexer() -> String {
    "screen".into()
}

fn default_interpreter() -> String {
    "python3".into()
}

fn default_restart_delay_ms() -> u64 {
    1000
}

fn default_command_timeout() -> u64 {
    5
}

fn default_monitor_interval() -> u64 {
    10
}

fn default_launch_grace() -> u64 {
    5
}

fn default_http_host() -> String {
    "127.0.0.1".into()
}

fn default_http_port() -> u16 {
    3000
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file.
    pub database_path: PathBuf,
    /// Directory holding uploaded program scripts.
    pub scripts_dir: PathBuf,
    /// HTTP bind host.
    #[serde(default = "default_http_host")]
    pub http_host: String,
    /// HTTP bind port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Script process settings.
    #[serde(default)]
    pub process: ProcessConfig,
    /// Reconciliation loop settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Interval between reconciliation polls.
    #[must_use]
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.interval_seconds)
    }

    /// Minimum age of a process handle before reconciliation may drop it.
    #[must_use]
    pub fn launch_grace(&self) -> Duration {
        Duration::from_secs(self.monitor.launch_grace_seconds)
    }

    fn validate(&mut self) -> Result<()> {
        if self.process.multiplexer.trim().is_empty() {
            return Err(AppError::Config("process.multiplexer must not be empty".into()));
        }

        if self.process.interpreter.trim().is_empty() {
            return Err(AppError::Config("process.interpreter must not be empty".into()));
        }

        if self.process.command_timeout_seconds == 0 {
            return Err(AppError::Config(
                "process.command_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.monitor.interval_seconds == 0 {
            return Err(AppError::Config(
                "monitor.interval_seconds must be greater than zero".into(),
            ));
        }

        let canonical = self
            .scripts_dir
            .canonicalize()
            .map_err(|err| AppError::Config(format!("scripts_dir invalid: {err}")))?;
        self.scripts_dir = canonical;

        Ok(())
    }
}
