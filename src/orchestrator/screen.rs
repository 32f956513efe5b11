//! `screen`-backed implementation of [`ProcessControl`].

use std::path::PathBuf;
use std::time::Duration;

use crate::config::GlobalConfig;
use crate::models::session::ScriptReference;
use crate::Result;

use super::registry::ProcessHandle;
use super::terminator::{self, Container};
use super::{launcher, BoxFuture, ProcessControl};

/// Launches scripts in detached `screen` sessions named after the session id.
#[derive(Debug, Clone)]
pub struct ScreenControl {
    multiplexer: String,
    interpreter: String,
    scripts_dir: PathBuf,
    command_timeout: Duration,
}

impl ScreenControl {
    /// Build from explicit settings.
    #[must_use]
    pub fn new(
        multiplexer: impl Into<String>,
        interpreter: impl Into<String>,
        scripts_dir: impl Into<PathBuf>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            multiplexer: multiplexer.into(),
            interpreter: interpreter.into(),
            scripts_dir: scripts_dir.into(),
            command_timeout,
        }
    }

    /// Build from the global configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(
            config.process.multiplexer.clone(),
            config.process.interpreter.clone(),
            config.scripts_dir.clone(),
            config.process.command_timeout(),
        )
    }
}

impl ProcessControl for ScreenControl {
    fn launch<'a>(
        &'a self,
        session_id: &'a str,
        script: &'a ScriptReference,
    ) -> BoxFuture<'a, Result<ProcessHandle>> {
        Box::pin(async move {
            launcher::launch(
                &self.multiplexer,
                &self.interpreter,
                &self.scripts_dir,
                session_id,
                script,
            )
        })
    }

    fn terminate<'a>(&'a self, target: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(terminator::terminate(
            &self.multiplexer,
            target,
            self.command_timeout,
        ))
    }

    fn list_containers(&self) -> BoxFuture<'_, Result<Vec<Container>>> {
        Box::pin(terminator::list_containers(
            &self.multiplexer,
            self.command_timeout,
        ))
    }
}
