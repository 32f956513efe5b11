//! Program session model and lifecycle helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

/// Whether a session's script process is supposed to be alive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// No process is associated with the session.
    Stopped,
    /// A detached process was launched for the session.
    Running,
}

impl Lifecycle {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
        }
    }

    /// Parse the storage representation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for unknown values.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "stopped" => Ok(Self::Stopped),
            "running" => Ok(Self::Running),
            other => Err(AppError::Validation(format!("invalid lifecycle: {other}"))),
        }
    }
}

/// Most recent lifecycle verb, kept for audit display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LastAction {
    /// Session was started with `run`.
    Started,
    /// Session was stopped with `stop`, `kill` or reconciliation.
    Stopped,
    /// Session process was replaced with `restart`.
    Restarted,
}

impl LastAction {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Restarted => "restarted",
        }
    }

    /// Parse the storage representation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for unknown values.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "started" => Ok(Self::Started),
            "stopped" => Ok(Self::Stopped),
            "restarted" => Ok(Self::Restarted),
            other => Err(AppError::Validation(format!("invalid last action: {other}"))),
        }
    }
}

/// What to execute for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptReference {
    /// Bare file name inside the configured scripts directory.
    pub script_name: String,
    /// Country argument passed to the script.
    pub country: String,
    /// Operator argument passed to the script.
    pub operator: String,
}

/// Program session record persisted in `SQLite`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSession {
    /// Unique record identifier; also the detached container name.
    pub id: String,
    /// Human readable name.
    pub session_name: String,
    /// Script file name.
    pub script_name: String,
    /// Country argument.
    pub country: String,
    /// Operator argument.
    pub operator: String,
    /// Current lifecycle.
    pub lifecycle: Lifecycle,
    /// Most recent lifecycle verb; `None` until the first action.
    pub last_action: Option<LastAction>,
    /// User that created the session.
    pub created_by: String,
    /// User that performed the last transition; `None` for system updates.
    pub updated_by: Option<String>,
    /// When the current process was launched.
    pub start_time: Option<DateTime<Utc>>,
    /// When the last process was stopped.
    pub end_time: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ProgramSession {
    /// Build a stopped session from creation input.
    #[must_use]
    pub fn new(input: NewProgramSession, created_by: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            session_name: input.session_name,
            script_name: input.script_name,
            country: input.country,
            operator: input.operator,
            lifecycle: Lifecycle::Stopped,
            last_action: None,
            created_by,
            updated_by: None,
            start_time: None,
            end_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Script and arguments needed to launch this session.
    #[must_use]
    pub fn script_reference(&self) -> ScriptReference {
        ScriptReference {
            script_name: self.script_name.clone(),
            country: self.country.clone(),
            operator: self.operator.clone(),
        }
    }

    /// Whether the session is recorded as running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }
}

/// Input for creating a session.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewProgramSession {
    /// Human readable name.
    pub session_name: String,
    /// Script file name inside the scripts directory.
    pub script_name: String,
    /// Country argument.
    pub country: String,
    /// Operator argument.
    pub operator: String,
}

impl NewProgramSession {
    /// Validate user-supplied fields.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if a field is blank or the script
    /// name is not a bare file name.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("sessionName", &self.session_name),
            ("country", &self.country),
            ("operator", &self.operator),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{field} must not be empty")));
            }
        }
        validate_script_name(&self.script_name)
    }
}

/// Criteria for listing sessions; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    /// Only sessions in this lifecycle.
    pub lifecycle: Option<Lifecycle>,
    /// Only sessions whose most recent action is this verb.
    pub last_action: Option<LastAction>,
    /// Only sessions created by this user.
    pub created_by: Option<String>,
    /// Only sessions last updated by this user.
    pub updated_by: Option<String>,
}

impl SessionFilter {
    /// Filter matching sessions in one lifecycle.
    #[must_use]
    pub fn lifecycle(lifecycle: Lifecycle) -> Self {
        Self {
            lifecycle: Some(lifecycle),
            ..Self::default()
        }
    }
}

/// State written by a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// New lifecycle.
    pub lifecycle: Lifecycle,
    /// Verb recorded for the transition.
    pub last_action: LastAction,
    /// Acting user; `None` when the supervisor itself reconciles.
    pub updated_by: Option<String>,
}

impl StatusUpdate {
    /// Transition written by `run`.
    #[must_use]
    pub fn started(user_id: &str) -> Self {
        Self {
            lifecycle: Lifecycle::Running,
            last_action: LastAction::Started,
            updated_by: Some(user_id.to_owned()),
        }
    }

    /// Transition written by `stop`.
    #[must_use]
    pub fn stopped(user_id: Option<&str>) -> Self {
        Self {
            lifecycle: Lifecycle::Stopped,
            last_action: LastAction::Stopped,
            updated_by: user_id.map(str::to_owned),
        }
    }

    /// Transition written by `restart`.
    #[must_use]
    pub fn restarted(user_id: &str) -> Self {
        Self {
            lifecycle: Lifecycle::Running,
            last_action: LastAction::Restarted,
            updated_by: Some(user_id.to_owned()),
        }
    }
}

/// Reject script names that could escape the scripts directory.
///
/// # Errors
///
/// Returns `AppError::Validation` if the name is empty, contains a path
/// separator or a NUL byte, or is `.` / `..`.
pub fn validate_script_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("scriptName must not be empty".into()));
    }
    if name == "." || name == ".." {
        return Err(AppError::Validation(format!("invalid script name: {name}")));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(AppError::Validation(format!(
            "script name must not contain path separators: {name}"
        )));
    }
    Ok(())
}
