//! Session process supervision.
//!
//! The [`SessionSupervisor`](supervisor::SessionSupervisor) drives every
//! lifecycle transition. It talks to the operating system only through
//! [`ProcessControl`] and to persisted session records only through
//! [`SessionStore`], so both sides can be replaced in tests.

pub mod child_monitor;
pub mod launcher;
pub mod registry;
pub mod screen;
pub mod supervisor;
pub mod terminator;

use std::future::Future;
use std::pin::Pin;

use crate::models::session::{ProgramSession, ScriptReference, StatusUpdate};
use crate::Result;

use self::registry::ProcessHandle;
use self::terminator::Container;

/// Boxed future returned by the supervision seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operating-system facility for detached, named script processes.
pub trait ProcessControl: Send + Sync {
    /// Start the script for `session_id` inside a detached container
    /// named after the session.
    ///
    /// Resolves once the process has been spawned, not when it exits.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::LaunchFailed`](crate::AppError::LaunchFailed) if
    /// the process cannot be created.
    fn launch<'a>(
        &'a self,
        session_id: &'a str,
        script: &'a ScriptReference,
    ) -> BoxFuture<'a, Result<ProcessHandle>>;

    /// Ask the container addressed by `target` to quit.
    ///
    /// `target` is either a session identifier or a `<pid>.<name>`
    /// container reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the quit command fails or times out.
    fn terminate<'a>(&'a self, target: &'a str) -> BoxFuture<'a, Result<()>>;

    /// List every container currently known to the multiplexer.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing command cannot be run.
    fn list_containers(&self) -> BoxFuture<'_, Result<Vec<Container>>>;
}

/// Persisted session records consumed by the supervisor.
pub trait SessionStore: Send + Sync {
    /// Fetch a session by id; `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn get_details<'a>(
        &'a self,
        session_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ProgramSession>>>;

    /// Persist a lifecycle transition and return the updated record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is missing or the write fails.
    fn update_status<'a>(
        &'a self,
        session_id: &'a str,
        update: &'a StatusUpdate,
    ) -> BoxFuture<'a, Result<ProgramSession>>;

    /// Every session currently recorded as running.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn list_running(&self) -> BoxFuture<'_, Result<Vec<ProgramSession>>>;

    /// Remove a session record; `Ok(false)` when it was already gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<bool>>;
}
