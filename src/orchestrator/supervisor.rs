//! Session lifecycle controller: run, stop, restart, kill.
//!
//! Every transition on a session holds that session's registry lock for
//! the whole fetch/act/update sequence, so concurrent requests for one
//! session are applied one after another against fresh state.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::models::session::{ProgramSession, StatusUpdate};
use crate::{AppError, Result};

use super::registry::{ProcessHandle, ProcessRegistry};
use super::{ProcessControl, SessionStore};

/// Outcome of a bulk [`SessionSupervisor::kill_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KillAllSummary {
    /// Detached containers found.
    pub found: usize,
    /// Containers whose quit command failed.
    pub failed: usize,
}

/// Lifecycle controller combining the record store with process control.
pub struct SessionSupervisor {
    store: Arc<dyn SessionStore>,
    control: Arc<dyn ProcessControl>,
    registry: Arc<ProcessRegistry>,
    restart_delay: Duration,
    launch_grace: Duration,
}

impl SessionSupervisor {
    /// Create a supervisor with its own empty registry.
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        control: Arc<dyn ProcessControl>,
        restart_delay: Duration,
    ) -> Self {
        Self::with_registry(store, control, Arc::new(ProcessRegistry::new()), restart_delay)
    }

    /// Create a supervisor sharing an existing registry.
    #[must_use]
    pub fn with_registry(
        store: Arc<dyn SessionStore>,
        control: Arc<dyn ProcessControl>,
        registry: Arc<ProcessRegistry>,
        restart_delay: Duration,
    ) -> Self {
        Self {
            store,
            control,
            registry,
            restart_delay,
            launch_grace: Duration::ZERO,
        }
    }

    /// Keep handles younger than `grace` through reconciliation even when
    /// their container is not listed yet.
    #[must_use]
    pub fn with_launch_grace(mut self, grace: Duration) -> Self {
        self.launch_grace = grace;
        self
    }

    /// Registry of live handles owned by this supervisor.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// Launch the session's script and mark it running.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the session does not exist.
    /// - `AppError::AlreadyRunning` if it is already running; nothing is launched.
    /// - `AppError::LaunchFailed` if the process cannot be spawned.
    /// - `AppError::Internal` if the record update fails; the new process
    ///   is asked to quit before returning.
    pub async fn run(&self, session_id: &str, user_id: &str) -> Result<ProgramSession> {
        async {
            let _lock = self.registry.lock_session(session_id).await;
            let session = self.fetch(session_id).await?;
            if session.is_running() {
                return Err(AppError::AlreadyRunning(format!(
                    "session {session_id} is already running"
                )));
            }

            if let Some(stale) = self.registry.remove(session_id).await {
                warn!(pid = ?stale.pid, "stale process registered for stopped session, terminating");
                self.terminate_quietly(session_id).await;
            }

            self.launch(&session).await?;

            match self
                .store
                .update_status(session_id, &StatusUpdate::started(user_id))
                .await
            {
                Ok(updated) => {
                    info!(user_id, "session started");
                    Ok(updated)
                }
                Err(err) => Err(self.compensate(session_id, &err).await),
            }
        }
        .instrument(info_span!("run_session", session_id))
        .await
    }

    /// Ask the session's process to quit and mark it stopped.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the session does not exist.
    /// - `AppError::AlreadyStopped` if it is not running; nothing is terminated.
    /// - `AppError::Internal` if the record update fails after the process
    ///   was already asked to quit.
    pub async fn stop(&self, session_id: &str, user_id: &str) -> Result<ProgramSession> {
        async {
            let _lock = self.registry.lock_session(session_id).await;
            let session = self.fetch(session_id).await?;
            if !session.is_running() {
                return Err(AppError::AlreadyStopped(format!(
                    "session {session_id} is already stopped"
                )));
            }

            self.registry.remove(session_id).await;
            self.terminate_quietly(session_id).await;

            match self
                .store
                .update_status(session_id, &StatusUpdate::stopped(Some(user_id)))
                .await
            {
                Ok(updated) => {
                    info!(user_id, "session stopped");
                    Ok(updated)
                }
                Err(err) => {
                    error!(%err, "failed to record stop; process was already asked to quit");
                    Err(AppError::Internal(format!(
                        "failed to update session {session_id}: {err}"
                    )))
                }
            }
        }
        .instrument(info_span!("stop_session", session_id))
        .await
    }

    /// Replace the session's process with a fresh one.
    ///
    /// The old container is asked to quit, the configured delay elapses,
    /// then the script is launched again with the same parameters.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the session does not exist.
    /// - `AppError::NotRunning` if it is not running.
    /// - `AppError::LaunchFailed` if relaunching fails; the record is
    ///   marked stopped on a best-effort basis.
    /// - `AppError::Internal` if the record update fails; the new process
    ///   is asked to quit before returning.
    pub async fn restart(&self, session_id: &str, user_id: &str) -> Result<ProgramSession> {
        async {
            let _lock = self.registry.lock_session(session_id).await;
            let session = self.fetch(session_id).await?;
            if !session.is_running() {
                return Err(AppError::NotRunning(format!(
                    "session {session_id} is not running"
                )));
            }

            self.registry.remove(session_id).await;
            self.terminate_quietly(session_id).await;
            tokio::time::sleep(self.restart_delay).await;

            if let Err(err) = self.launch(&session).await {
                if let Err(update_err) = self
                    .store
                    .update_status(session_id, &StatusUpdate::stopped(Some(user_id)))
                    .await
                {
                    warn!(%update_err, "failed to mark session stopped after relaunch failure");
                }
                return Err(err);
            }

            match self
                .store
                .update_status(session_id, &StatusUpdate::restarted(user_id))
                .await
            {
                Ok(updated) => {
                    info!(user_id, "session restarted");
                    Ok(updated)
                }
                Err(err) => Err(self.compensate(session_id, &err).await),
            }
        }
        .instrument(info_span!("restart_session", session_id))
        .await
    }

    /// Unconditionally ask the session's container to quit.
    ///
    /// The record store is never touched.
    pub async fn kill(&self, session_id: &str) {
        async {
            let _lock = self.registry.lock_session(session_id).await;
            self.kill_locked(session_id).await;
        }
        .instrument(info_span!("kill_session", session_id))
        .await;
    }

    /// Kill the session's container and delete its record.
    ///
    /// Both steps happen under the session lock, so no `run` can launch a
    /// process between the kill and the delete.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the session does not exist; nothing is
    ///   terminated.
    /// - Any store error from the delete; the container was already asked
    ///   to quit.
    pub async fn remove_session(&self, session_id: &str) -> Result<()> {
        async {
            let _lock = self.registry.lock_session(session_id).await;
            self.fetch(session_id).await?;
            self.kill_locked(session_id).await;
            if !self.store.delete(session_id).await? {
                return Err(AppError::NotFound(format!("session {session_id} not found")));
            }
            info!("session deleted");
            Ok(())
        }
        .instrument(info_span!("remove_session", session_id))
        .await
    }

    /// Ask every detached container to quit.
    ///
    /// Failures are logged and counted; the batch always runs to the end.
    pub async fn kill_all(&self) -> KillAllSummary {
        async {
            let containers = match self.control.list_containers().await {
                Ok(containers) => containers,
                Err(err) => {
                    error!(%err, "failed to list containers");
                    return KillAllSummary::default();
                }
            };

            let mut summary = KillAllSummary::default();
            for container in containers.iter().filter(|c| c.is_detached()) {
                summary.found += 1;
                let target = container.qualified_name();
                if let Err(err) = self.control.terminate(&target).await {
                    summary.failed += 1;
                    warn!(container = %target, %err, "failed to kill detached container");
                }
                self.registry.remove(&container.name).await;
            }

            info!(found = summary.found, failed = summary.failed, "detached containers killed");
            summary
        }
        .instrument(info_span!("kill_all"))
        .await
    }

    /// Mark sessions whose container disappeared as stopped.
    ///
    /// Candidates are every registered handle plus every record stored as
    /// running, so records left over from a previous supervisor process
    /// are corrected too. Containers reported dead count as gone. Handles
    /// registered after the listing was taken, or younger than the launch
    /// grace, are left alone. Returns the ids that were reconciled.
    ///
    /// # Errors
    ///
    /// Returns an error if the container listing or the running-record
    /// query fails.
    pub async fn reconcile(&self) -> Result<Vec<String>> {
        async {
            let listed_at = Utc::now();
            let live: HashSet<String> = self
                .control
                .list_containers()
                .await?
                .into_iter()
                .filter(|c| !c.is_dead())
                .map(|c| c.name)
                .collect();

            let mut candidates: BTreeSet<String> = self
                .registry
                .handles()
                .await
                .into_iter()
                .map(|h| h.session_id)
                .collect();
            candidates.extend(self.store.list_running().await?.into_iter().map(|s| s.id));

            let mut reconciled = Vec::new();
            for session_id in candidates.iter().filter(|id| !live.contains(*id)) {
                if self.reconcile_one(session_id, listed_at).await {
                    reconciled.push(session_id.clone());
                }
            }

            self.registry.prune_idle_locks().await;
            Ok::<_, AppError>(reconciled)
        }
        .instrument(info_span!("reconcile"))
        .await
    }

    async fn reconcile_one(&self, session_id: &str, listed_at: DateTime<Utc>) -> bool {
        let _lock = self.registry.lock_session(session_id).await;

        if let Some(handle) = self.registry.get(session_id).await {
            let grace = chrono::Duration::from_std(self.launch_grace)
                .unwrap_or(chrono::Duration::MAX);
            if handle.started_at >= listed_at || listed_at - handle.started_at < grace {
                return false;
            }
            self.registry.remove(session_id).await;
        } else {
            match self.store.get_details(session_id).await {
                Ok(Some(session)) if session.is_running() => {}
                Ok(_) => return false,
                Err(err) => {
                    warn!(session_id, %err, "failed to re-read session during reconciliation");
                    return false;
                }
            }
        }

        match self
            .store
            .update_status(session_id, &StatusUpdate::stopped(None))
            .await
        {
            Ok(_) => info!(session_id, "session process gone, marked stopped"),
            Err(AppError::NotFound(_)) => {
                info!(session_id, "session process gone and record deleted");
            }
            Err(err) => warn!(session_id, %err, "failed to mark vanished session stopped"),
        }
        true
    }

    async fn fetch(&self, session_id: &str) -> Result<ProgramSession> {
        self.store
            .get_details(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("session {session_id} not found")))
    }

    async fn launch(&self, session: &ProgramSession) -> Result<ProcessHandle> {
        let handle = self
            .control
            .launch(&session.id, &session.script_reference())
            .await?;
        self.registry.insert(handle.clone()).await;
        Ok(handle)
    }

    async fn kill_locked(&self, session_id: &str) {
        self.registry.remove(session_id).await;
        self.terminate_quietly(session_id).await;
        info!("session killed");
    }

    async fn terminate_quietly(&self, target: &str) {
        if let Err(err) = self.control.terminate(target).await {
            warn!(container = target, %err, "terminate failed; treating as already gone");
        }
    }

    async fn compensate(&self, session_id: &str, err: &AppError) -> AppError {
        error!(%err, "failed to record transition; terminating new process");
        self.registry.remove(session_id).await;
        self.terminate_quietly(session_id).await;
        AppError::Internal(format!("failed to update session {session_id}: {err}"))
    }
}
