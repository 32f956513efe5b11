//! In-memory registry of live session processes.
//!
//! The supervisor exclusively owns every entry; other components refer to
//! processes by session id only. The registry also hands out one async
//! mutex per session so lifecycle transitions on the same session never
//! interleave.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Typed handle for a process launched on behalf of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessHandle {
    /// Session (and container) name.
    pub session_id: String,
    /// OS pid of the launcher process, if the platform reported one.
    pub pid: Option<u32>,
    /// When the process was spawned.
    pub started_at: DateTime<Utc>,
}

impl ProcessHandle {
    /// Handle stamped with the current time.
    #[must_use]
    pub fn new(session_id: impl Into<String>, pid: Option<u32>) -> Self {
        Self {
            session_id: session_id.into(),
            pid,
            started_at: Utc::now(),
        }
    }
}

/// Registry of live handles plus per-session serialization locks.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    handles: Mutex<HashMap<String, ProcessHandle>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProcessRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handle, returning the one it replaced.
    pub async fn insert(&self, handle: ProcessHandle) -> Option<ProcessHandle> {
        self.handles
            .lock()
            .await
            .insert(handle.session_id.clone(), handle)
    }

    /// Remove and return the handle for a session.
    pub async fn remove(&self, session_id: &str) -> Option<ProcessHandle> {
        self.handles.lock().await.remove(session_id)
    }

    /// Copy of the handle for a session.
    pub async fn get(&self, session_id: &str) -> Option<ProcessHandle> {
        self.handles.lock().await.get(session_id).cloned()
    }

    /// Whether a handle is registered for the session.
    pub async fn contains(&self, session_id: &str) -> bool {
        self.handles.lock().await.contains_key(session_id)
    }

    /// Snapshot of all registered handles.
    pub async fn handles(&self) -> Vec<ProcessHandle> {
        self.handles.lock().await.values().cloned().collect()
    }

    /// Number of registered handles.
    pub async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }

    /// Whether no handles are registered.
    pub async fn is_empty(&self) -> bool {
        self.handles.lock().await.is_empty()
    }

    /// Acquire the serialization lock for a session.
    ///
    /// The guard must be held across the whole read-modify-write of a
    /// lifecycle transition. Lock entries nobody holds or waits on are
    /// dropped here, so the map only tracks sessions in flight.
    pub async fn lock_session(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|id, lock| id == session_id || Arc::strong_count(lock) > 1);
            Arc::clone(
                locks
                    .entry(session_id.to_owned())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Number of tracked session locks.
    pub async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Drop lock entries that nobody holds or waits on.
    ///
    /// Returns the number of entries removed.
    pub async fn prune_idle_locks(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }
}
