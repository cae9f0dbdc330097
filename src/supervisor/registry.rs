//! Process registry: the single source of truth for "is X running".
//!
//! Every mutation path (spawn, stop, natural exit, shutdown drain) goes
//! through the methods here, all of which hold the same lock.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::models::process::ProcessInfo;
use crate::supervisor::handle::ProcessHandle;
use crate::{AppError, Result};

/// One in-flight script execution.
#[derive(Debug)]
pub struct ScriptProcess {
    identifier: String,
    run_id: u64,
    started_at: DateTime<Utc>,
    handle: ProcessHandle,
}

impl ScriptProcess {
    /// Wrap a freshly spawned process.
    #[must_use]
    pub fn new(identifier: impl Into<String>, run_id: u64, handle: ProcessHandle) -> Self {
        Self {
            identifier: identifier.into(),
            run_id,
            started_at: Utc::now(),
            handle,
        }
    }

    /// Script identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Run id assigned at spawn.
    #[must_use]
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Spawn time.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Handle on the underlying OS process.
    #[must_use]
    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    /// Snapshot of this entry.
    #[must_use]
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            identifier: self.identifier.clone(),
            run: self.run_id,
            pid: self.handle.pid(),
            started_at: self.started_at,
        }
    }
}

/// Mapping from script identifier to its live process.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    entries: Mutex<HashMap<String, ScriptProcess>>,
}

impl ProcessRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `process` iff its identifier is free.
    ///
    /// Returns `false` (and hands nothing back) when an entry already
    /// exists; the caller must then dispose of the process itself.
    pub async fn try_register(&self, process: ScriptProcess) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&process.identifier) {
            return false;
        }
        entries.insert(process.identifier.clone(), process);
        true
    }

    /// Check, spawn and insert under a single lock acquisition.
    ///
    /// `spawn` is only invoked when `identifier` is free, so concurrent
    /// callers for the same identifier spawn exactly one process.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AlreadyRunning` when `identifier` is registered,
    /// or whatever `spawn` returns.
    pub async fn register_with<T, F>(&self, identifier: &str, spawn: F) -> Result<T>
    where
        F: FnOnce() -> Result<(ScriptProcess, T)>,
    {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(identifier) {
            return Err(AppError::AlreadyRunning(identifier.to_owned()));
        }

        let (process, spawned) = spawn()?;
        debug_assert_eq!(process.identifier, identifier);
        entries.insert(identifier.to_owned(), process);
        Ok(spawned)
    }

    /// Remove the entry for `identifier`; removing an absent one is a no-op.
    pub async fn remove(&self, identifier: &str) -> Option<ScriptProcess> {
        self.entries.lock().await.remove(identifier)
    }

    /// Remove the entry only if it still belongs to `run_id`.
    ///
    /// Used by exit monitors: after a stop, the identifier may already be
    /// held by a newer run that must not be evicted.
    pub async fn remove_run(&self, identifier: &str, run_id: u64) -> Option<ScriptProcess> {
        let mut entries = self.entries.lock().await;
        if entries.get(identifier).is_some_and(|p| p.run_id == run_id) {
            entries.remove(identifier)
        } else {
            None
        }
    }

    /// Snapshot of the entry for `identifier`.
    pub async fn get(&self, identifier: &str) -> Option<ProcessInfo> {
        self.entries.lock().await.get(identifier).map(ScriptProcess::info)
    }

    /// Whether `identifier` is registered.
    pub async fn contains(&self, identifier: &str) -> bool {
        self.entries.lock().await.contains_key(identifier)
    }

    /// Snapshot of all registered identifiers.
    pub async fn list_identifiers(&self) -> BTreeSet<String> {
        self.entries.lock().await.keys().cloned().collect()
    }

    /// Number of registered processes.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Atomically empty the registry, returning everything it held.
    pub async fn drain_all(&self) -> Vec<ScriptProcess> {
        self.entries
            .lock()
            .await
            .drain()
            .map(|(_, process)| process)
            .collect()
    }
}
