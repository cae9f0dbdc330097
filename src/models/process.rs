//! Snapshot types describing live script processes.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code; `None` when terminated by a signal or when the wait failed.
    pub code: Option<i32>,
}

impl ExitOutcome {
    /// Whether the process exited with code zero.
    #[must_use]
    pub fn success(self) -> bool {
        self.code == Some(0)
    }
}

/// Read-only view of a registry entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    /// Script identifier.
    #[serde(rename = "script")]
    pub identifier: String,
    /// Run id assigned at spawn.
    pub run: u64,
    /// OS process id, when the platform reported one.
    pub pid: Option<u32>,
    /// Spawn time.
    pub started_at: DateTime<Utc>,
}

/// Result of a dependency installation.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct InstallOutcome {
    /// `true` iff the installer exited with code zero.
    pub success: bool,
    /// Installer exit code (`None` on signal termination).
    pub code: Option<i32>,
}

impl From<ExitOutcome> for InstallOutcome {
    fn from(outcome: ExitOutcome) -> Self {
        Self {
            success: outcome.success(),
            code: outcome.code,
        }
    }
}
