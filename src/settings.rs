//! Best-effort persistence of the last opened project.
//!
//! Every failure here is swallowed: a missing, unreadable or corrupt
//! settings file reads as "no saved path", and write failures are only
//! logged.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Persisted settings record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Last project successfully loaded.
    #[serde(default)]
    pub last_project_path: Option<PathBuf>,
}

/// JSON-file settings store at a fixed per-user location.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Store backed by an explicit file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Store at `<config_dir>/script-commander/settings.json`.
    ///
    /// When the platform has no config directory the store is inert.
    #[must_use]
    pub fn default_location() -> Self {
        Self {
            path: dirs::config_dir().map(|dir| dir.join("script-commander").join("settings.json")),
        }
    }

    /// Backing file path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the settings record, falling back to defaults on any error.
    #[must_use]
    pub fn load(&self) -> Settings {
        let Some(path) = self.path.as_deref() else {
            return Settings::default();
        };

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %path.display(), %err, "no readable settings file");
                return Settings::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "ignoring corrupt settings file");
            Settings::default()
        })
    }

    /// Last saved project path, if any.
    #[must_use]
    pub fn last_project_path(&self) -> Option<PathBuf> {
        self.load().last_project_path
    }

    /// Overwrite the settings record with `project_path`.
    pub fn save_last_project_path(&self, project_path: &Path) {
        let Some(path) = self.path.as_deref() else {
            return;
        };

        let settings = Settings {
            last_project_path: Some(project_path.to_path_buf()),
        };
        let result = serde_json::to_string(&settings)
            .map_err(std::io::Error::other)
            .and_then(|json| {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, json)
            });

        if let Err(err) = result {
            warn!(path = %path.display(), %err, "failed to save settings");
        }
    }
}
