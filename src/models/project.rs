//! Project manifest summary returned by `load-project`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Summary of a project's `package.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    /// Package name, or `Unknown Project`.
    pub name: String,
    /// Package version, or `0.0.0`.
    pub version: String,
    /// Declared scripts, name to command line.
    pub scripts: BTreeMap<String, String>,
    /// Runtime dependencies, name to version range.
    pub dependencies: BTreeMap<String, String>,
    /// Development dependencies, name to version range.
    pub dev_dependencies: BTreeMap<String, String>,
    /// Whether `node_modules` exists next to the manifest.
    pub has_installed_dependencies: bool,
    /// Directory the manifest was loaded from.
    pub project_path: PathBuf,
}
