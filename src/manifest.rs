//! `package.json` reader.
//!
//! The supervisor never re-validates script names; callers learn which
//! scripts exist from the [`ProjectSummary`] produced here.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::models::project::ProjectSummary;
use crate::{AppError, Result};

/// Manifest file name looked up in the project directory.
pub const MANIFEST_FILE: &str = "package.json";

/// Directory whose presence marks dependencies as installed.
pub const DEPENDENCY_DIR: &str = "node_modules";

/// Subset of `package.json` the summary needs. Every field may be absent
/// or `null`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    scripts: Option<BTreeMap<String, String>>,
    #[serde(default)]
    dependencies: Option<BTreeMap<String, String>>,
    #[serde(default)]
    dev_dependencies: Option<BTreeMap<String, String>>,
}

/// Path of the manifest inside `project_path`.
#[must_use]
pub fn manifest_path(project_path: &Path) -> PathBuf {
    project_path.join(MANIFEST_FILE)
}

/// Whether `project_path` contains a manifest file.
#[must_use]
pub fn has_manifest(project_path: &Path) -> bool {
    manifest_path(project_path).is_file()
}

/// Read and summarise the manifest in `project_path`.
///
/// # Errors
///
/// Returns `AppError::ManifestMissing` when there is no `package.json`, or
/// `AppError::ManifestParse` when it cannot be read or is not valid JSON.
pub fn load_summary(project_path: &Path) -> Result<ProjectSummary> {
    let path = manifest_path(project_path);
    if !path.is_file() {
        return Err(AppError::ManifestMissing);
    }

    let raw = fs::read_to_string(&path)
        .map_err(|err| AppError::ManifestParse(format!("cannot read {}: {err}", path.display())))?;
    let summary = parse_summary(&raw, project_path)?;

    debug!(
        project = %project_path.display(),
        scripts = summary.scripts.len(),
        installed = summary.has_installed_dependencies,
        "manifest loaded"
    );
    Ok(summary)
}

/// Parse manifest JSON text into a summary rooted at `project_path`.
///
/// # Errors
///
/// Returns `AppError::ManifestParse` if `raw` is not a valid manifest.
pub fn parse_summary(raw: &str, project_path: &Path) -> Result<ProjectSummary> {
    let manifest: RawManifest =
        serde_json::from_str(raw).map_err(|err| AppError::ManifestParse(err.to_string()))?;

    Ok(ProjectSummary {
        name: non_empty(manifest.name).unwrap_or_else(|| "Unknown Project".into()),
        version: non_empty(manifest.version).unwrap_or_else(|| "0.0.0".into()),
        scripts: manifest.scripts.unwrap_or_default(),
        dependencies: manifest.dependencies.unwrap_or_default(),
        dev_dependencies: manifest.dev_dependencies.unwrap_or_default(),
        has_installed_dependencies: project_path.join(DEPENDENCY_DIR).is_dir(),
        project_path: project_path.to_path_buf(),
    })
}

/// Empty strings count as missing.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
