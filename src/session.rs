//! Session facade: the request/response surface the IPC layer exposes.
//!
//! Thin glue over the supervisor, manifest reader, settings store and
//! desktop helpers. Every operation returns an explicit `Result`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::GlobalConfig;
use crate::desktop::{self, FolderPicker, SystemFolderPicker};
use crate::manifest;
use crate::models::process::{InstallOutcome, ProcessInfo};
use crate::models::project::ProjectSummary;
use crate::settings::SettingsStore;
use crate::supervisor::{ExitWatch, ShellEnvironment, Subscription, Supervisor};
use crate::Result;

/// Shared state behind every session operation.
pub struct Session {
    config: Arc<GlobalConfig>,
    supervisor: Arc<Supervisor>,
    settings: SettingsStore,
    picker: Box<dyn FolderPicker>,
}

impl Session {
    /// Assemble a session from its collaborators.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        supervisor: Arc<Supervisor>,
        settings: SettingsStore,
        picker: Box<dyn FolderPicker>,
    ) -> Self {
        Self {
            config,
            supervisor,
            settings,
            picker,
        }
    }

    /// Build the production session: configured settings location and the
    /// native folder picker.
    #[must_use]
    pub fn from_config(config: Arc<GlobalConfig>, shell_env: ShellEnvironment) -> Self {
        let supervisor = Arc::new(Supervisor::from_config(&config, shell_env));
        let settings = config
            .settings_path
            .clone()
            .map_or_else(SettingsStore::default_location, SettingsStore::new);
        Self::new(config, supervisor, settings, Box::new(SystemFolderPicker))
    }

    /// The underlying supervisor.
    #[must_use]
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Last project if it still exists, else the configured default, else
    /// the directory holding the executable.
    #[must_use]
    pub fn default_path(&self) -> PathBuf {
        if let Some(last) = self.settings.last_project_path() {
            if last.exists() {
                return last;
            }
        }

        if let Some(ref configured) = self.config.default_project_path {
            return configured.clone();
        }

        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Summarise the manifest in `project_path`, remembering the path.
    ///
    /// The path is saved as soon as a manifest is found, even if it then
    /// fails to parse.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ManifestMissing` or `AppError::ManifestParse`.
    pub fn load_project(&self, project_path: &Path) -> Result<ProjectSummary> {
        if manifest::has_manifest(project_path) {
            self.settings.save_last_project_path(project_path);
        }

        let summary = manifest::load_summary(project_path)?;
        info!(project = %project_path.display(), name = %summary.name, "project loaded");
        Ok(summary)
    }

    /// Ask the user to choose a directory.
    pub async fn select_folder(&self) -> Option<PathBuf> {
        self.picker.pick_folder().await
    }

    /// Start a script without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AlreadyRunning` or `AppError::Spawn`.
    pub async fn run_script(&self, project_path: &Path, script: &str) -> Result<ExitWatch> {
        self.supervisor.run_script(project_path, script).await.inspect_err(|err| {
            warn!(script, %err, "run request rejected");
        })
    }

    /// Stop a running script.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotRunning` if the script is not running.
    pub async fn stop_script(&self, script: &str) -> Result<ExitWatch> {
        self.supervisor.stop_script(script).await
    }

    /// Names of all running scripts.
    pub async fn running_scripts(&self) -> Vec<String> {
        self.supervisor.list_running().await
    }

    /// Details of a running script.
    pub async fn script_info(&self, script: &str) -> Option<ProcessInfo> {
        self.supervisor.process_info(script).await
    }

    /// Open a URL in the default browser; fire-and-forget.
    #[allow(clippy::unused_self)]
    pub fn open_url(&self, url: &str) {
        desktop::open_url(url);
    }

    /// Reveal a path in the OS file browser; fire-and-forget.
    #[allow(clippy::unused_self)]
    pub fn open_in_file_browser(&self, path: &Path) {
        desktop::reveal_in_file_browser(path);
    }

    /// Install dependencies and wait for the installer to finish.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the installer cannot be started.
    pub async fn install_dependencies(&self, project_path: &Path) -> Result<InstallOutcome> {
        self.supervisor.install_dependencies(project_path).await
    }

    /// Subscribe to `script-output` / `script-exit` events.
    pub async fn subscribe(&self) -> Subscription {
        self.supervisor.subscribe().await
    }

    /// Signal every running script; does not wait.
    pub async fn shutdown(&self) -> Vec<ExitWatch> {
        self.supervisor.shutdown().await
    }

    /// Signal every running script and wait up to `bound` for all of them
    /// to exit. Their exit events are published before this returns, so
    /// subscribers still connected see them.
    ///
    /// Returns `true` when every script exited within `bound`.
    pub async fn shutdown_and_wait(&self, bound: Duration) -> bool {
        let watches = self.shutdown().await;
        let pending = watches.len();
        let waited = tokio::time::timeout(
            bound,
            futures_util::future::join_all(watches.into_iter().map(ExitWatch::wait)),
        )
        .await;

        if waited.is_ok() {
            info!(pending, "all scripts exited");
            true
        } else {
            warn!(pending, ?bound, "some scripts were still exiting at shutdown");
            false
        }
    }
}
