//! Global configuration parsing and validation.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

fn default_ipc_name() -> String {
    "script-commander".into()
}

fn default_package_manager() -> String {
    "npm".into()
}

fn default_install_args() -> Vec<String> {
    vec!["install".into()]
}

fn default_login_shell() -> String {
    env::var("SHELL")
        .ok()
        .filter(|shell| !shell.is_empty())
        .unwrap_or_else(|| "/bin/zsh".into())
}

fn default_shell_env_timeout() -> u64 {
    5
}

fn default_stop_grace() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

/// Global configuration parsed from `config.toml`.
///
/// Every field has a default, so an empty document (or no file at all)
/// yields a usable configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Named pipe / Unix socket identifier.
    #[serde(default = "default_ipc_name")]
    pub ipc_name: String,
    /// Package manager binary used for `run` and `install` (e.g. `npm`, `pnpm`).
    #[serde(default = "default_package_manager")]
    pub package_manager: String,
    /// Arguments passed to the package manager for dependency installation.
    #[serde(default = "default_install_args")]
    pub install_args: Vec<String>,
    /// Shell used once at startup to capture the user's login `PATH`.
    #[serde(default = "default_login_shell")]
    pub login_shell: String,
    /// Upper bound on login-shell environment capture.
    #[serde(default = "default_shell_env_timeout")]
    pub shell_env_timeout_seconds: u64,
    /// Grace period after SIGTERM before a stopped script is force-killed;
    /// 0 disables escalation.
    #[serde(default = "default_stop_grace")]
    pub stop_grace_seconds: u64,
    /// Whether to set `FORCE_COLOR=1` for spawned scripts.
    #[serde(default = "default_true")]
    pub force_color: bool,
    /// Fallback project directory when no last-used path is saved.
    #[serde(default)]
    pub default_project_path: Option<PathBuf>,
    /// Override for the settings file location.
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            ipc_name: default_ipc_name(),
            package_manager: default_package_manager(),
            install_args: default_install_args(),
            login_shell: default_login_shell(),
            shell_env_timeout_seconds: default_shell_env_timeout(),
            stop_grace_seconds: default_stop_grace(),
            force_color: true,
            default_project_path: None,
            settings_path: None,
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Grace period before a stopped script is force-killed, if enabled.
    #[must_use]
    pub fn stop_grace(&self) -> Option<Duration> {
        (self.stop_grace_seconds > 0).then(|| Duration::from_secs(self.stop_grace_seconds))
    }

    /// Timeout for capturing the login-shell environment.
    #[must_use]
    pub fn shell_env_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_env_timeout_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.ipc_name.trim().is_empty() {
            return Err(AppError::Config("ipc_name must not be empty".into()));
        }

        if self.package_manager.trim().is_empty() {
            return Err(AppError::Config("package_manager must not be empty".into()));
        }

        if self.shell_env_timeout_seconds == 0 {
            return Err(AppError::Config(
                "shell_env_timeout_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
