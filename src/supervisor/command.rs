//! Command construction for script and install processes.
//!
//! Packaged or service-launched daemons inherit a minimal `PATH`, so the
//! user's login-shell `PATH` is captured once at startup
//! ([`ShellEnvironment::capture`]) and reused for program resolution and
//! as the child's `PATH`. Nothing is shelled out per run.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::{AppError, Result};

/// Marker printed by the login shell ahead of its `PATH` so that rc-file
/// noise on stdout can be ignored.
const PATH_MARKER: &str = "__SCRIPT_COMMANDER_PATH__=";

/// Resolved command-search environment shared by every spawn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellEnvironment {
    path: Option<OsString>,
}

impl ShellEnvironment {
    /// Use this process's own `PATH` unchanged.
    #[must_use]
    pub fn inherit() -> Self {
        Self {
            path: env::var_os("PATH"),
        }
    }

    /// Use an explicit `PATH` value.
    #[must_use]
    pub fn from_path(path: impl Into<OsString>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Capture the `PATH` a login shell would see, merged with this
    /// process's `PATH`. Falls back to [`ShellEnvironment::inherit`] when
    /// the shell is missing, fails, or exceeds `timeout`.
    pub async fn capture(shell: &str, timeout: Duration) -> Self {
        let inherited = Self::inherit();
        if !cfg!(unix) {
            return inherited;
        }

        let script = format!("printf '\\n{PATH_MARKER}%s\\n' \"$PATH\"");
        let mut cmd = Command::new(shell);
        cmd.args(["-l", "-c", &script])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(output)) => {
                warn!(shell, status = %output.status, "login shell exited unsuccessfully; using inherited PATH");
                return inherited;
            }
            Ok(Err(err)) => {
                warn!(shell, %err, "failed to run login shell; using inherited PATH");
                return inherited;
            }
            Err(_elapsed) => {
                warn!(shell, ?timeout, "login shell timed out; using inherited PATH");
                return inherited;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(login_path) = parse_marked_path(&stdout) else {
            warn!(shell, "login shell printed no PATH; using inherited PATH");
            return inherited;
        };

        let merged = merge_paths(OsStr::new(login_path), inherited.path());
        info!(shell, "captured login shell PATH");
        debug!(path = ?merged, "resolved command search path");
        Self { path: Some(merged) }
    }

    /// The resolved `PATH`, if any.
    #[must_use]
    pub fn path(&self) -> Option<&OsStr> {
        self.path.as_deref()
    }
}

/// Extract the value following [`PATH_MARKER`] from shell output.
fn parse_marked_path(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(PATH_MARKER))
        .filter(|path| !path.is_empty())
}

/// `primary` entries first, then any `secondary` entries not already present.
#[must_use]
pub fn merge_paths(primary: &OsStr, secondary: Option<&OsStr>) -> OsString {
    let mut entries: Vec<PathBuf> = env::split_paths(primary).collect();
    if let Some(secondary) = secondary {
        for entry in env::split_paths(secondary) {
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
    }
    env::join_paths(&entries).unwrap_or_else(|_| primary.to_os_string())
}

/// Fully resolved launch description for one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Absolute program path.
    pub program: PathBuf,
    /// Program arguments.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: PathBuf,
    /// Variables set on top of the inherited environment.
    pub env: Vec<(String, OsString)>,
}

impl CommandSpec {
    /// Build a `tokio` command with piped output and null stdin.
    ///
    /// On unix the child leads its own process group so that termination
    /// signals reach everything the package manager starts.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }
        cmd
    }

    /// Human-readable command line for logs.
    #[must_use]
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Builds run and install commands for a project.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    package_manager: String,
    install_args: Vec<String>,
    force_color: bool,
    shell_env: ShellEnvironment,
}

impl CommandBuilder {
    /// Create a builder from explicit parts.
    #[must_use]
    pub fn new(package_manager: impl Into<String>, shell_env: ShellEnvironment) -> Self {
        Self {
            package_manager: package_manager.into(),
            install_args: vec!["install".into()],
            force_color: true,
            shell_env,
        }
    }

    /// Create a builder from configuration and a captured environment.
    #[must_use]
    pub fn from_config(config: &GlobalConfig, shell_env: ShellEnvironment) -> Self {
        Self {
            package_manager: config.package_manager.clone(),
            install_args: config.install_args.clone(),
            force_color: config.force_color,
            shell_env,
        }
    }

    /// Override the install arguments.
    #[must_use]
    pub fn with_install_args(mut self, args: Vec<String>) -> Self {
        self.install_args = args;
        self
    }

    /// Enable or disable `FORCE_COLOR=1`.
    #[must_use]
    pub fn with_force_color(mut self, enabled: bool) -> Self {
        self.force_color = enabled;
        self
    }

    /// `<package_manager> run <script>` in `project_path`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the project directory does not exist or
    /// the package manager cannot be found on the resolved `PATH`.
    pub fn run_script(&self, project_path: &Path, script: &str) -> Result<CommandSpec> {
        self.build(project_path, vec!["run".into(), script.to_owned()])
    }

    /// `<package_manager> <install_args…>` in `project_path`.
    ///
    /// # Errors
    ///
    /// Same as [`CommandBuilder::run_script`].
    pub fn install(&self, project_path: &Path) -> Result<CommandSpec> {
        self.build(project_path, self.install_args.clone())
    }

    fn build(&self, project_path: &Path, args: Vec<String>) -> Result<CommandSpec> {
        if !project_path.is_dir() {
            return Err(AppError::Spawn(format!(
                "project directory {} does not exist",
                project_path.display()
            )));
        }

        let program = which::which_in(&self.package_manager, self.shell_env.path(), project_path)
            .map_err(|err| {
                AppError::Spawn(format!(
                    "cannot find '{}' on PATH: {err}",
                    self.package_manager
                ))
            })?;

        let mut env = Vec::new();
        if let Some(path) = self.shell_env.path() {
            env.push(("PATH".to_owned(), path.to_os_string()));
        }
        if self.force_color {
            env.push(("FORCE_COLOR".to_owned(), OsString::from("1")));
        }

        Ok(CommandSpec {
            program,
            args,
            cwd: project_path.to_path_buf(),
            env,
        })
    }
}
