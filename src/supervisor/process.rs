//! The script process supervisor.
//!
//! Spawns package-manager scripts, registers them, wires their output to
//! the broadcaster and deregisters them on exit. `run_script` and
//! `stop_script` never wait for a child; only `install_dependencies` does.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::models::event::{ExitEvent, ScriptEvent, StreamKind};
use crate::models::process::{ExitOutcome, InstallOutcome, ProcessInfo};
use crate::supervisor::broadcaster::{OutputBroadcaster, Subscription};
use crate::supervisor::command::{CommandBuilder, CommandSpec, ShellEnvironment};
use crate::supervisor::handle::{ExitWatch, ProcessHandle};
use crate::supervisor::reader::pump_output;
use crate::supervisor::registry::{ProcessRegistry, ScriptProcess};
use crate::{AppError, Result};

/// Identifier under which install output is streamed.
pub const INSTALL_IDENTIFIER: &str = "install";

/// How long readers may keep draining after the child has exited (a
/// detached grandchild can hold the pipes open indefinitely).
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// What the registry hands back from a successful spawn.
struct Spawned {
    child: Child,
    kill: CancellationToken,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
    watch: ExitWatch,
}

/// Orchestrates spawn, stop and shutdown against the registry.
#[derive(Debug)]
pub struct Supervisor {
    registry: Arc<ProcessRegistry>,
    broadcaster: Arc<OutputBroadcaster>,
    commands: CommandBuilder,
    stop_grace: Option<Duration>,
    drain_timeout: Duration,
    next_run: AtomicU64,
}

impl Supervisor {
    /// Create a supervisor with an empty registry and no escalation.
    #[must_use]
    pub fn new(commands: CommandBuilder) -> Self {
        Self {
            registry: Arc::new(ProcessRegistry::new()),
            broadcaster: Arc::new(OutputBroadcaster::new()),
            commands,
            stop_grace: None,
            drain_timeout: OUTPUT_DRAIN_TIMEOUT,
            next_run: AtomicU64::new(0),
        }
    }

    /// Create a supervisor from configuration and a captured environment.
    #[must_use]
    pub fn from_config(config: &GlobalConfig, shell_env: ShellEnvironment) -> Self {
        Self::new(CommandBuilder::from_config(config, shell_env)).with_stop_grace(config.stop_grace())
    }

    /// Force-kill stopped processes still alive after `grace`; `None`
    /// disables escalation.
    #[must_use]
    pub fn with_stop_grace(mut self, grace: Option<Duration>) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Override how long output may drain after a child exits.
    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// The process registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// The output broadcaster.
    #[must_use]
    pub fn broadcaster(&self) -> &Arc<OutputBroadcaster> {
        &self.broadcaster
    }

    /// Subscribe to output and exit events.
    pub async fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe().await
    }

    /// Start `script` in `project_path` and return without waiting for it.
    ///
    /// The returned [`ExitWatch`] may be ignored; it resolves after the
    /// run's exit event has been published.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AlreadyRunning` if `script` is registered (nothing
    /// is spawned), or `AppError::Spawn` if the command cannot be built or
    /// started.
    pub async fn run_script(&self, project_path: &Path, script: &str) -> Result<ExitWatch> {
        if self.registry.contains(script).await {
            return Err(AppError::AlreadyRunning(script.to_owned()));
        }

        let spec = self.commands.run_script(project_path, script)?;
        let run = self.next_run_id();

        let spawned = self
            .registry
            .register_with(script, || {
                let child = spawn_child(&spec)?;
                let kill = CancellationToken::new();
                let (exit_tx, exit_rx) = watch::channel(None);
                let handle = ProcessHandle::new(child.id(), kill.clone(), exit_rx);
                let watch = handle.exit_watch();
                let process = ScriptProcess::new(script, run, handle);
                Ok((
                    process,
                    Spawned {
                        child,
                        kill,
                        exit_tx,
                        watch,
                    },
                ))
            })
            .await?;

        info!(
            script,
            run,
            pid = spawned.child.id().unwrap_or(0),
            command = %spec.display(),
            cwd = %spec.cwd.display(),
            "script started"
        );

        let watch = spawned.watch.clone();
        self.monitor(script.to_owned(), run, spawned);
        Ok(watch)
    }

    /// Stop `script`: signal it and free its identifier immediately.
    ///
    /// Does not wait for the OS to reclaim the process and does not emit an
    /// exit event itself; the exit monitor emits the single exit event when
    /// the process is actually gone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotRunning` if `script` is not registered.
    pub async fn stop_script(&self, script: &str) -> Result<ExitWatch> {
        let Some(process) = self.registry.remove(script).await else {
            return Err(AppError::NotRunning(script.to_owned()));
        };

        process.handle().terminate();
        info!(
            script,
            run = process.run_id(),
            pid = process.handle().pid().unwrap_or(0),
            "termination requested"
        );

        let watch = process.handle().exit_watch();
        self.escalate(process);
        Ok(watch)
    }

    /// Sorted identifiers of all running scripts.
    pub async fn list_running(&self) -> Vec<String> {
        self.registry.list_identifiers().await.into_iter().collect()
    }

    /// Snapshot of a running script.
    pub async fn process_info(&self, script: &str) -> Option<ProcessInfo> {
        self.registry.get(script).await
    }

    /// Run the package manager's install command and wait for it.
    ///
    /// Output is streamed under [`INSTALL_IDENTIFIER`]. The installer is not
    /// registered and emits no exit event; concurrent installs are allowed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the installer cannot be started,
    /// including when the package manager is not on the captured `PATH`.
    /// That case is an error rather than `success: false`, and no output is
    /// streamed for it. A failing installer is reported through
    /// `InstallOutcome::success`.
    pub async fn install_dependencies(&self, project_path: &Path) -> Result<InstallOutcome> {
        let spec = self.commands.install(project_path)?;
        let run = self.next_run_id();
        let child = spawn_child(&spec)?;

        info!(
            run,
            pid = child.id().unwrap_or(0),
            command = %spec.display(),
            cwd = %spec.cwd.display(),
            "dependency install started"
        );

        let outcome = supervise(
            child,
            INSTALL_IDENTIFIER.to_owned(),
            run,
            CancellationToken::new(),
            Arc::clone(&self.broadcaster),
            self.drain_timeout,
        )
        .instrument(info_span!("install_dependencies", run))
        .await;

        info!(run, code = ?outcome.code, "dependency install finished");
        Ok(outcome.into())
    }

    /// Drain the registry and signal every process; does not wait.
    ///
    /// The returned watches let callers bound how long they wait for the
    /// children to actually exit.
    pub async fn shutdown(&self) -> Vec<ExitWatch> {
        let drained = self.registry.drain_all().await;
        info!(count = drained.len(), "terminating all running scripts");

        drained
            .into_iter()
            .map(|process| {
                process.handle().terminate();
                let watch = process.handle().exit_watch();
                self.escalate(process);
                watch
            })
            .collect()
    }

    fn next_run_id(&self) -> u64 {
        self.next_run.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Spawn the exit monitor for a registered run.
    fn monitor(&self, script: String, run: u64, spawned: Spawned) {
        let registry = Arc::clone(&self.registry);
        let broadcaster = Arc::clone(&self.broadcaster);
        let drain_timeout = self.drain_timeout;
        let span = info_span!("script", script = %script, run);

        tokio::spawn(
            async move {
                let Spawned {
                    child,
                    kill,
                    exit_tx,
                    ..
                } = spawned;

                let outcome = supervise(
                    child,
                    script.clone(),
                    run,
                    kill,
                    Arc::clone(&broadcaster),
                    drain_timeout,
                )
                .await;

                let deregistered = registry.remove_run(&script, run).await.is_some();
                broadcaster
                    .publish(ScriptEvent::ScriptExit(ExitEvent {
                        identifier: script.clone(),
                        run,
                        code: outcome.code,
                    }))
                    .await;
                exit_tx.send_replace(Some(outcome));

                info!(code = ?outcome.code, deregistered, "script exited");
            }
            .instrument(span),
        );
    }

    /// Force-kill `process` if it outlives the stop grace period.
    fn escalate(&self, process: ScriptProcess) {
        let Some(grace) = self.stop_grace else {
            return;
        };

        tokio::spawn(async move {
            let watch = process.handle().exit_watch();
            if tokio::time::timeout(grace, watch.wait()).await.is_err() {
                warn!(
                    script = process.identifier(),
                    run = process.run_id(),
                    ?grace,
                    "process ignored termination request, killing"
                );
                process.handle().force_kill();
            }
        });
    }
}

fn spawn_child(spec: &CommandSpec) -> Result<Child> {
    spec.to_command()
        .spawn()
        .map_err(|err| AppError::Spawn(format!("failed to spawn `{}`: {err}", spec.display())))
}

/// Pump both pipes, wait for exit, then let the pumps finish.
///
/// Every output event is published before this returns, which is what
/// lets the caller publish the exit event last.
async fn supervise(
    mut child: Child,
    identifier: String,
    run: u64,
    kill: CancellationToken,
    broadcaster: Arc<OutputBroadcaster>,
    drain_timeout: Duration,
) -> ExitOutcome {
    let stdout = child.stdout.take().map(|pipe| {
        tokio::spawn(pump_output(
            identifier.clone(),
            run,
            StreamKind::Stdout,
            pipe,
            Arc::clone(&broadcaster),
        ))
    });
    let stderr = child.stderr.take().map(|pipe| {
        tokio::spawn(pump_output(
            identifier.clone(),
            run,
            StreamKind::Stderr,
            pipe,
            Arc::clone(&broadcaster),
        ))
    });

    let status = tokio::select! {
        status = child.wait() => status,
        () = kill.cancelled() => {
            if let Err(err) = child.start_kill() {
                warn!(%err, "failed to kill child");
            }
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => status.code(),
        Err(err) => {
            warn!(%err, "error waiting for child process");
            None
        }
    };

    drain(stdout, drain_timeout).await;
    drain(stderr, drain_timeout).await;

    ExitOutcome { code }
}

/// Wait for a pump to reach EOF, abandoning it after `timeout`.
async fn drain(pump: Option<JoinHandle<usize>>, timeout: Duration) {
    let Some(mut pump) = pump else {
        return;
    };

    if tokio::time::timeout(timeout, &mut pump).await.is_err() {
        warn!(?timeout, "output pipe still open after exit, detaching reader");
        pump.abort();
        let _ = pump.await;
    }
}
