#![forbid(unsafe_code)]

//! `script-commander`: local script supervisor daemon.
//!
//! Loads configuration, captures the login-shell environment once, and
//! serves the session facade over the local IPC socket until SIGINT or
//! SIGTERM, at which point every running script is terminated.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use script_commander::config::GlobalConfig;
use script_commander::ipc::server::spawn_ipc_server;
use script_commander::session::Session;
use script_commander::supervisor::ShellEnvironment;
use script_commander::{AppError, Result};

/// Upper bound on waiting for children during shutdown when escalation is
/// disabled.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "script-commander", about = "Local package.json script supervisor", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the IPC socket name.
    #[arg(long)]
    ipc_name: Option<String>,

    /// Override the fallback project directory.
    #[arg(long)]
    project: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("script-commander bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(ref path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };

    if let Some(name) = args.ipc_name {
        config.ipc_name = name;
    }

    if let Some(project) = args.project {
        let canonical = project
            .canonicalize()
            .map_err(|err| AppError::Config(format!("invalid project override: {err}")))?;
        config.default_project_path = Some(canonical);
    }

    let config = Arc::new(config);
    info!(
        ipc_name = %config.ipc_name,
        package_manager = %config.package_manager,
        "configuration loaded"
    );

    // ── Resolve the login-shell environment ─────────────
    let shell_env = ShellEnvironment::capture(&config.login_shell, config.shell_env_timeout()).await;

    // ── Build the session and start IPC ─────────────────
    let session = Arc::new(Session::from_config(Arc::clone(&config), shell_env));

    let ct = CancellationToken::new();
    let ipc_handle = spawn_ipc_server(Arc::clone(&session), &config.ipc_name, ct.clone())?;
    info!("script-commander ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");

    // ── Terminate running scripts ───────────────────────
    // Subscribed connections stay open until the exit events are out.
    let bound = config
        .stop_grace()
        .map_or(SHUTDOWN_WAIT, |grace| grace + Duration::from_secs(1));
    session.shutdown_and_wait(bound).await;
    ct.cancel();

    // ── Wait for background tasks ───────────────────────
    if let Err(err) = ipc_handle.await {
        error!(%err, "ipc server task failed");
    }
    info!("script-commander shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
