//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// A run was requested for a script that is already registered.
    AlreadyRunning(String),
    /// A stop was requested for a script that is not registered.
    NotRunning(String),
    /// The project directory has no `package.json`.
    ManifestMissing,
    /// The project manifest exists but could not be read or parsed.
    ManifestParse(String),
    /// The child process could not be spawned.
    Spawn(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// IPC communication failure.
    Ipc(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning(name) => write!(f, "Script '{name}' is already running"),
            Self::NotRunning(name) => write!(f, "Script '{name}' is not running"),
            Self::ManifestMissing => write!(f, "No package.json found in this folder"),
            Self::ManifestParse(msg) => write!(f, "manifest: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
