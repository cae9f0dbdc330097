#![forbid(unsafe_code)]

pub mod config;
pub mod desktop;
pub mod errors;
pub mod ipc;
pub mod manifest;
pub mod models;
pub mod session;
pub mod settings;
pub mod supervisor;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
