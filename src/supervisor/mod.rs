//! Script process supervision.
//!
//! Covers command construction, the process registry, output fan-out and
//! the supervisor that ties them together.

pub mod broadcaster;
pub mod command;
pub mod handle;
pub mod process;
pub mod reader;
pub mod registry;

pub use broadcaster::{OutputBroadcaster, Subscription};
pub use command::{CommandBuilder, CommandSpec, ShellEnvironment};
pub use handle::{ExitWatch, ProcessHandle};
pub use process::{Supervisor, INSTALL_IDENTIFIER};
pub use registry::{ProcessRegistry, ScriptProcess};
