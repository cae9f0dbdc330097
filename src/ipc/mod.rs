//! Local IPC server for `script-commander-ctl` and UI front-ends.

pub mod server;
