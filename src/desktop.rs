//! Desktop integration: folder picker, browser and file-browser launching.
//!
//! All of these are fire-and-forget helpers around platform tools; none of
//! them report failure to the caller beyond a log line.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::process::Command;
use tracing::{debug, info, warn};

/// Interactive directory chooser.
pub trait FolderPicker: Send + Sync {
    /// Ask the user for a directory; `None` when cancelled or unavailable.
    fn pick_folder(&self) -> Pin<Box<dyn Future<Output = Option<PathBuf>> + Send + '_>>;
}

/// Picker backed by the platform's native dialog tool
/// (`osascript` on macOS, `zenity` elsewhere on unix).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFolderPicker;

impl FolderPicker for SystemFolderPicker {
    fn pick_folder(&self) -> Pin<Box<dyn Future<Output = Option<PathBuf>> + Send + '_>> {
        Box::pin(async {
            let mut cmd = if cfg!(target_os = "macos") {
                let mut cmd = Command::new("osascript");
                cmd.args(["-e", "POSIX path of (choose folder)"]);
                cmd
            } else if cfg!(unix) {
                let mut cmd = Command::new("zenity");
                cmd.args(["--file-selection", "--directory"]);
                cmd
            } else {
                warn!("no folder picker available on this platform");
                return None;
            };

            let output = match cmd.kill_on_drop(true).output().await {
                Ok(output) => output,
                Err(err) => {
                    warn!(%err, "folder picker unavailable");
                    return None;
                }
            };

            if !output.status.success() {
                debug!("folder selection cancelled");
                return None;
            }

            let chosen = String::from_utf8_lossy(&output.stdout).trim().to_owned();
            (!chosen.is_empty()).then(|| PathBuf::from(chosen))
        })
    }
}

/// Open `url` in the user's default browser without waiting.
pub fn open_url(url: &str) {
    let url = url.to_owned();
    tokio::task::spawn_blocking(move || match open::that(&url) {
        Ok(()) => info!(%url, "opened url"),
        Err(err) => warn!(%url, %err, "failed to open url"),
    });
}

/// Reveal `path` in the OS file browser without waiting.
pub fn reveal_in_file_browser(path: &Path) {
    let path = path.to_path_buf();
    tokio::spawn(async move {
        let result = if cfg!(target_os = "macos") {
            Command::new("open").arg("-R").arg(&path).status().await.map(|_| ())
        } else if cfg!(windows) {
            let mut select = std::ffi::OsString::from("/select,");
            select.push(&path);
            Command::new("explorer").arg(select).status().await.map(|_| ())
        } else {
            let target = if path.is_dir() {
                path.clone()
            } else {
                path.parent().map_or_else(|| path.clone(), Path::to_path_buf)
            };
            tokio::task::spawn_blocking(move || open::that(target))
                .await
                .unwrap_or_else(|err| Err(std::io::Error::other(err)))
        };

        match result {
            Ok(()) => info!(path = %path.display(), "revealed path in file browser"),
            Err(err) => warn!(path = %path.display(), %err, "failed to reveal path"),
        }
    });
}
