//! Ownership of a spawned child's signalling capability and exit signal.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::models::process::ExitOutcome;

/// Awaitable confirmation that a process has actually exited.
///
/// Termination in this crate means "signal sent"; callers that need to
/// observe the OS reclaiming the process (tests, shutdown) wait on this.
#[derive(Debug, Clone)]
pub struct ExitWatch {
    rx: watch::Receiver<Option<ExitOutcome>>,
}

impl ExitWatch {
    pub(crate) fn new(rx: watch::Receiver<Option<ExitOutcome>>) -> Self {
        Self { rx }
    }

    /// Wait for the exit outcome.
    ///
    /// Returns `None` if the monitor went away without observing an exit.
    pub async fn wait(mut self) -> Option<ExitOutcome> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => *outcome,
            Err(_) => None,
        }
    }

    /// The outcome if the process has already exited.
    #[must_use]
    pub fn outcome(&self) -> Option<ExitOutcome> {
        *self.rx.borrow()
    }
}

/// Exclusive handle on a live child process.
///
/// The `tokio::process::Child` itself is owned by the exit monitor task;
/// this handle carries what is needed to signal it and observe its exit.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    kill: CancellationToken,
    exit: watch::Receiver<Option<ExitOutcome>>,
}

impl ProcessHandle {
    pub(crate) fn new(
        pid: Option<u32>,
        kill: CancellationToken,
        exit: watch::Receiver<Option<ExitOutcome>>,
    ) -> Self {
        Self { pid, kill, exit }
    }

    /// OS process id (also the process group id on unix).
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the monitor has observed the exit.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    /// Watch for the exit of this process.
    #[must_use]
    pub fn exit_watch(&self) -> ExitWatch {
        ExitWatch::new(self.exit.clone())
    }

    /// Request a graceful shutdown (SIGTERM to the process group on unix).
    ///
    /// Platforms without signals fall back to an immediate kill.
    pub fn terminate(&self) {
        if self.has_exited() {
            return;
        }

        #[cfg(unix)]
        {
            if self.signal(nix::sys::signal::Signal::SIGTERM) {
                return;
            }
        }

        self.kill.cancel();
    }

    /// Kill the process (SIGKILL to the process group on unix).
    pub fn force_kill(&self) {
        if self.has_exited() {
            return;
        }

        #[cfg(unix)]
        {
            if self.signal(nix::sys::signal::Signal::SIGKILL) {
                return;
            }
        }

        self.kill.cancel();
    }

    /// Signal the process group; `true` when the signal was delivered or the
    /// group is already gone.
    #[cfg(unix)]
    fn signal(&self, signal: nix::sys::signal::Signal) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;
        use tracing::{debug, warn};

        let Some(pid) = self.pid.and_then(|pid| i32::try_from(pid).ok()) else {
            return false;
        };

        match killpg(Pid::from_raw(pid), signal) {
            Ok(()) => true,
            Err(Errno::ESRCH) => {
                debug!(pid, ?signal, "process group already gone");
                true
            }
            Err(err) => {
                warn!(pid, ?signal, %err, "failed to signal process group");
                false
            }
        }
    }
}
