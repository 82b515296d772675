//! Forwards interrupts to the foreground child and reaps children as they finish.
//!
//! The actual signal handlers come from `signal-hook` and only write to a self-pipe.
//! Everything else (looking up the foreground pid, `waitpid`, printing) happens on the
//! relay thread.

use crate::context::{Foreground, ShellContext};
use crate::process;
use anyhow::{Context, Result};
use nix::sys::signal::{Signal, kill};
use signal_hook::consts::signal::{SIGCHLD, SIGINT};
use signal_hook::iterator::{Handle, Signals};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

pub struct SignalRelay {
    handle: Handle,
    thread: JoinHandle<()>,
}

impl SignalRelay {
    /// Register for SIGINT and SIGCHLD and start the relay thread.
    ///
    /// From here on an interrupt no longer terminates the interpreter itself.
    pub fn install(context: Arc<ShellContext>) -> Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGCHLD]).context("installing signal handlers")?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("signal-relay".into())
            .spawn(move || {
                for signal in signals.forever() {
                    match signal {
                        SIGINT => {
                            forward_interrupt(context.foreground());
                        }
                        SIGCHLD => {
                            reap_finished();
                        }
                        other => debug!(signal = other, "ignoring signal"),
                    }
                }
                debug!("signal relay finished");
            })
            .context("spawning signal relay")?;

        Ok(Self { handle, thread })
    }

    /// Stop listening and wait for the relay thread.
    pub fn shutdown(self) {
        self.handle.close();
        if self.thread.join().is_err() {
            debug!("signal relay panicked");
        }
    }
}

/// Send SIGINT to the foreground child, if there is one.
///
/// Returns whether a signal was delivered.
pub fn forward_interrupt(foreground: &Foreground) -> bool {
    let Some(pid) = foreground.get() else {
        return false;
    };
    match kill(pid, Signal::SIGINT) {
        Ok(()) => {
            debug!(%pid, "forwarded interrupt");
            true
        }
        Err(errno) => {
            debug!(%pid, "can't forward interrupt: {errno}");
            false
        }
    }
}

/// Reap and report children until none has anything left to report.
///
/// Several exits can collapse into one SIGCHLD, so a single reap per notification
/// would leave zombies behind. Returns how many children were collected.
pub fn reap_finished() -> usize {
    let mut reaped = 0;
    while let Some((pid, status)) = process::reap_one() {
        process::report(pid, status);
        reaped += 1;
    }
    reaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::Pid;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Command;

    #[test]
    fn test_interrupt_reaches_foreground_child() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let foreground = Foreground::default();
        foreground.set(Pid::from_raw(child.id() as i32));

        assert!(forward_interrupt(&foreground));

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGINT as i32));
    }

    #[test]
    fn test_interrupt_without_foreground_is_noop() {
        assert!(!forward_interrupt(&Foreground::default()));
    }
}
