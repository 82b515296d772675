use crate::reader::LineBuffer;
use crate::rendezvous::Rendezvous;
use nix::unistd::Pid;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tracing::debug;

/// Process id of the child the executor is currently waiting on.
///
/// Written by the executor around every foreground wait and read by the signal relay
/// when an interrupt arrives. It is a plain atomic so the relay never waits on a lock
/// the input path also uses.
#[derive(Debug, Default)]
pub struct Foreground(AtomicI32);

impl Foreground {
    const NONE: i32 = 0;

    /// Record `pid` as the child being waited on.
    pub fn set(&self, pid: Pid) {
        self.0.store(pid.as_raw(), Ordering::SeqCst);
    }

    /// No foreground child anymore.
    pub fn clear(&self) {
        self.0.store(Self::NONE, Ordering::SeqCst);
    }

    /// The recorded pid, if any.
    pub fn get(&self) -> Option<Pid> {
        match self.0.load(Ordering::SeqCst) {
            pid if pid > 0 => Some(Pid::from_raw(pid)),
            _ => None,
        }
    }
}

/// State shared by the reader, the executor and the signal relay.
///
/// Built once at startup and handed to every actor behind an `Arc`:
/// - `running`: cleared exactly once, when the interpreter starts shutting down.
/// - `foreground`: see [`Foreground`].
/// - `handoff`: the line buffer travels from reader to executor and back through it.
#[derive(Debug)]
pub struct ShellContext {
    running: AtomicBool,
    foreground: Foreground,
    handoff: Rendezvous<LineBuffer>,
}

impl ShellContext {
    /// A running context with no foreground child and an empty handoff.
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            foreground: Foreground::default(),
            handoff: Rendezvous::new(),
        }
    }

    /// False once [`stop`](Self::stop) has been called.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop both actors: clear `running` and close the handoff so nobody stays blocked on it.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("interpreter stopping");
        }
        self.handoff.close();
    }

    pub fn foreground(&self) -> &Foreground {
        &self.foreground
    }

    pub fn handoff(&self) -> &Rendezvous<LineBuffer> {
        &self.handoff
    }
}

impl Default for ShellContext {
    fn default() -> Self {
        Self::new()
    }
}
