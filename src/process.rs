use crate::command::Command;
use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::libc;
use nix::sys::signal::Signal;
use nix::sys::stat::Mode;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, close, dup2, fork, write};
use std::ffi::{CStr, CString, c_char};
use std::fmt;
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::{debug, warn};

const STDIN: RawFd = libc::STDIN_FILENO;
const STDOUT: RawFd = libc::STDOUT_FILENO;

/// A [`Command`] converted to what exec needs.
///
/// Everything is allocated here, before the fork: the child of a multi-threaded
/// process may only make async-signal-safe calls until it execs.
#[derive(Debug)]
pub struct PreparedCommand {
    arguments: Vec<CString>,
    /// Null-terminated pointers into `arguments`, as `execvp` takes them.
    argv: Vec<*const c_char>,
    input: Option<CString>,
    output: Option<CString>,
    background: bool,
}

impl PreparedCommand {
    pub fn new(command: &Command) -> Result<Self> {
        anyhow::ensure!(command.program().is_some(), "no program to run");

        let arguments = command
            .arguments()
            .iter()
            .map(|a| CString::new(a.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .context("argument")?;
        // The pointers target the strings' heap buffers, which stay put while `arguments`
        // is moved into `Self`.
        let argv = arguments
            .iter()
            .map(|a| a.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();
        let path = |p: Option<&Path>| {
            p.map(|p| CString::new(p.as_os_str().as_bytes()))
                .transpose()
                .context("redirection target")
        };

        Ok(Self {
            arguments,
            argv,
            input: path(command.input())?,
            output: path(command.output())?,
            background: command.is_background(),
        })
    }

    /// Whether the command was marked with `&`.
    pub fn is_background(&self) -> bool {
        self.background
    }
}

/// Fork a child that runs `command`; returns the child's pid in the parent.
pub fn spawn(command: &PreparedCommand) -> nix::Result<Pid> {
    // SAFETY: between fork and exec the child only calls open, dup2, close, write,
    // execvp and _exit on data allocated before the fork, `argv` included.
    match unsafe { fork() }? {
        ForkResult::Parent { child } => {
            debug!(pid = %child, background = command.background, "forked");
            Ok(child)
        }
        ForkResult::Child => run_child(command),
    }
}

/// The child side of [`spawn`]: redirect, exec, and on any failure report and exit 1.
fn run_child(command: &PreparedCommand) -> ! {
    let input = command
        .input
        .as_deref()
        .map(|path| redirect(path, OFlag::O_RDONLY, STDIN, "open input", "dup input"));
    let output = command.output.as_deref().map(|path| {
        redirect(
            path,
            OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
            STDOUT,
            "open output",
            "dup output",
        )
    });

    // SAFETY: `argv` is null-terminated and every entry points into a live `CString`.
    // execvp only returns on failure.
    unsafe { libc::execvp(command.argv[0], command.argv.as_ptr()) };
    report_raw("execvp", Errno::last());
    for fd in [input, output].into_iter().flatten() {
        let _ = close(fd);
    }
    exit_child()
}

/// Open `path` and install it as descriptor `target`, or end the child.
fn redirect(path: &CStr, flags: OFlag, target: RawFd, open_op: &str, dup_op: &str) -> RawFd {
    let fd = match open(path, flags, Mode::from_bits_truncate(0o666)) {
        Ok(fd) => fd,
        Err(errno) => {
            report_raw(open_op, errno);
            exit_child()
        }
    };
    if let Err(errno) = dup2(fd, target) {
        report_raw(dup_op, errno);
        exit_child()
    }
    fd
}

/// `operation: reason` on stderr without allocating.
fn report_raw(operation: &str, errno: Errno) {
    let stderr = std::io::stderr();
    let parts: [&[u8]; 4] = [operation.as_bytes(), b": ", errno.desc().as_bytes(), b"\n"];
    for part in parts {
        let _ = write(&stderr, part);
    }
}

fn exit_child() -> ! {
    // SAFETY: _exit is async-signal-safe and skips the parent's atexit handlers.
    unsafe { libc::_exit(1) }
}

/// How a child ended, as reported on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    Exited(i32),
    Signaled(Signal),
    Stopped(Signal),
    Gone,
}

impl From<WaitStatus> for ChildStatus {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Exited(_, code) => ChildStatus::Exited(code),
            WaitStatus::Signaled(_, signal, _) => ChildStatus::Signaled(signal),
            WaitStatus::Stopped(_, signal) => ChildStatus::Stopped(signal),
            _ => ChildStatus::Gone,
        }
    }
}

impl fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildStatus::Exited(code) => write!(f, "finished with return code: {code}"),
            ChildStatus::Signaled(signal) => {
                write!(f, "terminated with signal: {}", *signal as i32)
            }
            ChildStatus::Stopped(signal) => write!(f, "stopped with signal: {}", *signal as i32),
            ChildStatus::Gone => write!(f, "is no longer running"),
        }
    }
}

/// Print `[pid] status` on stderr.
pub fn report(pid: Pid, status: ChildStatus) {
    eprintln!("[{pid}] {status}");
}

/// Block until `pid` terminates.
///
/// `Ok(None)` means somebody else (the signal relay) already collected it.
pub fn wait_for(pid: Pid) -> nix::Result<Option<ChildStatus>> {
    loop {
        match waitpid(pid, None) {
            Ok(status) => return Ok(Some(status.into())),
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(None),
            Err(errno) => return Err(errno),
        }
    }
}

/// Collect one terminated or stopped child without blocking.
///
/// `None` when no child has anything to report, including when there are no
/// children at all.
pub fn reap_one() -> Option<(Pid, ChildStatus)> {
    let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED;
    match waitpid(Pid::from_raw(-1), Some(flags)) {
        Ok(WaitStatus::StillAlive) => None,
        Ok(status) => status.pid().map(|pid| (pid, status.into())),
        Err(Errno::ECHILD) => None,
        Err(errno) => {
            warn!("waitpid: {errno}");
            None
        }
    }
}
