use std::collections::TryReserveError;
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Number of argument slots a fresh [`Command`] starts with.
///
/// When the slots run out the storage doubles, the way a hand-managed `argv` would.
pub const INITIAL_ARGUMENTS: usize = 10;

/// A parsed command line: program, arguments, redirections and disposition.
///
/// The executor keeps a single instance for the whole run and refills it on every
/// line, so the argument storage is only ever reallocated to grow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    arguments: Vec<OsString>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    background: bool,
}

impl Command {
    /// Create an empty command with [`INITIAL_ARGUMENTS`] argument slots.
    pub fn new() -> Self {
        Self {
            arguments: Vec::with_capacity(INITIAL_ARGUMENTS),
            input: None,
            output: None,
            background: false,
        }
    }

    /// Forget the previous line while keeping the argument storage.
    pub fn clear(&mut self) {
        self.arguments.clear();
        self.input = None;
        self.output = None;
        self.background = false;
    }

    /// Program name followed by its arguments.
    pub fn arguments(&self) -> &[OsString] {
        &self.arguments
    }

    /// The program to launch, `None` for a line without arguments.
    pub fn program(&self) -> Option<&OsStr> {
        self.arguments.first().map(OsString::as_os_str)
    }

    /// File that replaces standard input, if any.
    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    /// File that replaces standard output, if any.
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// True when the line asked not to wait for the process (`&`).
    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Number of argument slots currently allocated.
    pub fn capacity(&self) -> usize {
        self.arguments.capacity()
    }

    /// Append one argument, doubling the storage when it is full.
    ///
    /// Growth goes through `try_reserve_exact`, so running out of memory surfaces as
    /// an error instead of an abort.
    pub(crate) fn push_argument(&mut self, argument: &[u8]) -> Result<(), TryReserveError> {
        if self.arguments.len() == self.arguments.capacity() {
            let additional = self.arguments.capacity().max(1);
            self.arguments.try_reserve_exact(additional)?;
        }
        self.arguments.push(OsStr::from_bytes(argument).to_owned());
        Ok(())
    }

    pub(crate) fn set_input(&mut self, path: Option<PathBuf>) {
        self.input = path;
    }

    pub(crate) fn set_output(&mut self, path: Option<PathBuf>) {
        self.output = path;
    }

    pub(crate) fn set_background(&mut self, background: bool) {
        self.background = background;
    }
}

impl Default for Command {
    fn default() -> Self {
        Self::new()
    }
}
