//! Turns one raw input line into a [`Command`].
//!
//! The line has no quoting or escaping. Three bytes are special: `&` (run in the
//! background), `<` (read standard input from a file) and `>` (write standard output to
//! a file). Only the first occurrence of each is looked at, and the earliest of them
//! ends the part of the line that holds the program and its arguments.

use crate::command::Command;
use regex::bytes::Regex;
use std::collections::TryReserveError;
use std::ffi::OsStr;
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::sync::LazyLock;

/// A maximal run of bytes that are not C-locale whitespace (` \t\n\v\f\r`).
static ARGUMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)\S+").expect("argument pattern is valid"));

/// Whitespace after a redirection symbol, then the filename itself.
static FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)\A\s*(\S*)").expect("filename pattern is valid"));

/// Errors that can occur while turning a line into a [`Command`].
#[derive(Debug)]
pub enum ParsingError {
    /// Nothing is left to run once redirections and `&` are taken out of the line.
    NoArguments,
    /// The line contains a NUL byte, which can't be passed to exec.
    NulByte,
    /// The argument vector could not grow.
    OutOfMemory(TryReserveError),
}

impl ParsingError {
    /// Whether the interpreter can keep going after this error.
    ///
    /// Bad input only costs the current line; failing to allocate ends the executor.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ParsingError::OutOfMemory(_))
    }
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsingError::NoArguments => write!(f, "Invalid input"),
            ParsingError::NulByte => write!(f, "Invalid input: NUL byte in command line"),
            ParsingError::OutOfMemory(e) => write!(f, "argument vector: {e}"),
        }
    }
}

impl std::error::Error for ParsingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParsingError::OutOfMemory(e) => Some(e),
            _ => None,
        }
    }
}

/// Positions of the first `&`, `<` and `>` in a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Markers {
    pub background: Option<usize>,
    pub input: Option<usize>,
    pub output: Option<usize>,
}

impl Markers {
    /// Record where each special byte first occurs.
    pub fn scan(line: &[u8]) -> Self {
        let first = |symbol: u8| line.iter().position(|&b| b == symbol);
        Self {
            background: first(b'&'),
            input: first(b'<'),
            output: first(b'>'),
        }
    }

    fn positions(&self) -> impl Iterator<Item = usize> {
        [self.background, self.input, self.output].into_iter().flatten()
    }

    /// End of the argument region: the earliest marker, or the end of the line.
    pub fn arguments_end(&self, len: usize) -> usize {
        self.positions().min().unwrap_or(len)
    }

    /// The filename following the marker at `at`.
    ///
    /// The name starts after any whitespace and stops at the next whitespace byte or at
    /// another recorded marker. An empty name means there is no redirection.
    fn filename_after(&self, line: &[u8], at: usize) -> Option<PathBuf> {
        let from = at + 1;
        let name = FILENAME.captures(&line[from..])?.get(1)?;
        let start = from + name.start();
        let end = self
            .positions()
            .filter(|&p| p >= start && p < from + name.end())
            .min()
            .unwrap_or(from + name.end());

        (start < end).then(|| PathBuf::from(OsStr::from_bytes(&line[start..end])))
    }
}

/// Parses `line` into `command`, reusing its argument storage.
///
/// `line` is one input line, normally ending in `\n`. Everything the previous line
/// left in `command` is cleared first.
///
/// # Returns
///
/// * `Ok(())` when `command` holds at least one argument and may be launched.
/// * `Err(ParsingError)` otherwise; `command` is then in an unspecified but valid state.
pub fn parse_into(line: &[u8], command: &mut Command) -> Result<(), ParsingError> {
    command.clear();

    if line.contains(&0) {
        return Err(ParsingError::NulByte);
    }

    let markers = Markers::scan(line);
    command.set_background(markers.background.is_some());
    command.set_input(markers.input.and_then(|at| markers.filename_after(line, at)));
    command.set_output(markers.output.and_then(|at| markers.filename_after(line, at)));

    let region = &line[..markers.arguments_end(line.len())];
    for argument in ARGUMENT.find_iter(region) {
        command
            .push_argument(argument.as_bytes())
            .map_err(ParsingError::OutOfMemory)?;
    }

    if command.arguments().is_empty() {
        return Err(ParsingError::NoArguments);
    }
    Ok(())
}

/// Convenience wrapper around [`parse_into`] producing a fresh [`Command`].
pub fn parse(line: &[u8]) -> Result<Command, ParsingError> {
    let mut command = Command::new();
    parse_into(line, &mut command)?;
    Ok(command)
}
