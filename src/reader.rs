//! The reading actor: prompts, reads one line at a time and hands it to the executor.

use crate::context::ShellContext;
use anyhow::{Context, Result, anyhow};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, Read, StdinLock, Stdout, Write};
use std::sync::Arc;
use tracing::{debug, warn};

/// Size of the line buffer. A line has to fit with room to spare, so the longest
/// accepted line is one byte shorter, trailing newline included.
pub const LINE_CAPACITY: usize = 513;

/// The line that ends the interpreter.
pub const EXIT_KEYWORD: &[u8] = b"exit\n";

/// The buffer one input line is read into.
///
/// A single instance exists for the whole run; it moves to the executor and back
/// through the handoff instead of being shared.
#[derive(Debug)]
pub struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            bytes: Vec::with_capacity(LINE_CAPACITY),
        }
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Replace the contents with `line` plus a trailing newline.
    pub(crate) fn set_line(&mut self, line: &[u8]) {
        self.bytes.clear();
        self.bytes.extend_from_slice(line);
        self.bytes.push(b'\n');
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single read produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The buffer holds one complete line ending in `\n`.
    Line,
    /// The line did not fit; whatever was left of it has been discarded.
    Oversized,
    /// The user abandoned the line being edited (Ctrl-C at the prompt).
    Interrupted,
    /// No more input.
    Eof,
}

/// Where lines come from.
pub trait LineSource {
    /// Show `prompt` and read the next line into `buffer`.
    fn read_line(&mut self, prompt: &str, buffer: &mut LineBuffer) -> Result<ReadOutcome>;
}

/// Reads lines from any buffered stream, printing the prompt to `prompt_out`.
pub struct StreamSource<R, W> {
    input: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> StreamSource<R, W> {
    pub fn new(input: R, prompt_out: W) -> Self {
        Self { input, prompt_out }
    }
}

impl StreamSource<StdinLock<'static>, Stdout> {
    /// Standard input, with the prompt on standard output.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LineSource for StreamSource<R, W> {
    fn read_line(&mut self, prompt: &str, buffer: &mut LineBuffer) -> Result<ReadOutcome> {
        write!(self.prompt_out, "{prompt}").context("writing prompt")?;
        self.prompt_out.flush().context("writing prompt")?;

        buffer.clear();
        let read = (&mut self.input)
            .take(LINE_CAPACITY as u64)
            .read_until(b'\n', &mut buffer.bytes)
            .context("reading standard input")?;

        if read == 0 {
            return Ok(ReadOutcome::Eof);
        }
        if read >= LINE_CAPACITY {
            if buffer.bytes.last() != Some(&b'\n') {
                self.input
                    .skip_until(b'\n')
                    .context("discarding oversized line")?;
            }
            return Ok(ReadOutcome::Oversized);
        }
        // Last line of a file without a trailing newline.
        if buffer.bytes.last() != Some(&b'\n') {
            buffer.bytes.push(b'\n');
        }
        Ok(ReadOutcome::Line)
    }
}

/// Interactive line editing with in-memory history, used when stdin is a terminal.
pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| anyhow!("line editor: {e}"))?;
        Ok(Self { editor })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str, buffer: &mut LineBuffer) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if line.len() + 1 >= LINE_CAPACITY {
                    return Ok(ReadOutcome::Oversized);
                }
                if !line.trim().is_empty() {
                    if let Err(e) = self.editor.add_history_entry(line.as_str()) {
                        warn!("can't record history: {e}");
                    }
                }
                buffer.set_line(line.as_bytes());
                Ok(ReadOutcome::Line)
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(e) => Err(anyhow!("reading line: {e}")),
        }
    }
}

/// How the reader treats a complete line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Exit,
    Blank,
    Command,
}

pub fn classify(line: &[u8]) -> LineKind {
    if line == EXIT_KEYWORD {
        LineKind::Exit
    } else if line.first() == Some(&b'\n') {
        LineKind::Blank
    } else {
        LineKind::Command
    }
}

/// The reading actor.
pub struct Reader<S> {
    source: S,
    prompt: String,
    context: Arc<ShellContext>,
}

impl<S: LineSource> Reader<S> {
    pub fn new(source: S, prompt: impl Into<String>, context: Arc<ShellContext>) -> Self {
        Self {
            source,
            prompt: prompt.into(),
            context,
        }
    }

    /// Read lines until `exit`, end of input, or the executor shuts the handoff.
    ///
    /// Whatever ends the loop, the context is stopped on the way out so the executor
    /// never waits for a line that will not come.
    pub fn run(mut self) -> Result<()> {
        let result = self.read_loop();
        self.context.stop();
        result
    }

    fn read_loop(&mut self) -> Result<()> {
        let mut buffer = LineBuffer::new();

        while self.context.is_running() {
            match self.source.read_line(&self.prompt, &mut buffer)? {
                ReadOutcome::Line => {}
                ReadOutcome::Oversized => {
                    eprintln!("Input too long");
                    continue;
                }
                ReadOutcome::Interrupted => continue,
                ReadOutcome::Eof => {
                    debug!("end of input");
                    break;
                }
            }

            match classify(buffer.as_bytes()) {
                LineKind::Exit => break,
                LineKind::Blank => continue,
                LineKind::Command => {}
            }

            buffer = match self.context.handoff().hand_over(buffer) {
                Ok(buffer) => buffer,
                Err(closed) => {
                    debug!("executor went away: {closed}");
                    break;
                }
            };
        }
        Ok(())
    }
}
