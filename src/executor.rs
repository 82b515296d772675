//! The executing actor: parses each handed-over line and runs it.

use crate::command::Command;
use crate::context::ShellContext;
use crate::parser;
use crate::process::{self, PreparedCommand};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Takes lines from the handoff and runs them one at a time.
pub struct Executor {
    context: Arc<ShellContext>,
    command: Command,
}

impl Executor {
    /// An executor with empty argument storage, reused for every line.
    pub fn new(context: Arc<ShellContext>) -> Self {
        Self {
            context,
            command: Command::new(),
        }
    }

    /// Run lines until the handoff closes.
    ///
    /// Returns an error, after stopping the context, when the interpreter can't go on:
    /// fork failed or the argument vector could not grow.
    pub fn run(mut self) -> Result<()> {
        while self.context.is_running() {
            let Some(buffer) = self.context.handoff().take() else {
                break;
            };

            let result = self.execute_line(buffer.as_bytes());
            if result.is_err() {
                self.context.stop();
            }
            self.context.handoff().give_back(buffer);
            result?;
        }
        debug!("executor finished");
        Ok(())
    }

    fn execute_line(&mut self, line: &[u8]) -> Result<()> {
        match parser::parse_into(line, &mut self.command) {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e).context("parsing command line"),
            Err(e) => {
                eprintln!("{e}");
                return Ok(());
            }
        }

        let prepared = match PreparedCommand::new(&self.command) {
            Ok(prepared) => prepared,
            Err(e) => {
                eprintln!("Invalid input: {e:#}");
                return Ok(());
            }
        };

        let child = process::spawn(&prepared).context("fork")?;
        if prepared.is_background() {
            return Ok(());
        }

        let foreground = self.context.foreground();
        foreground.set(child);
        let waited = process::wait_for(child);
        foreground.clear();

        match waited {
            Ok(Some(status)) => process::report(child, status),
            Ok(None) => debug!(pid = %child, "already reaped by the signal relay"),
            Err(errno) => warn!(pid = %child, "waitpid: {errno}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::LineBuffer;
    use std::thread;
    use std::time::{Duration, Instant};

    struct Running {
        context: Arc<ShellContext>,
        executor: thread::JoinHandle<Result<()>>,
    }

    fn start() -> Running {
        let context = Arc::new(ShellContext::new());
        let executor = {
            let context = Arc::clone(&context);
            thread::spawn(move || Executor::new(context).run())
        };
        Running { context, executor }
    }

    impl Running {
        fn send(&self, line: &str) -> LineBuffer {
            let mut buffer = LineBuffer::new();
            buffer.set_line(line.as_bytes());
            self.context.handoff().hand_over(buffer).unwrap()
        }

        fn finish(self) {
            self.context.stop();
            self.executor.join().unwrap().unwrap();
        }
    }

    #[test]
    fn test_foreground_command_finishes_before_release() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        let running = start();

        running.send(&format!("touch {}", marker.display()));

        assert!(marker.exists());
        assert_eq!(running.context.foreground().get(), None);
        running.finish();
    }

    #[test]
    fn test_background_command_releases_immediately() {
        let running = start();

        let started = Instant::now();
        running.send("sleep 3 &");

        assert!(started.elapsed() < Duration::from_secs(2));
        running.finish();
    }

    #[test]
    fn test_rejected_line_still_releases_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let running = start();

        let buffer = running.send(&format!("> {}", out.display()));

        assert!(buffer.as_bytes().starts_with(b">"));
        assert!(!out.exists());
        // The executor is still there for the next line.
        running.send("true");
        running.finish();
    }

    #[test]
    fn test_closed_handoff_ends_executor() {
        let running = start();
        running.context.stop();
        running.executor.join().unwrap().unwrap();
    }
}
