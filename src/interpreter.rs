use crate::config::Options;
use crate::context::ShellContext;
use crate::executor::Executor;
use crate::reader::{EditorSource, Reader, StreamSource};
use crate::signals::SignalRelay;
use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// The interactive interpreter: a reader thread, an executor thread and a signal relay.
///
/// The reader prompts and reads lines, the executor parses and runs them, and the two
/// pass a single line buffer back and forth so that only one command is ever in
/// flight.
///
/// Example
/// ```no_run
/// use threaded_shell::{Interpreter, Options};
/// Interpreter::new(Options::default()).run().unwrap();
/// ```
pub struct Interpreter {
    options: Options,
    context: Arc<ShellContext>,
}

impl Interpreter {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            context: Arc::new(ShellContext::new()),
        }
    }

    /// Run until `exit` or end of input.
    ///
    /// Returns an error when either actor fails. If the executor fails while the reader
    /// is blocked reading the terminal, the reader is left behind; it goes away with
    /// the process.
    pub fn run(self) -> Result<()> {
        let relay = SignalRelay::install(Arc::clone(&self.context))?;

        let reader = {
            let context = Arc::clone(&self.context);
            let prompt = self.options.prompt.clone();
            let use_editor = self.options.use_editor();
            thread::Builder::new()
                .name("reader".into())
                .spawn(move || {
                    if use_editor {
                        match EditorSource::new() {
                            Ok(editor) => return Reader::new(editor, prompt, context).run(),
                            Err(e) => warn!("{e:#}; reading plain lines instead"),
                        }
                    }
                    Reader::new(StreamSource::stdio(), prompt, context).run()
                })
                .context("spawning reader")?
        };

        let executor = {
            let context = Arc::clone(&self.context);
            thread::Builder::new()
                .name("executor".into())
                .spawn(move || Executor::new(context).run())
                .context("spawning executor")?
        };

        let executed = executor
            .join()
            .map_err(|_| anyhow!("executor thread panicked"))?;
        if let Err(e) = executed {
            relay.shutdown();
            return Err(e);
        }

        let read = reader.join().map_err(|_| anyhow!("reader thread panicked"))?;
        relay.shutdown();
        debug!("interpreter finished");
        read
    }
}
