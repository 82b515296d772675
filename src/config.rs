use argh::FromArgs;
use std::io::{self, IsTerminal};
use tracing::Level;

/// Prompt printed when `--prompt` is not given.
pub const DEFAULT_PROMPT: &str = "$";

#[derive(FromArgs, Debug, Clone, PartialEq, Eq)]
/// Interactive command interpreter.
/// Runs one program per line; `<file` and `>file` redirect its input and output,
/// a trailing `&` runs it in the background, and `exit` quits.
pub struct Options {
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// text printed before every line. Defaults to "$".
    pub prompt: String,

    #[argh(switch)]
    /// read plain lines from standard input even when it is a terminal.
    pub plain: bool,

    #[argh(switch, short = 'v')]
    /// log internal events (handoffs, forks, reaps) to standard error.
    pub verbose: bool,
}

impl Options {
    /// Whether lines should come from the interactive editor.
    pub fn use_editor(&self) -> bool {
        !self.plain && io::stdin().is_terminal()
    }

    pub fn log_level(&self) -> Level {
        if self.verbose { Level::DEBUG } else { Level::WARN }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            plain: false,
            verbose: false,
        }
    }
}
