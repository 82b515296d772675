//! A small interactive command interpreter built around two threads.
//!
//! A reader thread prompts for and reads one line at a time; an executor thread parses
//! it, forks, sets up `<`/`>` redirections and execs the program, waiting for it unless
//! the line ends in `&`. The line buffer moves between the two through a
//! [`rendezvous::Rendezvous`], so a new line is only read once the previous one has been
//! dealt with. A third thread relays SIGINT to the foreground child and reaps finished
//! children.
//!
//! The main entry point is [`Interpreter`]. The public modules [`parser`] and
//! [`command`] expose the line parser on its own.

pub mod command;
pub mod config;
mod context;
mod executor;
mod interpreter;
pub mod parser;
mod process;
mod reader;
pub mod rendezvous;
mod signals;

/// Convenient re-exports of the interpreter and its options.
///
/// See [`Interpreter`] for the high-level API.
pub use config::Options;
pub use interpreter::Interpreter;
