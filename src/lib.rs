//! A small batch-style command shell.
//!
//! Two pieces do most of the work. The variable [`Environment`](env::Environment)
//! substitutes `$NAME` and `${NAME}` references in every line and evaluates
//! integer arithmetic for `eval`. The scripted [`InputStream`](stream::InputStream)
//! hands out command lines, from scripts queued into it while there are any and
//! from the interactive console after that. It also handles echo markers,
//! labels for `goto` and the end markers of included scripts.
//!
//! The main entry point is [`Shell`], which reads lines through a
//! [`Session`](command::Session) and dispatches them to built-in commands. The
//! public modules [`command`] and [`console`] expose the traits for plugging in
//! your own commands and input sources.

pub mod arith;
mod builtin;
pub mod command;
pub mod console;
pub mod env;
pub mod error;
pub mod lexer;
mod shell;
pub mod stream;

pub use error::{Error, Result, Site};

/// Just a convenient re-export of the command shell.
///
/// See [`Shell`] for the high-level API and examples.
pub use shell::{ERRORLEVEL, Shell};
