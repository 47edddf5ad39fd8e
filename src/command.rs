use crate::console::Console;
use crate::env::Environment;
use crate::stream::{InputStream, ReadMode};
use std::env;
use std::io::Write;
use std::path::PathBuf;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// The shell stores the code of the last command in the `ERRORLEVEL` variable.
pub type ExitCode = i32;

/// Everything a running command may look at or change.
///
/// The environment and the input stream do not know about each other; a
/// command that needs both (e.g. a loop injecting lines that assign a
/// variable) goes through the session.
pub struct Session {
    /// Variables of the shell.
    pub env: Environment,
    /// Pending script lines.
    pub stream: InputStream,
    /// Interactive input, also used for echoing script lines.
    pub console: Box<dyn Console>,
    /// Where command output goes.
    pub stdout: Box<dyn Write>,
    /// The working directory for command execution.
    pub current_dir: PathBuf,
    /// Set when a command asks the shell to terminate.
    pub exit_request: Option<ExitCode>,
}

impl Session {
    /// A session over the given console and output, starting with the
    /// variables and working directory of the current process.
    pub fn new(console: Box<dyn Console>, stdout: Box<dyn Write>) -> Self {
        Self {
            env: Environment::from_process(),
            stream: InputStream::new(),
            console,
            stdout,
            current_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            exit_request: None,
        }
    }

    /// The prompt shown before each line: the `PROMPT` variable if set,
    /// otherwise the current directory followed by `>`.
    pub fn prompt(&self) -> String {
        match self.env.get("PROMPT") {
            "" => format!("{}>", self.current_dir.display()),
            prompt => prompt.to_owned(),
        }
    }

    /// Queue `script` to run next, followed by the stream footer so that the
    /// current echo state comes back once it is done.
    pub fn include(&mut self, script: &str) {
        let mut text = script.to_owned();
        self.stream.append_footer(&mut text);
        self.stream.write_text(&text);
    }

    /// Read the next line from the input stream with the session's console.
    pub fn read_line(&mut self, prompt: &str, mode: ReadMode) -> crate::Result<String> {
        self.stream.read(prompt, mode, self.console.as_mut())
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl.
pub trait ExecutableCommand {
    /// Executes the command.
    fn execute(self: Box<Self>, session: &mut Session) -> anyhow::Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}
