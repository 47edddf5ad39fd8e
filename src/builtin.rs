use crate::arith;
use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Session};
use crate::shell::Factory;
use crate::stream::ReadMode;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`), which also
/// enforces how many arguments each one takes, and run in-process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "goto".
    fn name() -> &'static str;

    /// Executes the command against the session.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, session: &mut Session) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, session: &mut Session) -> Result<ExitCode> {
        match T::execute(*self, session) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(session.stdout, "{e:#}")?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, session: &mut Session) -> Result<ExitCode> {
        session.stdout.write_all(self.output.as_bytes())?;
        if !self.output.ends_with('\n') {
            writeln!(session.stdout)?;
        }
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name.eq_ignore_ascii_case(T::name()) {
            Some(match T::from_args(&[T::name()], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Write the arguments to standard output, separated by spaces.
/// By default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, session: &mut Session) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(session.stdout, "{}", s)?;
        } else {
            writeln!(session.stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show or assign shell variables.
/// Without arguments, every variable is listed. With only a name, that variable
/// is shown. Otherwise the remaining words, joined by spaces, become its value.
pub struct Set {
    #[argh(positional, greedy)]
    /// variable name followed by its new value.
    pub args: Vec<String>,
}

impl BuiltinCommand for Set {
    fn name() -> &'static str {
        "set"
    }

    fn execute(self, session: &mut Session) -> Result<ExitCode> {
        match self.args.split_first() {
            None => {
                let mut vars: Vec<_> = session.env.values().iter().collect();
                vars.sort();
                for (name, value) in vars {
                    writeln!(session.stdout, "{name}={value}")?;
                }
            }
            Some((name, [])) => {
                writeln!(session.stdout, "{name}={}", session.env.get(name))?;
            }
            Some((name, value)) => {
                session.env.set(name.as_str(), value.join(" "));
            }
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Evaluate an integer arithmetic expression.
/// Supports + - * / % with parentheses. Use `--` before an expression that
/// starts with a minus sign.
pub struct Eval {
    #[argh(positional)]
    /// the expression, e.g. "(1 + 2) * 3".
    pub expression: String,

    #[argh(option, short = 's')]
    /// store the result in this variable instead of printing it.
    pub set: Option<String>,
}

impl BuiltinCommand for Eval {
    fn name() -> &'static str {
        "eval"
    }

    fn execute(self, session: &mut Session) -> Result<ExitCode> {
        let value = session.env.evaluate(&self.expression)?;
        match self.set {
            Some(name) => {
                session.env.set(name, value.to_string());
            }
            None => writeln!(session.stdout, "{value}")?,
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Continue reading the script at a label.
/// A label is a line of the form ":name"; the leading colon may be omitted here.
pub struct Goto {
    #[argh(positional)]
    /// the label to jump to.
    pub label: String,
}

impl BuiltinCommand for Goto {
    fn name() -> &'static str {
        "goto"
    }

    fn execute(self, session: &mut Session) -> Result<ExitCode> {
        let label = if self.label.starts_with(':') {
            self.label
        } else {
            format!(":{}", self.label)
        };
        session.stream.jump(&label)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Run a script file, then continue after this command.
pub struct Call {
    #[argh(positional)]
    /// path to the script; relative paths start at the current directory.
    pub path: PathBuf,
}

impl BuiltinCommand for Call {
    fn name() -> &'static str {
        "call"
    }

    fn execute(self, session: &mut Session) -> Result<ExitCode> {
        let path = session.current_dir.join(&self.path);
        let script = fs::read_to_string(&path)
            .with_context(|| format!("call: can't read {}", path.display()))?;
        session.include(&script);
        Ok(0)
    }
}

/// How `for` produces its loop values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopKind {
    Range,
    Split,
}

impl FromStr for LoopKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "range" => Ok(LoopKind::Range),
            "split" => Ok(LoopKind::Split),
            _ => Err(format!("unknown loop type {s:?}, expected range/split")),
        }
    }
}

#[derive(FromArgs)]
/// Repeat the following lines, up to "endfor", once per loop value.
/// "for I 3 -t range" runs with I = 0, 1, 2; "for I 5 2 -t range" with
/// I = 5, 4, 3; "for W 'a b' -t split" with W = a, b.
pub struct For {
    #[argh(option, short = 't', long = "type")]
    /// the type of loop, must be one of range/split.
    pub kind: LoopKind,

    #[argh(positional)]
    /// name of the loop variable.
    pub var: String,

    #[argh(positional)]
    /// end of the range (its start if a second bound follows), or the words to split.
    pub first: String,

    #[argh(positional)]
    /// end of the range.
    pub second: Option<String>,
}

impl For {
    fn values(&self) -> Result<Vec<String>> {
        match (self.kind, &self.second) {
            (LoopKind::Range, second) => {
                let (start, end) = match second {
                    Some(end) => (arith::evaluate(&self.first)?, arith::evaluate(end)?),
                    None => (0, arith::evaluate(&self.first)?),
                };
                let values: Vec<i64> = if start <= end {
                    (start..end).collect()
                } else {
                    (end + 1..=start).rev().collect()
                };
                Ok(values.into_iter().map(|v| v.to_string()).collect())
            }
            (LoopKind::Split, None) => Ok(self
                .first
                .split_whitespace()
                .map(str::to_owned)
                .collect()),
            (LoopKind::Split, Some(_)) => Err(anyhow::anyhow!(
                "for: a split loop takes a single list of words"
            )),
        }
    }

    /// Collect the loop body, counting nested loops so that only the matching
    /// `endfor` ends it.
    fn read_body(session: &mut Session) -> Result<Vec<String>> {
        let mode = if session.stream.eof() {
            ReadMode::empty()
        } else {
            ReadMode::FORCE_STREAM
        };

        let mut lines = Vec::new();
        let mut depth = 1;
        loop {
            let line = session.read_line("for>", mode)?;
            let first = line.split_whitespace().next().unwrap_or_default();
            if first.eq_ignore_ascii_case("for") {
                depth += 1;
            } else if line.eq_ignore_ascii_case("endfor") {
                depth -= 1;
                if depth == 0 {
                    return Ok(lines);
                }
            }
            lines.push(line);
        }
    }
}

impl BuiltinCommand for For {
    fn name() -> &'static str {
        "for"
    }

    fn execute(self, session: &mut Session) -> Result<ExitCode> {
        let values = self.values()?;
        let body = Self::read_body(session)?;
        let assign = |value: &str| format!("set {} {}", self.var, quote_word(value));

        if body.is_empty() {
            if let Some(last) = values.last() {
                session.stream.write([assign(last)]);
            }
        } else {
            // each write lands in front of the previous one
            for value in values.iter().rev() {
                session.stream.write(body.iter().cloned());
                session.stream.write([assign(value)]);
            }
        }
        Ok(0)
    }
}

/// Write `value` so that, after variable resolution and word splitting, it
/// comes back as a single word equal to `value`.
///
/// The lexer has no escape character, so a `"` is closed off and put in single
/// quotes; the quoted parts join into one word.
fn quote_word(value: &str) -> String {
    let mut word = String::with_capacity(value.len() + 2);
    word.push('"');
    for c in value.chars() {
        match c {
            '"' => word.push_str(r#""'"'""#),
            '$' => word.push_str("$$"),
            c => word.push(c),
        }
    }
    word.push('"');
    word
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, session: &mut Session) -> Result<ExitCode> {
        writeln!(session.stdout, "{}", session.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, session: &mut Session) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match session.env.get("HOME") {
                "" => return Err(anyhow::anyhow!("cd: no target and HOME not set")),
                home => PathBuf::from(home),
            },
        };

        let new_dir = session.current_dir.join(target);
        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        session.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional, default = "0")]
    /// exit code of the shell.
    pub code: ExitCode,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, session: &mut Session) -> Result<ExitCode> {
        session.exit_request = Some(self.code);
        Ok(self.code)
    }
}
