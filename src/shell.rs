use crate::command::{CommandFactory, ExitCode, Session};
use crate::error::Error;
use crate::lexer;
use crate::stream::ReadMode;
use std::io::Write;
use tracing::{debug, warn};

/// Variable holding the exit code of the last command.
pub const ERRORLEVEL: &str = "ERRORLEVEL";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports the built-in commands of this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// A batch-style command shell.
///
/// The shell owns a [`Session`] and a list of [`CommandFactory`] objects that
/// are queried to create commands by name. Every line is read through the
/// session's input stream, has its variable references resolved, is split
/// into words and is then dispatched. See [`Shell::with_builtins`] for the
/// commands included out of the box.
///
/// Example
/// ```
/// use liteshell::console::{MemWriter, NoInput};
/// use liteshell::command::Session;
/// use liteshell::Shell;
///
/// let (stdout, output) = MemWriter::with_handle();
/// let session = Session::new(Box::new(NoInput::new(std::io::sink())), Box::new(stdout));
/// let mut sh = Shell::with_builtins(session);
/// sh.include("@OFF\nset NAME world\necho hello $NAME");
/// assert_eq!(sh.repl(), 0);
/// assert_eq!(output.contents(), "hello world\n");
/// ```
pub struct Shell {
    session: Session,
    commands: Vec<Box<dyn CommandFactory>>,
    last_code: ExitCode,
}

impl Shell {
    /// Create a new shell with a custom set of command factories.
    pub fn new(session: Session, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            session,
            commands,
            last_code: 0,
        }
    }

    /// Create a shell with the default set of commands:
    /// `echo`, `set`, `eval`, `goto`, `call`, `for`, `cd`, `pwd` and `exit`.
    pub fn with_builtins(session: Session) -> Self {
        use crate::builtin::*;
        Self::new(
            session,
            vec![
                Box::new(Factory::<Echo>::default()),
                Box::new(Factory::<Set>::default()),
                Box::new(Factory::<Eval>::default()),
                Box::new(Factory::<Goto>::default()),
                Box::new(Factory::<Call>::default()),
                Box::new(Factory::<For>::default()),
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<Pwd>::default()),
                Box::new(Factory::<Exit>::default()),
            ],
        )
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Queue a script so that its lines are read before anything else.
    pub fn include(&mut self, script: &str) {
        self.session.include(script);
    }

    /// Run a single command invocation by name with arguments.
    ///
    /// Returns the command's exit code or an error if no command goes by `name`.
    pub fn run(&mut self, name: &str, args: &[&str]) -> anyhow::Result<ExitCode> {
        debug!(name, ?args, "dispatch");
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(name, args) {
                return cmd.execute(&mut self.session);
            }
        }
        Err(anyhow::anyhow!("command not found: {}", name))
    }

    /// Resolve, split and run one command line, then record its exit code in
    /// the `ERRORLEVEL` variable. A failure counts as exit code 1.
    pub fn execute(&mut self, line: &str) -> anyhow::Result<ExitCode> {
        let result = self.execute_resolved(line);
        self.last_code = match &result {
            Ok(code) => *code,
            Err(_) => 1,
        };
        self.session
            .env
            .set(ERRORLEVEL, self.last_code.to_string());
        result
    }

    fn execute_resolved(&mut self, line: &str) -> anyhow::Result<ExitCode> {
        let resolved = self.session.env.resolve(line)?;
        let words = lexer::split_into_words(&resolved)?;
        let Some((name, args)) = words.split_first() else {
            return Ok(0);
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(name, &args)
    }

    /// Read and execute lines until a command asks to exit or the console
    /// runs out of input.
    ///
    /// Errors are printed and the loop carries on with the next line. Returns
    /// the code passed to `exit`, or else the code of the last command.
    pub fn repl(&mut self) -> ExitCode {
        loop {
            if let Some(code) = self.session.exit_request {
                debug!(code, "exit requested");
                return code;
            }

            let prompt = self.session.prompt();
            let line = match self.session.read_line(&prompt, ReadMode::empty()) {
                Ok(line) => line,
                Err(Error::InputClosed) => {
                    debug!(code = self.last_code, "input closed");
                    return self.last_code;
                }
                Err(e) => {
                    self.report(&anyhow::Error::new(e));
                    continue;
                }
            };

            if let Err(e) = self.execute(&line) {
                self.report(&e);
            }
        }
    }

    fn report(&mut self, e: &anyhow::Error) {
        if let Err(io) = writeln!(self.session.stdout, "{e:#}") {
            warn!(error = %io, "cannot report command failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{Console, MemWriter, NoInput, Piped};
    use crate::env::Environment;
    use crate::stream::InputStream;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn shell_over(console: impl Console + 'static, stdout: MemWriter) -> Shell {
        let mut env = Environment::default();
        env.set("PROMPT", "> ");
        Shell::with_builtins(Session {
            env,
            stream: InputStream::new(),
            console: Box::new(console),
            stdout: Box::new(stdout),
            current_dir: PathBuf::from("/"),
            exit_request: None,
        })
    }

    /// Shell that only runs included scripts.
    fn script_shell() -> (Shell, MemWriter) {
        let (stdout, output) = MemWriter::with_handle();
        (shell_over(NoInput::new(output.clone()), stdout), output)
    }

    /// Shell reading `input` from its console.
    fn interactive_shell(input: &str) -> (Shell, MemWriter) {
        let (stdout, output) = MemWriter::with_handle();
        let console = Piped::new(Cursor::new(input.as_bytes().to_vec()), output.clone());
        (shell_over(console, stdout), output)
    }

    #[test]
    fn test_run_by_name() {
        let (mut sh, output) = script_shell();
        assert_eq!(sh.run("echo", &["hello", "world"]).unwrap(), 0);
        assert_eq!(output.contents(), "hello world\n");

        let err = sh.run("frobnicate", &[]).unwrap_err();
        assert_eq!(err.to_string(), "command not found: frobnicate");
    }

    #[test]
    fn test_interactive_session() {
        let (mut sh, output) = interactive_shell("set X 5\n\neval \"$X * 2\" -s Y\necho $Y\n");

        assert_eq!(sh.repl(), 0);
        assert_eq!(output.contents(), "> > > > 10\n> ");
        assert_eq!(sh.session().env.get("Y"), "10");
    }

    #[test]
    fn test_script_lines_are_echoed_with_prompt() {
        let (mut sh, output) = script_shell();
        sh.include("goto skip\necho hidden\n:skip\necho shown");

        assert_eq!(sh.repl(), 0);
        assert_eq!(output.contents(), "> goto skip\n> echo shown\nshown\n");
        assert!(sh.session().stream.echo);
    }

    #[test]
    fn test_for_loop_in_script() {
        let (mut sh, output) = script_shell();
        sh.include("@OFF\nfor I 3 -t range\necho i=$I\nendfor\necho done");

        assert_eq!(sh.repl(), 0);
        assert_eq!(output.contents(), "i=0\ni=1\ni=2\ndone\n");
    }

    #[test]
    fn test_nested_for_loops() {
        let (mut sh, output) = script_shell();
        sh.include(
            "@OFF
            for W 'a b' -t split
            for N 2 -t range
            echo $W$N
            endfor
            endfor",
        );

        sh.repl();
        assert_eq!(output.contents(), "a0\na1\nb0\nb1\n");
    }

    #[test]
    fn test_for_split_values_with_quotes() {
        let (mut sh, output) = script_shell();
        sh.include(
            r#"@OFF
            for W 'a"b x"' -t split
            echo '[$W]'
            endfor
            for W "it's 'q'" -t split
            echo "[$W]"
            endfor"#,
        );

        assert_eq!(sh.repl(), 0);
        assert_eq!(output.contents(), "[a\"b]\n[x\"]\n[it's]\n['q']\n");
        assert_eq!(sh.session().env.get("W"), "'q'");
    }

    #[test]
    fn test_errors_do_not_stop_the_script() {
        let (mut sh, output) = script_shell();
        sh.include("@OFF\neval 1/0\nfrobnicate\necho $ERRORLEVEL\necho 'unfinished\necho still here");

        assert_eq!(sh.repl(), 0);
        assert_eq!(
            output.contents(),
            "invalid expression - division by zero\n\
             command not found: frobnicate\n\
             1\n\
             unfinished quote\n\
             still here\n"
        );
    }

    #[test]
    fn test_cyclic_variable_is_reported() {
        let (mut sh, output) = script_shell();
        sh.include("@OFF\nset A $$A\necho $A\necho ok");

        assert_eq!(sh.repl(), 0);
        assert_eq!(sh.session().env.get("A"), "$A");
        let output = output.contents();
        assert!(output.starts_with("cyclic reference to variable"), "{output}");
        assert!(output.ends_with("\nok\n"), "{output}");
    }

    #[test]
    fn test_escapes_and_case_insensitive_names() {
        let (mut sh, output) = script_shell();
        sh.include("@OFF\nEChO \"$$Hello World$$\"\nSET x 1\nset\n");

        sh.repl();
        assert_eq!(output.contents(), "$Hello World$\nERRORLEVEL=0\nPROMPT=> \nx=1\n");
    }

    #[test]
    fn test_exit_stops_with_code() {
        let (mut sh, output) = script_shell();
        sh.include("@OFF\nexit 7\necho never");

        assert_eq!(sh.repl(), 7);
        assert_eq!(output.contents(), "");
        assert_eq!(sh.session().env.get(ERRORLEVEL), "7");
    }

    #[test]
    fn test_last_code_is_returned() {
        let (mut sh, _) = script_shell();
        sh.include("@OFF\neval 1/0");
        assert_eq!(sh.repl(), 1);
    }

    #[test]
    fn test_goto_backwards() {
        let (mut sh, output) = script_shell();
        sh.include(
            "@OFF
            goto start
            :finish
            echo finished
            exit 4
            :start
            echo starting
            goto finish
            echo skipped",
        );

        assert_eq!(sh.repl(), 4);
        assert_eq!(output.contents(), "starting\nfinished\n");
    }

    #[test]
    fn test_missing_label_is_reported() {
        let (mut sh, output) = script_shell();
        sh.include("@OFF\ngoto nowhere\necho next");

        sh.repl();
        assert_eq!(output.contents(), "label \":nowhere\" not found\nnext\n");
    }
}
