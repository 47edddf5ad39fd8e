use anyhow::{Context, anyhow};
use argh::FromArgs;
use liteshell::Shell;
use liteshell::command::Session;
use liteshell::console::{Console, Editor, NoInput, Piped};
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// A small batch-style command shell.
/// Without a script or command, lines are read from standard input.
struct Args {
    #[argh(option, short = 'c')]
    /// run this command line, then exit.
    command: Option<String>,

    #[argh(switch)]
    /// do not echo script lines.
    echo_off: bool,

    #[argh(positional)]
    /// script to run, then exit.
    script: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Args = argh::from_env();
    let batch = args.script.is_some() || args.command.is_some();

    let console: Box<dyn Console> = if batch {
        Box::new(NoInput::new(io::stdout()))
    } else if io::stdin().is_terminal() {
        Box::new(Editor::new().map_err(|e| anyhow!("cannot set up line editing: {e}"))?)
    } else {
        Box::new(Piped::new(io::stdin().lock(), io::stdout()))
    };

    let mut session = Session::new(console, Box::new(io::stdout()));
    session.stream.echo = !args.echo_off;
    let mut shell = Shell::with_builtins(session);

    // each include runs before what was queued earlier
    if let Some(command) = &args.command {
        shell.include(command);
    }
    if let Some(path) = &args.script {
        let script = fs::read_to_string(path)
            .with_context(|| format!("can't read {}", path.display()))?;
        shell.include(&script);
    }

    let code = shell.repl();
    io::stdout().flush()?;
    std::process::exit(code);
}
