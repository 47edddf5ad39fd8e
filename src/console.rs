//! Interactive input sources for the [`InputStream`](crate::stream::InputStream).

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use tracing::debug;

/// Line-based interactive input plus the output that echoed script lines go to.
pub trait Console {
    /// Show `prompt` and read one line, without its line terminator.
    ///
    /// Returns `Ok(None)` once the source has no more input. An `Err` is a
    /// failed read that the caller may simply retry.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Print a line read from a script, preceded by `prompt`.
    fn echo_line(&mut self, prompt: &str, line: &str) -> io::Result<()>;
}

/// Terminal console with line editing and history, backed by [`rustyline`].
pub struct Editor {
    editor: DefaultEditor,
}

impl Editor {
    /// Set up line editing on the controlling terminal.
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl Console for Editor {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if let Err(e) = self.editor.add_history_entry(line.as_str()) {
                    debug!(error = %e, "cannot record history entry");
                }
                Ok(Some(line))
            }
            // Ctrl-C abandons the line being typed
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e.to_string())),
        }
    }

    fn echo_line(&mut self, prompt: &str, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{prompt}{line}")?;
        stdout.flush()
    }
}

/// Console over any reader and writer, for piped input, batch runs and tests.
///
/// The prompt and echoed lines are written to the writer.
pub struct Piped<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Piped<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: BufRead, W: Write> Console for Piped<R, W> {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.writer.write_all(prompt.as_bytes())?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(len);
        Ok(Some(line))
    }

    fn echo_line(&mut self, prompt: &str, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{prompt}{line}")?;
        self.writer.flush()
    }
}

/// Console without interactive input, for running a script and nothing else.
///
/// Every read reports the end of input; echoed lines go to the writer.
pub struct NoInput<W> {
    writer: W,
}

impl<W: Write> NoInput<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> Console for NoInput<W> {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        Ok(None)
    }

    fn echo_line(&mut self, prompt: &str, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{prompt}{line}")?;
        self.writer.flush()
    }
}

/// Memory-backed writer for capturing output.
///
/// Clones share the same buffer, so one clone can be handed out as a writer
/// while another is kept to inspect what was written.
#[derive(Clone, Debug, Default)]
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: create a writer and a handle to the same buffer.
    pub fn with_handle() -> (Self, Self) {
        let writer = MemWriter::new();
        let handle = writer.clone();
        (writer, handle)
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.borrow()).into_owned()
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_piped_reads_lines_and_writes_prompt() {
        let (writer, output) = MemWriter::with_handle();
        let mut console = Piped::new(Cursor::new(b"first\r\nsecond".to_vec()), writer);

        assert_eq!(console.read_line("$ ").unwrap().as_deref(), Some("first"));
        assert_eq!(console.read_line("").unwrap().as_deref(), Some("second"));
        assert_eq!(console.read_line("$ ").unwrap(), None);
        assert_eq!(output.contents(), "$ $ ");
    }

    #[test]
    fn test_piped_echo_line() {
        let (writer, output) = MemWriter::with_handle();
        let mut console = Piped::new(io::empty(), writer);

        console.echo_line("C:\\>", "echo hi").unwrap();
        assert_eq!(output.contents(), "C:\\>echo hi\n");
        assert_eq!(console.read_line("").unwrap(), None);
    }

    #[test]
    fn test_no_input_prints_no_prompt() {
        let (writer, output) = MemWriter::with_handle();
        let mut console = NoInput::new(writer);

        assert_eq!(console.read_line("$ ").unwrap(), None);
        console.echo_line("$ ", "pwd").unwrap();
        assert_eq!(output.contents(), "$ pwd\n");
    }
}
