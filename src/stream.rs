//! The scripted input stream.
//!
//! The shell reads every command through an [`InputStream`]. While the stream
//! holds unread script lines those are returned; once it runs dry, reads fall
//! back to the interactive [`Console`]. Script inclusion injects a script's
//! lines at the read position so they run before whatever came next.
//!
//! A few line values are reserved:
//!
//! - `@ON` / `@OFF` turn echoing of script lines on or off, starting with the
//!   line that follows;
//! - `:EOF` marks the end of an included script and discards the lines read so
//!   far;
//! - any other line starting with `:` is a comment (and doubles as a label for
//!   [`InputStream::jump`]).

use crate::console::Console;
use crate::error::{Error, Result};
use bitflags::bitflags;
use tracing::{debug, warn};

/// Turns echoing on, starting with the next line.
pub const ECHO_ON: &str = "@ON";

/// Turns echoing off, starting with the next line.
pub const ECHO_OFF: &str = "@OFF";

/// Marks the end of an included script.
pub const STREAM_EOF: &str = ":EOF";

/// Lines starting with this character are comments.
pub const COMMENT_PREFIX: char = ':';

/// Consecutive console read failures after which the console counts as closed.
pub const MAX_READ_FAILURES: usize = 16;

bitflags! {
    /// How [`InputStream::read`] picks its source.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct ReadMode: u8 {
        /// The line must come from the script; running out is an error.
        const FORCE_STREAM = 1 << 0;
        /// The line must come from the console even if script lines remain.
        const FORCE_INTERACTIVE = 1 << 1;
        /// Show the prompt whatever the echo state is.
        const FORCE_PROMPT = 1 << 2;
    }
}

/// What a (trimmed) line means to the stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Line<'a> {
    Blank,
    EchoOn,
    EchoOff,
    Eof,
    Comment,
    Text(&'a str),
}

impl<'a> Line<'a> {
    fn classify(line: &'a str) -> Self {
        match line {
            "" => Line::Blank,
            ECHO_ON => Line::EchoOn,
            ECHO_OFF => Line::EchoOff,
            STREAM_EOF => Line::Eof,
            _ if line.starts_with(COMMENT_PREFIX) => Line::Comment,
            _ => Line::Text(line),
        }
    }
}

/// Pending script lines, a read position into them, and the echo state.
///
/// Lines before the cursor have been read already. They stay around so that
/// [`jump`](Self::jump) can go backwards, until [`clear`](Self::clear) drops
/// them.
#[derive(Debug, Clone)]
pub struct InputStream {
    lines: Vec<String>,
    cursor: usize,
    /// Whether script lines are printed (with the prompt) as they are read.
    pub echo: bool,
}

impl Default for InputStream {
    fn default() -> Self {
        Self::new()
    }
}

impl InputStream {
    /// An empty stream with echo on: every read goes to the console.
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            cursor: 0,
            echo: true,
        }
    }

    /// The next line that is neither blank nor a comment, without consuming
    /// anything. The end-of-stream marker counts as a line here.
    pub fn peek(&self) -> Option<&str> {
        self.lines[self.cursor..]
            .iter()
            .map(|line| line.trim())
            .find(|line| !matches!(Line::classify(line), Line::Blank | Line::Comment))
    }

    /// The echo state that applies once the next line is read: an echo marker
    /// about to be read wins over the current state.
    pub fn peek_echo(&self) -> bool {
        match self.peek() {
            Some(ECHO_ON) => true,
            Some(ECHO_OFF) => false,
            _ => self.echo,
        }
    }

    /// Read the next command line.
    ///
    /// Script lines are used while there are any, unless `mode` forces the
    /// console. Markers and comments are consumed along the way and never
    /// returned; so are blank lines. A script line is printed after `prompt`
    /// through the console when echo is on. The returned line is trimmed.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `mode` forces both sources;
    /// - [`Error::UnexpectedEof`] if `mode` forces the script and the script
    ///   has ended (or reaches `:EOF`);
    /// - [`Error::InputClosed`] if the console has no more input, or if
    ///   reading from it failed [`MAX_READ_FAILURES`] times in a row.
    ///
    /// Failing to echo a line is logged and otherwise ignored.
    pub fn read(
        &mut self,
        prompt: &str,
        mode: ReadMode,
        console: &mut dyn Console,
    ) -> Result<String> {
        debug!(
            ?mode,
            cursor = self.cursor,
            len = self.lines.len(),
            next = ?self.lines.get(self.cursor),
            "read request"
        );

        if mode.contains(ReadMode::FORCE_STREAM | ReadMode::FORCE_INTERACTIVE) {
            return Err(Error::InvalidArgument(
                "FORCE_STREAM and FORCE_INTERACTIVE conflict".to_owned(),
            ));
        }

        let mut skipped = 0usize;
        loop {
            if mode.contains(ReadMode::FORCE_STREAM) && self.eof() {
                return Err(Error::UnexpectedEof);
            }
            if mode.contains(ReadMode::FORCE_INTERACTIVE) || self.eof() {
                return self.read_interactive(prompt, mode, console);
            }

            let line = self.lines[self.cursor].trim().to_owned();
            self.cursor += 1;

            match Line::classify(&line) {
                Line::EchoOn => self.echo = true,
                Line::EchoOff => self.echo = false,
                Line::Eof => {
                    self.clear();
                    if mode.contains(ReadMode::FORCE_STREAM) {
                        return Err(Error::UnexpectedEof);
                    }
                }
                Line::Blank | Line::Comment => {}
                Line::Text(_) => {
                    // A text line is its own peek, so the echo state in effect
                    // is the current one.
                    if self.echo || mode.contains(ReadMode::FORCE_PROMPT) {
                        if let Err(e) = console.echo_line(prompt, &line) {
                            warn!(error = %e, %line, "cannot echo script line");
                        }
                    }
                    debug!(skipped, %line, "read from stream");
                    return Ok(line);
                }
            }
            skipped += 1;
        }
    }

    fn read_interactive(
        &mut self,
        prompt: &str,
        mode: ReadMode,
        console: &mut dyn Console,
    ) -> Result<String> {
        let mut failures = 0;
        loop {
            let show =
                mode.contains(ReadMode::FORCE_PROMPT) || (self.echo && self.peek_echo());
            let line = match console.read_line(if show { prompt } else { "" }) {
                Ok(Some(line)) => line,
                Ok(None) => return Err(Error::InputClosed),
                Err(e) => {
                    failures += 1;
                    if failures >= MAX_READ_FAILURES {
                        warn!(error = %e, failures, "giving up on interactive input");
                        return Err(Error::InputClosed);
                    }
                    debug!(error = %e, failures, "interactive read failed");
                    continue;
                }
            };
            failures = 0;

            match Line::classify(line.trim()) {
                Line::EchoOn => self.echo = true,
                Line::EchoOff => self.echo = false,
                Line::Eof => self.clear(),
                Line::Blank | Line::Comment => {}
                Line::Text(text) => {
                    debug!(line = text, "read from console");
                    return Ok(text.to_owned());
                }
            }
        }
    }

    /// Insert `lines` at the read position so that they are read next.
    pub fn write<I>(&mut self, lines: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let at = self.cursor;
        self.lines.splice(at..at, lines.into_iter().map(Into::into));
    }

    /// Split `text` into lines and [`write`](Self::write) the non-blank ones,
    /// trimmed.
    pub fn write_text(&mut self, text: &str) {
        self.write(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>(),
        );
    }

    /// Drop every line that has been read already.
    pub fn clear(&mut self) {
        debug!(consumed = self.cursor, "clearing input stream");
        self.lines.drain(..self.cursor);
        self.cursor = 0;
    }

    /// Whether all lines have been read.
    pub fn eof(&self) -> bool {
        self.cursor == self.lines.len()
    }

    /// Append to `buffer` the lines that close an included script: an
    /// end-of-stream marker, then the marker restoring the current echo state.
    pub fn append_footer(&self, buffer: &mut String) {
        buffer.push('\n');
        buffer.push_str(STREAM_EOF);
        buffer.push('\n');
        buffer.push_str(if self.echo { ECHO_ON } else { ECHO_OFF });
        buffer.push('\n');
    }

    /// Move the read position to the line equal to `label`.
    ///
    /// Lines from the read position onwards are searched first, then the lines
    /// already read, so both forward and backward jumps work. The label line
    /// itself is the next one read.
    pub fn jump(&mut self, label: &str) -> Result<()> {
        let found = self.lines[self.cursor..]
            .iter()
            .position(|line| line.trim() == label)
            .map(|i| self.cursor + i)
            .or_else(|| {
                self.lines[..self.cursor]
                    .iter()
                    .position(|line| line.trim() == label)
            });

        match found {
            Some(i) => {
                debug!(label, from = self.cursor, to = i, "jump");
                self.cursor = i;
                Ok(())
            }
            None => Err(Error::LabelNotFound(label.to_owned())),
        }
    }
}
