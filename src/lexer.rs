//! Splitting a resolved command line into words.

use thiserror::Error;

/// Errors that can occur while splitting a command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unfinished quote")]
    UnfinishedQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    /// Walks the input once, collecting a word whenever a blank ends one.
    ///
    /// Quotes may appear anywhere inside a word and only group characters;
    /// `""` on its own yields an empty word.
    fn make_words(&mut self) -> Result<Vec<String>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_quote(ch, '\''),
                LexingState::ReadingDoubleQuote => self.handle_quote(ch, '"'),
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
                Err(LexingError::UnfinishedQuote)
            }
            LexingState::ReadingWord => {
                out.push(std::mem::take(&mut self.buffer));
                Ok(out)
            }
            LexingState::Start => Ok(out),
        }
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_start(&mut self, ch: char) {
        match ch {
            c if c.is_whitespace() => {}
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            c if c.is_whitespace() => {
                out.push(std::mem::take(&mut self.buffer));
                self.state = LexingState::Start;
            }
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            c => self.buffer.push(c),
        }
    }

    fn handle_quote(&mut self, ch: char, quote: char) {
        if ch == quote {
            self.state = LexingState::ReadingWord;
        } else {
            self.buffer.push(ch);
        }
    }
}

/// Split `line` into words on blanks, honouring single and double quotes.
pub fn split_into_words(line: &str) -> Result<Vec<String>, LexingError> {
    LexingFSM::new(line).make_words()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_blanks() {
        assert_eq!(
            split_into_words("  echo   hello\tworld ").unwrap(),
            ["echo", "hello", "world"]
        );
        assert!(split_into_words("   ").unwrap().is_empty());
    }

    #[test]
    fn test_quotes_group_words() {
        assert_eq!(
            split_into_words(r#"echo "in quotes" 'single  one' mi"x"ed"#).unwrap(),
            ["echo", "in quotes", "single  one", "mixed"]
        );
        assert_eq!(
            split_into_words(r#"set X """#).unwrap(),
            ["set", "X", ""]
        );
        assert_eq!(
            split_into_words(r#"echo "it's""#).unwrap(),
            ["echo", "it's"]
        );
    }

    #[test]
    fn test_unfinished_quote() {
        assert_eq!(
            split_into_words("echo \"oops"),
            Err(LexingError::UnfinishedQuote)
        );
        assert_eq!(
            split_into_words("echo 'oops"),
            Err(LexingError::UnfinishedQuote)
        );
    }
}
