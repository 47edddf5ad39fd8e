//! Errors raised by the scripting core.

use std::fmt;
use thiserror::Error;

/// Where an arithmetic expression turned out to be malformed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Site {
    /// A unary `+`/`-` had no operand to apply to.
    Unary,
    /// A binary operator had fewer than two operands available.
    Binary,
    /// A parenthesis had no matching counterpart.
    Bracket,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::Unary => f.write_str("unary operator"),
            Site::Binary => f.write_str("binary operator"),
            Site::Bracket => f.write_str("missing bracket"),
        }
    }
}

/// Every failure the variable environment and the input stream can report.
///
/// The shell prints these at the command boundary and carries on with the
/// next line; none of them is fatal to a session except [`Error::InputClosed`].
#[derive(Debug, Error)]
pub enum Error {
    /// Conflicting or otherwise unusable arguments were passed to an operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An arithmetic expression contained a character outside its alphabet.
    #[error("unrecognized symbol: {0:?}")]
    UnrecognizedSymbol(char),

    /// Division or remainder with a zero right-hand side.
    #[error("invalid expression - division by zero")]
    DivisionByZero,

    /// An arithmetic expression was structurally invalid.
    #[error("invalid expression at {0}")]
    InvalidExpression(Site),

    /// A read had to come from the script but the script had ended.
    #[error("unexpected EOF while reading")]
    UnexpectedEof,

    /// `jump` found no line equal to the label.
    #[error("label {0:?} not found")]
    LabelNotFound(String),

    /// A variable's value refers back to the variable itself.
    #[error("cyclic reference to variable {0:?}")]
    CyclicReference(String),

    /// The interactive source has no more input.
    #[error("end of interactive input")]
    InputClosed,
}

/// Result type of the scripting core.
pub type Result<T, E = Error> = std::result::Result<T, E>;
