//! Integer arithmetic for `eval` and loop bounds.
//!
//! Expressions use signed 64-bit integers with `+ - * / %`, unary `+`/`-`
//! and parentheses. Evaluation is a two-stack (operands and operators)
//! shunting-yard pass over the input. Arithmetic wraps on overflow.

use crate::env::Environment;
use crate::error::{Error, Result, Site};
use tracing::trace;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Operator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Remainder,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Plus),
            '-' => Some(Operator::Minus),
            '*' => Some(Operator::Multiply),
            '/' => Some(Operator::Divide),
            '%' => Some(Operator::Remainder),
            _ => None,
        }
    }
}

/// Entry of the operator stack.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Pending {
    Unary(Operator),
    Binary(Operator),
    OpenBracket,
}

impl Pending {
    fn priority(self) -> i32 {
        match self {
            Pending::Unary(_) => 3,
            Pending::Binary(Operator::Multiply | Operator::Divide | Operator::Remainder) => 2,
            Pending::Binary(Operator::Plus | Operator::Minus) => 1,
            Pending::OpenBracket => -1,
        }
    }

    fn apply(self, operands: &mut Vec<i64>) -> Result<()> {
        match self {
            Pending::Unary(op) => {
                let value = operands.pop().ok_or(Error::InvalidExpression(Site::Unary))?;
                operands.push(match op {
                    Operator::Minus => value.wrapping_neg(),
                    _ => value,
                });
            }
            Pending::Binary(op) => {
                let r = operands.pop().ok_or(Error::InvalidExpression(Site::Binary))?;
                let l = operands.pop().ok_or(Error::InvalidExpression(Site::Binary))?;
                operands.push(match op {
                    Operator::Plus => l.wrapping_add(r),
                    Operator::Minus => l.wrapping_sub(r),
                    Operator::Multiply => l.wrapping_mul(r),
                    Operator::Divide if r == 0 => return Err(Error::DivisionByZero),
                    Operator::Divide => l.wrapping_div(r),
                    Operator::Remainder if r == 0 => return Err(Error::DivisionByZero),
                    Operator::Remainder => l.wrapping_rem(r),
                });
            }
            Pending::OpenBracket => return Err(Error::InvalidExpression(Site::Bracket)),
        }
        Ok(())
    }
}

fn is_symbol(c: char) -> bool {
    c.is_ascii_digit() || c == ' ' || "+-*/%()".contains(c)
}

/// Evaluate an arithmetic expression.
///
/// An expression consisting only of spaces evaluates to 0.
///
/// ```
/// use liteshell::arith::evaluate;
///
/// assert_eq!(evaluate("2+3*4").unwrap(), 14);
/// assert_eq!(evaluate("-(7 % 4)").unwrap(), -3);
/// ```
pub fn evaluate(expression: &str) -> Result<i64> {
    if let Some(c) = expression.chars().find(|&c| !is_symbol(c)) {
        return Err(Error::UnrecognizedSymbol(c));
    }

    let mut operands: Vec<i64> = Vec::new();
    let mut operators: Vec<Pending> = Vec::new();
    let mut may_be_unary = true;
    let mut chars = expression.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' => {}
            '(' => {
                operators.push(Pending::OpenBracket);
                may_be_unary = true;
            }
            ')' => {
                loop {
                    match operators.pop() {
                        Some(Pending::OpenBracket) => break,
                        Some(pending) => pending.apply(&mut operands)?,
                        None => return Err(Error::InvalidExpression(Site::Bracket)),
                    }
                }
                may_be_unary = false;
            }
            '0'..='9' => {
                let mut number = i64::from(c as u8 - b'0');
                while let Some(digit) = chars.peek().and_then(|d| d.to_digit(10)) {
                    number = number.wrapping_mul(10).wrapping_add(i64::from(digit));
                    chars.next();
                }
                operands.push(number);
                may_be_unary = false;
            }
            _ => {
                let Some(op) = Operator::from_char(c) else {
                    return Err(Error::UnrecognizedSymbol(c));
                };
                let current = match op {
                    Operator::Plus | Operator::Minus if may_be_unary => Pending::Unary(op),
                    _ => Pending::Binary(op),
                };

                // A unary operator never forces anything off the stack: it binds
                // tighter than every binary operator and is right-associative.
                while let Some(&top) = operators.last() {
                    let pop = match current {
                        Pending::Unary(_) => top.priority() > current.priority(),
                        _ => top.priority() >= current.priority(),
                    };
                    if !pop {
                        break;
                    }
                    operators.pop();
                    top.apply(&mut operands)?;
                }
                operators.push(current);
                may_be_unary = true;
            }
        }
    }

    while let Some(pending) = operators.pop() {
        pending.apply(&mut operands)?;
    }

    trace!(expression, result = ?operands.last(), "evaluated expression");
    Ok(operands.last().copied().unwrap_or(0))
}

impl Environment {
    /// Evaluate an arithmetic expression. See [`evaluate`].
    pub fn evaluate(&self, expression: &str) -> Result<i64> {
        evaluate(expression)
    }
}
