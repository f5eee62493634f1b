use crate::evaluator::{EvalError, EvalResult};
use crate::lexer::{Token, TokenKind};
use crate::types::{Value, format_number};

// Extracts two numbers from the operands or returns the numeric type error
macro_rules! expect_numbers {
    ($left:expr, $right:expr, $operator:expr) => {
        match ($left, $right) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            _ => return Err(EvalError::OperandsMustBeNumbers($operator.clone())),
        }
    };
}

// Numeric operator producing a number
macro_rules! arithmetic {
    ($left:expr, $right:expr, $operator:expr, |$a:ident, $b:ident| $body:expr) => {{
        let ($a, $b) = expect_numbers!($left, $right, $operator);
        Ok(Value::Number($body))
    }};
}

// Numeric operator producing a boolean
macro_rules! comparison {
    ($left:expr, $right:expr, $operator:expr, $op:tt) => {{
        let (a, b) = expect_numbers!($left, $right, $operator);
        Ok(Value::Boolean(a $op b))
    }};
}

/// Applies a binary (non short-circuit) operator to two evaluated operands.
pub fn binary(operator: &Token, left: &Value, right: &Value) -> EvalResult {
    match operator.kind {
        TokenKind::Plus => add(operator, left, right),
        TokenKind::Minus => arithmetic!(left, right, operator, |a, b| a - b),
        TokenKind::Star => arithmetic!(left, right, operator, |a, b| a * b),
        TokenKind::Slash => {
            let (a, b) = expect_numbers!(left, right, operator);
            if b == 0.0 {
                return Err(EvalError::DivisionByZero(operator.clone()));
            }
            Ok(Value::Number(a / b))
        }
        TokenKind::Percent => arithmetic!(left, right, operator, |a, b| a % b),
        TokenKind::Power => arithmetic!(left, right, operator, |a, b| a.powf(b)),
        TokenKind::Greater => comparison!(left, right, operator, >),
        TokenKind::GreaterEqual => comparison!(left, right, operator, >=),
        TokenKind::Less => comparison!(left, right, operator, <),
        TokenKind::LessEqual => comparison!(left, right, operator, <=),
        TokenKind::EqualEqual => Ok(Value::Boolean(left == right)),
        TokenKind::BangEqual => Ok(Value::Boolean(left != right)),
        _ => Err(EvalError::UnsupportedOperator(operator.clone())),
    }
}

// `+` also concatenates, stringifying a number paired with a string.
fn add(operator: &Token, left: &Value, right: &Value) -> EvalResult {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::String(a), Value::Number(b)) => {
            Ok(Value::String(format!("{a}{}", format_number(*b))))
        }
        (Value::Number(a), Value::String(b)) => {
            Ok(Value::String(format!("{}{b}", format_number(*a))))
        }
        _ => Err(EvalError::OperandsMustBeNumbersOrStrings(operator.clone())),
    }
}

pub fn unary(operator: &Token, operand: &Value) -> EvalResult {
    match operator.kind {
        TokenKind::Minus => match operand {
            Value::Number(n) => Ok(Value::Number(-n)),
            _ => Err(EvalError::OperandMustBeNumber(operator.clone())),
        },
        TokenKind::Bang => Ok(Value::Boolean(!operand.is_truthy())),
        _ => Err(EvalError::UnsupportedOperator(operator.clone())),
    }
}
