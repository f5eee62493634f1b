use crate::ast::{Expr, Literal, Stmt};
use crate::environment::{EnvError, Environment};
use crate::lexer::{Token, TokenKind};
use crate::primitives;
use crate::stack::ensure_sufficient_stack;
use crate::types::{Function, Value};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use thiserror::Error;

// --- Evaluation Error ---
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError),
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers(Token),
    #[error("Operands must be two numbers or two strings.")]
    OperandsMustBeNumbersOrStrings(Token),
    #[error("Operand must be a number.")]
    OperandMustBeNumber(Token),
    #[error("Unsupported operator '{}'.", .0.lexeme)]
    UnsupportedOperator(Token),
    #[error("Division by zero.")]
    DivisionByZero(Token),
    #[error("Can only call functions.")]
    NotCallable(Token),
    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch {
        token: Token,
        expected: usize,
        got: usize,
    },
    #[error("Can only index lists and strings.")]
    NotIndexable(Token),
    #[error("Index must be an integer.")]
    InvalidIndex(Token),
    #[error("Index out of range for '{}'.", .0.lexeme)]
    IndexOutOfRange(Token),
    #[error("Slice step must be positive.")]
    InvalidSliceStep(Token),
    #[error("Can only iterate over lists and strings.")]
    NotIterable(Token),
    #[error("Range bounds must be numbers.")]
    InvalidRangeBound(Token),
    #[error("Range step cannot be zero.")]
    ZeroRangeStep(Token),
    #[error("Maximum recursion depth exceeded.")]
    StackOverflow(Token),
    #[error("Could not write output: {message}")]
    Output { token: Token, message: String },
}

impl EvalError {
    /// The token the error is reported at.
    pub fn token(&self) -> &Token {
        match self {
            EvalError::EnvError(err) => err.token(),
            EvalError::OperandsMustBeNumbers(token)
            | EvalError::OperandsMustBeNumbersOrStrings(token)
            | EvalError::OperandMustBeNumber(token)
            | EvalError::UnsupportedOperator(token)
            | EvalError::DivisionByZero(token)
            | EvalError::NotCallable(token)
            | EvalError::NotIndexable(token)
            | EvalError::InvalidIndex(token)
            | EvalError::IndexOutOfRange(token)
            | EvalError::InvalidSliceStep(token)
            | EvalError::NotIterable(token)
            | EvalError::InvalidRangeBound(token)
            | EvalError::ZeroRangeStep(token)
            | EvalError::StackOverflow(token) => token,
            EvalError::ArityMismatch { token, .. } | EvalError::Output { token, .. } => token,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// How a statement finished: fell through, or hit a `return`.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// The default limit on nested function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// Walks statement trees, writing `print` output to `W`.
///
/// The global environment outlives each [`Interpreter::interpret`] call, so a REPL can
/// feed it one entry at a time.
pub struct Interpreter<W: Write> {
    globals: Rc<RefCell<Environment>>,
    output: W,
    depth: usize,
    max_call_depth: usize,
}

impl<W: Write> Interpreter<W> {
    pub fn new(output: W, max_call_depth: usize) -> Self {
        Interpreter {
            globals: Environment::new(),
            output,
            depth: 0,
            max_call_depth,
        }
    }

    pub fn globals(&self) -> Rc<RefCell<Environment>> {
        self.globals.clone()
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs top-level statements in order, stopping at the first runtime error.
    /// A `return` outside any function ends the run quietly.
    pub fn interpret(&mut self, statements: &[Stmt]) -> EvalResult<()> {
        let globals = self.globals.clone();
        self.depth = 0;
        for statement in statements {
            match self.execute(statement, &globals) {
                Ok(Flow::Normal) => {}
                Ok(Flow::Return(_)) => {
                    tracing::debug!("return at top level, stopping");
                    break;
                }
                Err(err) => {
                    tracing::warn!(line = err.token().line, "runtime error: {}", err);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Executes `statements` in `env`, handing back the first `return` it meets.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult<Flow> {
        for statement in statements {
            if let Flow::Return(value) = self.execute(statement, env)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    pub fn execute(&mut self, stmt: &Stmt, env: &Rc<RefCell<Environment>>) -> EvalResult<Flow> {
        ensure_sufficient_stack(|| self.execute_inner(stmt, env))
    }

    fn execute_inner(&mut self, stmt: &Stmt, env: &Rc<RefCell<Environment>>) -> EvalResult<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Print { keyword, value } => {
                let value = self.evaluate(value, env)?;
                writeln!(self.output, "{}", value)
                    .and_then(|()| self.output.flush())
                    .map_err(|e| EvalError::Output {
                        token: keyword.clone(),
                        message: e.to_string(),
                    })?;
                Ok(Flow::Normal)
            }
            Stmt::Assignment { name, initializer } => {
                let value = self.evaluate(initializer, env)?;
                env.borrow_mut().assign(&name.lexeme, value);
                Ok(Flow::Normal)
            }
            Stmt::Block(statements) => {
                let block_env = Environment::new_enclosed(env.clone());
                self.execute_block(statements, &block_env)
            }
            Stmt::If {
                branches,
                else_branch,
            } => {
                for (condition, body) in branches {
                    if self.evaluate(condition, env)?.is_truthy() {
                        return self.execute(body, env);
                    }
                }
                match else_branch {
                    Some(body) => self.execute(body, env),
                    None => Ok(Flow::Normal),
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition, env)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body, env)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                name,
                start,
                end,
                step,
                body,
            } => self.execute_range(name, start.as_ref(), end, step.as_ref(), body, env),
            Stmt::ForEach {
                name,
                iterable,
                body,
            } => {
                let items = match self.evaluate(iterable, env)? {
                    Value::List(items) => items.borrow().clone(),
                    Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                    _ => return Err(EvalError::NotIterable(name.clone())),
                };
                for item in items {
                    env.borrow_mut().assign(&name.lexeme, item);
                    if let Flow::Return(value) = self.execute(body, env)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(decl) => {
                let function = Value::Function(Rc::new(Function::new(decl.clone())));
                env.borrow_mut().assign(&decl.name.lexeme, function);
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
        }
    }

    fn execute_range(
        &mut self,
        name: &Token,
        start: Option<&Expr>,
        end: &Expr,
        step: Option<&Expr>,
        body: &Stmt,
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult<Flow> {
        let start = match start {
            Some(expr) => self.range_bound(expr, name, env)?,
            None => 0.0,
        };
        let end = self.range_bound(end, name, env)?;
        let step = match step {
            Some(expr) => self.range_bound(expr, name, env)?,
            None => 1.0,
        };
        if step == 0.0 {
            return Err(EvalError::ZeroRangeStep(name.clone()));
        }

        let mut i = start;
        while (step > 0.0 && i < end) || (step < 0.0 && i > end) {
            env.borrow_mut().assign(&name.lexeme, Value::Number(i));
            if let Flow::Return(value) = self.execute(body, env)? {
                return Ok(Flow::Return(value));
            }
            i += step;
        }
        Ok(Flow::Normal)
    }

    fn range_bound(
        &mut self,
        expr: &Expr,
        name: &Token,
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult<f64> {
        match self.evaluate(expr, env)? {
            Value::Number(n) => Ok(n),
            _ => Err(EvalError::InvalidRangeBound(name.clone())),
        }
    }

    /// Evaluates a given expression within the specified environment.
    pub fn evaluate(&mut self, expr: &Expr, env: &Rc<RefCell<Environment>>) -> EvalResult {
        ensure_sufficient_stack(|| self.evaluate_inner(expr, env))
    }

    fn evaluate_inner(&mut self, expr: &Expr, env: &Rc<RefCell<Environment>>) -> EvalResult {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::None => Value::None,
            }),
            Expr::Grouping(inner) => self.evaluate(inner, env),
            Expr::Variable(name) => Ok(env.borrow().get(name)?),
            Expr::Assignment { name, value } => {
                let value = self.evaluate(value, env)?;
                env.borrow_mut().assign(&name.lexeme, value.clone());
                Ok(value)
            }
            Expr::Unary { operator, operand } => {
                let operand = self.evaluate(operand, env)?;
                primitives::unary(operator, &operand)
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left, env)?;
                let right = self.evaluate(right, env)?;
                primitives::binary(operator, &left, &right)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left, env)?;
                // The deciding operand is the result, not a coerced boolean.
                let decided = match operator.kind {
                    TokenKind::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if decided {
                    Ok(left)
                } else {
                    self.evaluate(right, env)
                }
            }
            Expr::List(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate(element, env)?);
                }
                Ok(Value::list(items))
            }
            Expr::Index {
                name,
                start,
                end,
                step,
            } => self.index(name, start, end.as_deref(), step.as_deref(), env),
            Expr::Call { name, arguments } => self.call(name, arguments, env),
        }
    }

    fn call(
        &mut self,
        name: &Token,
        arguments: &[Expr],
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult {
        let function = match env.borrow().get(name)? {
            Value::Function(function) => function,
            _ => return Err(EvalError::NotCallable(name.clone())),
        };
        if arguments.len() != function.arity() {
            return Err(EvalError::ArityMismatch {
                token: name.clone(),
                expected: function.arity(),
                got: arguments.len(),
            });
        }

        // Arguments are evaluated in the caller's scope, left to right.
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.evaluate(argument, env)?);
        }

        self.check_recursion_limit(name)?;
        tracing::trace!(function = %function.name().lexeme, depth = self.depth, "call");

        // Bodies see their parameters and the globals, never the caller's locals.
        let frame = Environment::new_enclosed(self.globals.clone());
        for (param, value) in function.params().iter().zip(values) {
            frame.borrow_mut().define(&param.lexeme, value);
        }

        self.depth += 1;
        let flow = self.execute_block(function.body(), &frame);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::None),
        }
    }

    fn check_recursion_limit(&self, name: &Token) -> EvalResult<()> {
        if self.depth >= self.max_call_depth {
            return Err(EvalError::StackOverflow(name.clone()));
        }
        Ok(())
    }

    fn index(
        &mut self,
        name: &Token,
        start: &Expr,
        end: Option<&Expr>,
        step: Option<&Expr>,
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult {
        let target = env.borrow().get(name)?;
        let start = self.index_value(start, name, env)?;
        let end = match end {
            Some(expr) => Some(self.index_value(expr, name, env)?),
            None => None,
        };
        let step = match step {
            Some(expr) => Some(self.index_value(expr, name, env)?),
            None => None,
        };

        match target {
            Value::List(items) => {
                let items = items.borrow();
                match end {
                    None => Ok(items[element_position(items.len(), start, name)?].clone()),
                    Some(end) => {
                        let positions = slice_positions(items.len(), start, end, step, name)?;
                        Ok(Value::list(positions.map(|i| items[i].clone()).collect()))
                    }
                }
            }
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                match end {
                    None => Ok(Value::String(
                        chars[element_position(chars.len(), start, name)?].to_string(),
                    )),
                    Some(end) => {
                        let positions = slice_positions(chars.len(), start, end, step, name)?;
                        Ok(Value::String(positions.map(|i| chars[i]).collect()))
                    }
                }
            }
            _ => Err(EvalError::NotIndexable(name.clone())),
        }
    }

    fn index_value(
        &mut self,
        expr: &Expr,
        name: &Token,
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult<i64> {
        match self.evaluate(expr, env)? {
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(n as i64),
            _ => Err(EvalError::InvalidIndex(name.clone())),
        }
    }
}

// `start` must address an existing element.
fn element_position(len: usize, start: i64, name: &Token) -> EvalResult<usize> {
    match usize::try_from(start) {
        Ok(position) if position < len => Ok(position),
        _ => Err(EvalError::IndexOutOfRange(name.clone())),
    }
}

// `start` in [0, len), `end` in [0, len], step positive. A start past the end is empty.
fn slice_positions(
    len: usize,
    start: i64,
    end: i64,
    step: Option<i64>,
    name: &Token,
) -> EvalResult<std::iter::StepBy<std::ops::Range<usize>>> {
    let step = step.unwrap_or(1);
    if step <= 0 {
        return Err(EvalError::InvalidSliceStep(name.clone()));
    }
    let start = element_position(len, start, name)?;
    let end = match usize::try_from(end) {
        Ok(end) if end <= len => end,
        _ => return Err(EvalError::IndexOutOfRange(name.clone())),
    };
    Ok((start..end).step_by(step as usize))
}
