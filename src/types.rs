use crate::ast::{FunctionDecl, Stmt};
use crate::lexer::Token;
use std::cell::RefCell;
use std::fmt; // For custom display formatting
use std::rc::Rc;

/// Shared, mutable list storage. Cloning a list value aliases the same storage.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// A runtime value produced by evaluating an expression.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    None,
    List(ListRef),
    Function(Rc<Function>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// None, False and the number 0 are falsy; everything else, empty strings and
    /// lists included, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(_) | Value::List(_) | Value::Function(_) => true,
        }
    }
}

// Structural equality; values of different kinds are never equal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::None, Value::None) => true,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Renders a number the way `print` shows it: integral values drop the `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::None => write!(f, "None"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Function(function) => write!(f, "{}", function),
        }
    }
}

/// A user-defined function, created each time its `def` statement runs.
#[derive(Debug)]
pub struct Function {
    decl: Rc<FunctionDecl>,
}

impl Function {
    pub fn new(decl: Rc<FunctionDecl>) -> Self {
        Function { decl }
    }

    pub fn name(&self) -> &Token {
        &self.decl.name
    }

    pub fn params(&self) -> &[Token] {
        &self.decl.params
    }

    pub fn body(&self) -> &[Stmt] {
        &self.decl.body
    }

    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name().lexeme)
    }
}
