use crate::lexer::Token;
use std::fmt;
use std::rc::Rc;

/// Literal values that can appear directly in source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    /// Short-circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Unary {
        operator: Token,
        operand: Box<Expr>,
    },
    Grouping(Box<Expr>),
    Literal(Literal),
    Variable(Token),
    Assignment {
        name: Token,
        value: Box<Expr>,
    },
    List(Vec<Expr>),
    /// `name[start]` when `end` is absent, otherwise `name[start:end]` or `name[start:end:step]`.
    Index {
        name: Token,
        start: Box<Expr>,
        end: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call {
        name: Token,
        arguments: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression(Expr),
    Print {
        keyword: Token,
        value: Expr,
    },
    Assignment {
        name: Token,
        initializer: Expr,
    },
    Block(Vec<Stmt>),
    /// `if`/`elif` arms in source order, each body a [`Stmt::Block`].
    If {
        branches: Vec<(Expr, Stmt)>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    /// `for name in range(start?, end, step?)`.
    For {
        name: Token,
        start: Option<Expr>,
        end: Expr,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        name: Token,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Function(Rc<FunctionDecl>),
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
}

/// A `def` statement. Shared with every function value created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

// Parenthesized prefix rendering, used by the `--ast` dump.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "\"{}\"", s),
            Literal::Boolean(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Literal::None => write!(f, "None"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", operator.lexeme, left, right),
            Expr::Unary { operator, operand } => write!(f, "({} {})", operator.lexeme, operand),
            Expr::Grouping(inner) => write!(f, "(group {})", inner),
            Expr::Literal(literal) => write!(f, "{}", literal),
            Expr::Variable(name) => write!(f, "{}", name.lexeme),
            Expr::Assignment { name, value } => write!(f, "(= {} {})", name.lexeme, value),
            Expr::List(elements) => {
                write!(f, "(list")?;
                for element in elements {
                    write!(f, " {}", element)?;
                }
                write!(f, ")")
            }
            Expr::Index {
                name,
                start,
                end,
                step,
            } => {
                write!(f, "(index {} {}", name.lexeme, start)?;
                if let Some(end) = end {
                    write!(f, " {}", end)?;
                }
                if let Some(step) = step {
                    write!(f, " {}", step)?;
                }
                write!(f, ")")
            }
            Expr::Call { name, arguments } => {
                write!(f, "(call {}", name.lexeme)?;
                for argument in arguments {
                    write!(f, " {}", argument)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Stmt {
    /// Writes the statement tree, one statement per line, indented by nesting depth.
    pub fn write_tree(&self, f: &mut impl fmt::Write, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            Stmt::Expression(expr) => writeln!(f, "{pad}(expr {expr})"),
            Stmt::Print { value, .. } => writeln!(f, "{pad}(print {value})"),
            Stmt::Assignment { name, initializer } => {
                writeln!(f, "{pad}(assign {} {initializer})", name.lexeme)
            }
            Stmt::Block(statements) => {
                writeln!(f, "{pad}(block")?;
                for statement in statements {
                    statement.write_tree(f, depth + 1)?;
                }
                writeln!(f, "{pad})")
            }
            Stmt::If {
                branches,
                else_branch,
            } => {
                for (i, (condition, body)) in branches.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    writeln!(f, "{pad}({keyword} {condition}")?;
                    body.write_tree(f, depth + 1)?;
                    writeln!(f, "{pad})")?;
                }
                if let Some(body) = else_branch {
                    writeln!(f, "{pad}(else")?;
                    body.write_tree(f, depth + 1)?;
                    writeln!(f, "{pad})")?;
                }
                Ok(())
            }
            Stmt::While { condition, body } => {
                writeln!(f, "{pad}(while {condition}")?;
                body.write_tree(f, depth + 1)?;
                writeln!(f, "{pad})")
            }
            Stmt::For {
                name,
                start,
                end,
                step,
                body,
            } => {
                write!(f, "{pad}(for {} (range", name.lexeme)?;
                if let Some(start) = start {
                    write!(f, " {start}")?;
                }
                write!(f, " {end}")?;
                if let Some(step) = step {
                    write!(f, " {step}")?;
                }
                writeln!(f, ")")?;
                body.write_tree(f, depth + 1)?;
                writeln!(f, "{pad})")
            }
            Stmt::ForEach {
                name,
                iterable,
                body,
            } => {
                writeln!(f, "{pad}(for {} {iterable}", name.lexeme)?;
                body.write_tree(f, depth + 1)?;
                writeln!(f, "{pad})")
            }
            Stmt::Function(decl) => {
                let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
                writeln!(f, "{pad}(def {} ({})", decl.name.lexeme, params.join(" "))?;
                for statement in &decl.body {
                    statement.write_tree(f, depth + 1)?;
                }
                writeln!(f, "{pad})")
            }
            Stmt::Return { value, .. } => match value {
                Some(value) => writeln!(f, "{pad}(return {value})"),
                None => writeln!(f, "{pad}(return)"),
            },
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}

/// Renders a whole program as the `--ast` dump shows it.
pub fn print_program(statements: &[Stmt]) -> String {
    statements.iter().map(|s| s.to_string()).collect()
}
