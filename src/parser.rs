use crate::ast::{Expr, FunctionDecl, Literal, Stmt};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::lexer::{Token, TokenKind, scan};
use crate::source::Span;
use crate::stack::ensure_sufficient_stack;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{message}")]
    UnexpectedToken { found: Token, message: String },
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget(Token),
}

impl ParseError {
    /// The token the error is reported at.
    pub fn token(&self) -> &Token {
        match self {
            ParseError::UnexpectedToken { found, .. } => found,
            ParseError::InvalidAssignmentTarget(equals) => equals,
        }
    }
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

/// Recursive-descent parser over a token stream produced by [`scan`].
///
/// Errors never abort the parse: each one is recorded, the parser skips to a safe
/// statement boundary and carries on, so a single pass reports every independent error.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            let (line, end) = tokens.last().map_or((1, 0), |t| (t.line, t.span.end));
            tokens.push(Token::new(TokenKind::Eof, "", line, Span::point(end)));
        }
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    /// Parses the whole program, reporting every syntax error to `diagnostics`.
    pub fn parse(mut self, diagnostics: &mut Diagnostics) -> Vec<Stmt> {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            if self.is_at_end() {
                break;
            }
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        tracing::debug!(
            statements = statements.len(),
            errors = self.errors.len(),
            "parsed program"
        );
        for error in &self.errors {
            diagnostics.error_at(error.token(), error.to_string());
        }
        statements
    }

    // --- Token helpers ---

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_next_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.current + 1).map(|t| &t.kind)
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        !self.is_at_end() && &self.peek().kind == kind
    }

    // Consumes and returns the current token; at EOF the EOF token is returned and kept.
    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> Option<Token> {
        if kinds.iter().any(|kind| self.check(kind)) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> ParseResult<Token> {
        self.consume(TokenKind::Identifier, message)
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::UnexpectedToken {
            found: self.peek().clone(),
            message: message.to_string(),
        }
    }

    fn skip_newlines(&mut self) {
        while self.matches(&[TokenKind::Newline]).is_some() {}
    }

    /// Discards tokens up to the next statement boundary.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.tokens[self.current - 1].kind == TokenKind::Newline {
                return;
            }
            match self.peek().kind {
                TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Print
                | TokenKind::Identifier
                | TokenKind::Dedent => return,
                _ => {}
            }
            self.advance();
        }
    }

    // --- Statements ---

    fn declaration(&mut self) -> Option<Stmt> {
        match self.statement() {
            Ok(statement) => Some(statement),
            Err(error) => {
                tracing::trace!(line = error.token().line, "recovering from parse error");
                self.errors.push(error);
                self.synchronize();
                None
            }
        }
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        let kind = self.peek().kind.clone();
        match kind {
            TokenKind::If => {
                self.advance();
                self.if_statement()
            }
            TokenKind::While => {
                self.advance();
                self.while_statement()
            }
            TokenKind::For => {
                self.advance();
                self.for_statement()
            }
            TokenKind::Def => {
                self.advance();
                self.function_definition()
            }
            TokenKind::Return => {
                let keyword = self.advance();
                self.return_statement(keyword)
            }
            TokenKind::Print => {
                let keyword = self.advance();
                self.print_statement(keyword)
            }
            TokenKind::Indent => self.block(),
            TokenKind::Identifier if self.peek_next_kind() == Some(&TokenKind::Equal) => {
                self.assignment_statement()
            }
            _ => self.expression_statement(),
        }
    }

    // The `:` NEWLINE pair that introduces every block.
    fn block_header(&mut self, colon_message: &str, newline_message: &str) -> ParseResult<()> {
        self.consume(TokenKind::Colon, colon_message)?;
        self.consume(TokenKind::Newline, newline_message)?;
        Ok(())
    }

    fn block(&mut self) -> ParseResult<Stmt> {
        Ok(Stmt::Block(self.block_statements()?))
    }

    /// block → INDENT statement+ DEDENT
    fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        self.skip_newlines();
        self.consume(TokenKind::Indent, "Expect indentation to start block.")?;
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::Dedent) || self.is_at_end() {
                break;
            }
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        self.consume(TokenKind::Dedent, "Expect indentation to end block.")?;
        Ok(statements)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let mut branches = Vec::new();
        let condition = self.expression()?;
        self.block_header(
            "Expect ':' after 'if' condition.",
            "Expect newline after ':' in if statement.",
        )?;
        branches.push((condition, self.block()?));

        while self.matches(&[TokenKind::Elif]).is_some() {
            let condition = self.expression()?;
            self.block_header(
                "Expect ':' after 'elif' condition.",
                "Expect newline after ':' in elif statement.",
            )?;
            branches.push((condition, self.block()?));
        }

        let else_branch = if self.matches(&[TokenKind::Else]).is_some() {
            self.block_header(
                "Expect ':' after 'else'.",
                "Expect newline after ':' in else statement.",
            )?;
            Some(Box::new(self.block()?))
        } else {
            None
        };

        Ok(Stmt::If {
            branches,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let condition = self.expression()?;
        self.block_header(
            "Expect ':' after 'while' condition.",
            "Expect newline after ':' in while statement.",
        )?;
        let body = Box::new(self.block()?);
        Ok(Stmt::While { condition, body })
    }

    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let name = self.consume_identifier("Expect loop variable name after 'for'.")?;
        self.consume(TokenKind::In, "Expect 'in' after loop variable.")?;

        if self.matches(&[TokenKind::Range]).is_none() {
            let iterable = self.expression()?;
            self.block_header(
                "Expect ':' after for clause.",
                "Expect newline after ':' in for statement.",
            )?;
            let body = Box::new(self.block()?);
            return Ok(Stmt::ForEach {
                name,
                iterable,
                body,
            });
        }

        self.consume(TokenKind::LeftParen, "Expect '(' after 'range'.")?;
        // range(end) | range(start, end) | range(start, end, step)
        let mut start = None;
        let mut end = self.expression()?;
        let mut step = None;
        if self.matches(&[TokenKind::Comma]).is_some() {
            let second = self.expression()?;
            start = Some(std::mem::replace(&mut end, second));
            if self.matches(&[TokenKind::Comma]).is_some() {
                step = Some(self.expression()?);
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after range arguments.")?;
        self.block_header(
            "Expect ':' after for clause.",
            "Expect newline after ':' in for statement.",
        )?;
        let body = Box::new(self.block()?);
        Ok(Stmt::For {
            name,
            start,
            end,
            step,
            body,
        })
    }

    fn function_definition(&mut self) -> ParseResult<Stmt> {
        let name = self.consume_identifier("Expect function name.")?;
        self.consume(TokenKind::LeftParen, "Expect '(' after function name.")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.consume_identifier("Expect parameter name.")?);
                if self.matches(&[TokenKind::Comma]).is_none() {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.block_header(
            "Expect ':' after function signature.",
            "Expect newline after ':' in function definition.",
        )?;
        let body = self.block_statements()?;
        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body })))
    }

    fn return_statement(&mut self, keyword: Token) -> ParseResult<Stmt> {
        let value = if self.check(&TokenKind::Newline)
            || self.check(&TokenKind::Dedent)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.expression()?)
        };
        self.skip_newlines();
        Ok(Stmt::Return { keyword, value })
    }

    fn print_statement(&mut self, keyword: Token) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'print'.")?;
        let value = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after value.")?;
        self.skip_newlines();
        Ok(Stmt::Print { keyword, value })
    }

    fn assignment_statement(&mut self) -> ParseResult<Stmt> {
        let name = self.advance();
        self.consume(TokenKind::Equal, "Expect '=' after variable name.")?;
        let initializer = self.expression()?;
        self.skip_newlines();
        Ok(Stmt::Assignment { name, initializer })
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.skip_newlines();
        Ok(Stmt::Expression(expr))
    }

    // --- Expressions ---

    pub fn expression(&mut self) -> ParseResult<Expr> {
        ensure_sufficient_stack(|| self.assignment())
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.logic_or()?;

        if let Some(equals) = self.matches(&[TokenKind::Equal]) {
            // Right-associative: a = b = c
            let value = self.assignment()?;
            return match expr {
                Expr::Variable(name) => Ok(Expr::Assignment {
                    name,
                    value: Box::new(value),
                }),
                _ => Err(ParseError::InvalidAssignmentTarget(equals)),
            };
        }

        Ok(expr)
    }

    /// Parses a left-associative chain `operand (op operand)*`.
    fn left_associative(
        &mut self,
        operators: &[TokenKind],
        operand: fn(&mut Self) -> ParseResult<Expr>,
        logical: bool,
    ) -> ParseResult<Expr> {
        let mut expr = operand(self)?;
        while let Some(operator) = self.matches(operators) {
            let left = Box::new(expr);
            let right = Box::new(operand(self)?);
            expr = if logical {
                Expr::Logical {
                    left,
                    operator,
                    right,
                }
            } else {
                Expr::Binary {
                    left,
                    operator,
                    right,
                }
            };
        }
        Ok(expr)
    }

    fn logic_or(&mut self) -> ParseResult<Expr> {
        self.left_associative(&[TokenKind::Or], Self::logic_and, true)
    }

    fn logic_and(&mut self) -> ParseResult<Expr> {
        self.left_associative(&[TokenKind::And], Self::equality, true)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        self.left_associative(
            &[TokenKind::BangEqual, TokenKind::EqualEqual],
            Self::comparison,
            false,
        )
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.left_associative(
            &[
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
            ],
            Self::term,
            false,
        )
    }

    fn term(&mut self) -> ParseResult<Expr> {
        self.left_associative(&[TokenKind::Minus, TokenKind::Plus], Self::factor, false)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        self.left_associative(
            &[TokenKind::Slash, TokenKind::Star, TokenKind::Percent],
            Self::unary,
            false,
        )
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        ensure_sufficient_stack(|| {
            if let Some(operator) = self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
                let operand = self.unary()?;
                // -0 is folded to positive zero
                if operator.kind == TokenKind::Minus {
                    if let Expr::Literal(Literal::Number(n)) = &operand {
                        if *n == 0.0 {
                            return Ok(Expr::Literal(Literal::Number(0.0)));
                        }
                    }
                }
                return Ok(Expr::Unary {
                    operator,
                    operand: Box::new(operand),
                });
            }
            self.power()
        })
    }

    fn power(&mut self) -> ParseResult<Expr> {
        let expr = self.primary()?;
        if let Some(operator) = self.matches(&[TokenKind::Power]) {
            // Right-associative: 2 ** 3 ** 2 == 2 ** 9
            let right = ensure_sufficient_stack(|| self.power())?;
            return Ok(Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let kind = self.peek().kind.clone();
        match kind {
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            TokenKind::None => {
                self.advance();
                Ok(Expr::Literal(Literal::None))
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
                Ok(Expr::Grouping(Box::new(expr)))
            }
            TokenKind::LeftBracket => {
                self.advance();
                let elements = self.comma_separated(TokenKind::RightBracket)?;
                self.consume(TokenKind::RightBracket, "Expect ']' after list elements.")?;
                Ok(Expr::List(elements))
            }
            TokenKind::Identifier => {
                let name = self.advance();
                if self.matches(&[TokenKind::LeftBracket]).is_some() {
                    self.index(name)
                } else if self.matches(&[TokenKind::LeftParen]).is_some() {
                    let arguments = self.comma_separated(TokenKind::RightParen)?;
                    self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
                    Ok(Expr::Call { name, arguments })
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            _ => Err(self.error("Expect expression.")),
        }
    }

    // name[start] | name[start:end] | name[start:end:step]
    fn index(&mut self, name: Token) -> ParseResult<Expr> {
        let start = Box::new(self.expression()?);
        let mut end = None;
        let mut step = None;
        if self.matches(&[TokenKind::Colon]).is_some() {
            end = Some(Box::new(self.expression()?));
            if self.matches(&[TokenKind::Colon]).is_some() {
                step = Some(Box::new(self.expression()?));
            }
        }
        self.consume(TokenKind::RightBracket, "Expect ']' after index.")?;
        Ok(Expr::Index {
            name,
            start,
            end,
            step,
        })
    }

    // (expr ("," expr)*)? up to, but not including, `closing`.
    fn comma_separated(&mut self, closing: TokenKind) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        if !self.check(&closing) {
            loop {
                items.push(self.expression()?);
                if self.matches(&[TokenKind::Comma]).is_none() {
                    break;
                }
            }
        }
        Ok(items)
    }
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> Result<Vec<Stmt>, Vec<Diagnostic>> {
    let mut diagnostics = Diagnostics::new();
    let tokens = scan(input, &mut diagnostics);
    let statements = Parser::new(tokens).parse(&mut diagnostics);
    if diagnostics.had_error() {
        Err(diagnostics.into_entries())
    } else {
        Ok(statements)
    }
}
