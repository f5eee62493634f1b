use crate::evaluator::EvalError;
use crate::lexer::{Token, TokenKind};
use crate::source::Span;
use std::fmt;

/// Which pipeline stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lex,
    Parse,
    Runtime,
}

/// A single reported problem, rendered as `[line N] Error<location>: <message>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub stage: Stage,
    pub line: usize,
    /// Either empty, ` at end`, or ` at '<lexeme>'`.
    pub location: String,
    pub message: String,
    pub span: Span,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[line {}] Error{}: {}",
            self.line, self.location, self.message
        )
    }
}

/// Collects lexer, parser and runtime diagnostics for one run.
///
/// The `had_error` flag is sticky: once a lex or parse error is reported it stays set
/// until [`Diagnostics::reset`], and the session uses it to refuse execution.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    had_error: bool,
    had_runtime_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports a problem that has a line but no specific token (lexer errors).
    pub fn error(&mut self, line: usize, span: Span, message: impl Into<String>) {
        self.push(Diagnostic {
            stage: Stage::Lex,
            line,
            location: String::new(),
            message: message.into(),
            span,
        });
        self.had_error = true;
    }

    /// Reports a problem at a specific token (parser errors).
    pub fn error_at(&mut self, token: &Token, message: impl Into<String>) {
        self.push(Diagnostic {
            stage: Stage::Parse,
            line: token.line,
            location: location_of(token),
            message: message.into(),
            span: token.span,
        });
        self.had_error = true;
    }

    pub fn runtime_error(&mut self, error: &EvalError) {
        let token = error.token();
        self.push(Diagnostic {
            stage: Stage::Runtime,
            line: token.line,
            location: location_of(token),
            message: error.to_string(),
            span: token.span,
        });
        self.had_runtime_error = true;
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(stage = ?diagnostic.stage, line = diagnostic.line, "{}", diagnostic.message);
        self.entries.push(diagnostic);
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clears all entries and flags; called at the start of each independent run.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.had_error = false;
        self.had_runtime_error = false;
    }
}

fn location_of(token: &Token) -> String {
    if token.kind == TokenKind::Eof {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: TokenKind, lexeme: &str, line: usize) -> Token {
        Token::new(kind, lexeme, line, Span::default())
    }

    #[test]
    fn test_line_error_has_no_location() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(3, Span::default(), "Unexpected character.");
        assert!(diagnostics.had_error());
        assert!(!diagnostics.had_runtime_error());
        assert_eq!(
            diagnostics.entries()[0].to_string(),
            "[line 3] Error: Unexpected character."
        );
    }

    #[test]
    fn test_token_error_locations() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error_at(&token(TokenKind::Colon, ":", 2), "Expect expression.");
        diagnostics.error_at(&token(TokenKind::Eof, "", 7), "Expect expression.");
        let rendered: Vec<String> = diagnostics
            .entries()
            .iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(
            rendered,
            vec![
                "[line 2] Error at ':': Expect expression.",
                "[line 7] Error at end: Expect expression.",
            ]
        );
    }

    #[test]
    fn test_reset_clears_sticky_flags() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(1, Span::default(), "boom");
        diagnostics.reset();
        assert!(!diagnostics.had_error());
        assert!(diagnostics.is_empty());
    }
}
