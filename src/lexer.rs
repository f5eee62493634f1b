use logos::{Lexer, Logos};
use std::fmt;
use thiserror::Error;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::source::Span;

/// Indentation width contributed by a tab character.
pub const TAB_WIDTH: usize = 8;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")] // Skip inline whitespace
#[logos(skip r"#[^\n]*")] // Skip comments
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("/")]
    Slash,
    #[token("*")]
    Star,
    #[token("**")]
    Power,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token("\n")]
    Newline,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,
    #[regex(r#""[^"]*"?"#, string_literal)]
    String(String),
    #[regex(r"[0-9]+", number_literal)]
    Number(f64),

    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("range")]
    Range,
    #[token("def")]
    Def,
    #[token("return")]
    Return,
    #[token("print")]
    Print,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,

    // Synthesized by the indentation layer, never matched by logos.
    Indent,
    Dedent,
    Eof,
}

fn string_literal(lex: &mut Lexer<TokenKind>) -> Result<String, LexerErrorKind> {
    let slice = lex.slice();
    // make sure string was terminated
    if slice.len() == 1 || !slice.ends_with('"') {
        return Err(LexerErrorKind::UnterminatedString);
    }
    Ok(slice[1..slice.len() - 1].to_string())
}

// The fraction is consumed by hand so that `1.` and `1.x` leave the dot for the next token.
fn number_literal(lex: &mut Lexer<TokenKind>) -> Result<f64, LexerErrorKind> {
    let rest = lex.remainder().as_bytes();
    if rest.len() >= 2 && rest[0] == b'.' && rest[1].is_ascii_digit() {
        let fraction = 1 + rest[1..].iter().take_while(|b| b.is_ascii_digit()).count();
        lex.bump(fraction);
    }
    let slice = lex.slice();
    slice
        .parse::<f64>()
        .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LeftParen => write!(f, "'('"),
            TokenKind::RightParen => write!(f, "')'"),
            TokenKind::LeftBracket => write!(f, "'['"),
            TokenKind::RightBracket => write!(f, "']'"),
            TokenKind::LeftBrace => write!(f, "'{{'"),
            TokenKind::RightBrace => write!(f, "'}}'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Power => write!(f, "'**'"),
            TokenKind::Percent => write!(f, "'%'"),
            TokenKind::Bang => write!(f, "'!'"),
            TokenKind::BangEqual => write!(f, "'!='"),
            TokenKind::Equal => write!(f, "'='"),
            TokenKind::EqualEqual => write!(f, "'=='"),
            TokenKind::Greater => write!(f, "'>'"),
            TokenKind::GreaterEqual => write!(f, "'>='"),
            TokenKind::Less => write!(f, "'<'"),
            TokenKind::LessEqual => write!(f, "'<='"),
            TokenKind::Newline => write!(f, "newline"),
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::String(s) => write!(f, "string \"{}\"", s),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::And => write!(f, "'and'"),
            TokenKind::Or => write!(f, "'or'"),
            TokenKind::If => write!(f, "'if'"),
            TokenKind::Elif => write!(f, "'elif'"),
            TokenKind::Else => write!(f, "'else'"),
            TokenKind::While => write!(f, "'while'"),
            TokenKind::For => write!(f, "'for'"),
            TokenKind::In => write!(f, "'in'"),
            TokenKind::Range => write!(f, "'range'"),
            TokenKind::Def => write!(f, "'def'"),
            TokenKind::Return => write!(f, "'return'"),
            TokenKind::Print => write!(f, "'print'"),
            TokenKind::True => write!(f, "'True'"),
            TokenKind::False => write!(f, "'False'"),
            TokenKind::None => write!(f, "'None'"),
            TokenKind::Indent => write!(f, "indent"),
            TokenKind::Dedent => write!(f, "dedent"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, span: Span) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
            span,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] {} '{}'", self.line, self.kind, self.lexeme)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[default]
    #[error("Unexpected character.")]
    UnexpectedCharacter,
    #[error("Unterminated string.")]
    UnterminatedString,
    #[error("Invalid number literal '{0}'.")]
    InvalidNumberFormat(String),
    #[error("Unindent does not match any outer indentation level.")]
    InconsistentDedent,
}

/// Layers significant indentation on top of the logos token stream.
struct Scanner<'src, 'd> {
    source: &'src str,
    diagnostics: &'d mut Diagnostics,
    tokens: Vec<Token>,
    // Open indentation levels; the bottom entry is always 0.
    indents: Vec<usize>,
    line: usize,
    at_line_start: bool,
    // Bracket depth; newlines inside brackets are continuation lines.
    nesting: usize,
}

impl<'src, 'd> Scanner<'src, 'd> {
    fn new(source: &'src str, diagnostics: &'d mut Diagnostics) -> Self {
        Scanner {
            source,
            diagnostics,
            tokens: Vec::new(),
            indents: vec![0],
            line: 1,
            at_line_start: true,
            nesting: 0,
        }
    }

    fn scan(mut self) -> Vec<Token> {
        let source = self.source;
        let mut lexer = TokenKind::lexer(source);
        while let Some(result) = lexer.next() {
            let span = Span::from(lexer.span());
            let lexeme = lexer.slice();
            let line = self.line;
            self.line += lexeme.matches('\n').count();

            match result {
                Ok(TokenKind::Newline) => {
                    if self.nesting == 0 {
                        self.push(TokenKind::Newline, "\\n", line, span);
                        self.at_line_start = true;
                    }
                }
                Ok(kind) => {
                    if self.at_line_start {
                        self.at_line_start = false;
                        let width = self.indentation_before(span.start);
                        self.indent_to(width, line, span.start);
                    }
                    match kind {
                        TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => {
                            self.nesting += 1
                        }
                        TokenKind::RightParen
                        | TokenKind::RightBracket
                        | TokenKind::RightBrace => self.nesting = self.nesting.saturating_sub(1),
                        _ => {}
                    }
                    self.push(kind, lexeme, line, span);
                }
                Err(error) => self.diagnostics.error(line, span, error.to_string()),
            }
        }

        let end = Span::point(source.len());
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, "<dedent>", self.line, end);
        }
        self.push(TokenKind::Eof, "", self.line, end);

        tracing::debug!(tokens = self.tokens.len(), lines = self.line, "scanned source");
        self.tokens
    }

    fn push(&mut self, kind: TokenKind, lexeme: &str, line: usize, span: Span) {
        self.tokens.push(Token::new(kind, lexeme, line, span));
    }

    fn current_indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    // Only whitespace can sit between the last line break and the first token of a line.
    fn indentation_before(&self, offset: usize) -> usize {
        let line_start = self.source[..offset].rfind('\n').map_or(0, |i| i + 1);
        self.source[line_start..offset]
            .chars()
            .map(|c| match c {
                '\t' => TAB_WIDTH,
                ' ' => 1,
                _ => 0,
            })
            .sum()
    }

    fn indent_to(&mut self, width: usize, line: usize, offset: usize) {
        let here = Span::point(offset);
        if width > self.current_indent() {
            self.indents.push(width);
            self.push(TokenKind::Indent, "<indent>", line, here);
            return;
        }
        while self.current_indent() > width {
            self.indents.pop();
            self.push(TokenKind::Dedent, "<dedent>", line, here);
        }
        if self.current_indent() != width {
            self.diagnostics
                .error(line, here, LexerErrorKind::InconsistentDedent.to_string());
        }
    }
}

/// Scans `source` into tokens, reporting problems to `diagnostics`.
///
/// Never fails: bad characters and unterminated strings are reported and skipped, and the
/// returned stream always ends with a single [`TokenKind::Eof`].
pub fn scan(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    Scanner::new(source, diagnostics).scan()
}

// Helper function to tokenize a string directly (useful for tests and benches)
pub fn scan_str(source: &str) -> Result<Vec<Token>, Vec<Diagnostic>> {
    let mut diagnostics = Diagnostics::new();
    let tokens = scan(source, &mut diagnostics);
    if diagnostics.had_error() {
        Err(diagnostics.into_entries())
    } else {
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        match scan_str(input) {
            Ok(tokens) => tokens.into_iter().map(|t| t.kind).collect(),
            Err(errors) => panic!("Lexing failed for input '{}': {:?}", input, errors),
        }
    }

    fn assert_tokens(input: &str, expected: Vec<TokenKind>) {
        assert_eq!(kinds(input), expected, "Input: '{}'", input);
    }

    // Returns the kinds that were still produced alongside the reported messages.
    fn scan_with_errors(input: &str) -> (Vec<TokenKind>, Vec<std::string::String>) {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan(input, &mut diagnostics);
        (
            tokens.into_iter().map(|t| t.kind).collect(),
            diagnostics.entries().iter().map(|d| d.to_string()).collect(),
        )
    }

    use TokenKind::*;

    #[test]
    fn test_empty_input() {
        assert_tokens("", vec![Eof]);
    }

    #[test]
    fn test_simple_assignment() {
        assert_tokens("x = 1", vec![Identifier, Equal, Number(1.0), Eof]);
    }

    #[test]
    fn test_operators() {
        assert_tokens(
            "** * == = != ! <= < >= > / % + -",
            vec![
                Power,
                Star,
                EqualEqual,
                Equal,
                BangEqual,
                Bang,
                LessEqual,
                Less,
                GreaterEqual,
                Greater,
                Slash,
                Percent,
                Plus,
                Minus,
                Eof,
            ],
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_tokens(
            "if elif else while for in range def return print and or True False None",
            vec![
                If, Elif, Else, While, For, In, Range, Def, Return, Print, And, Or, True, False,
                None, Eof,
            ],
        );
        // Maximal munch: a keyword prefix inside a longer name is an identifier.
        assert_tokens("iff printer _def x1", vec![Identifier; 4].into_iter().chain([Eof]).collect());
        assert_tokens("true", vec![Identifier, Eof]);
    }

    #[test]
    fn test_numbers() {
        assert_tokens("123", vec![Number(123.0), Eof]);
        assert_tokens("6.78", vec![Number(6.78), Eof]);
        assert_tokens("1.", vec![Number(1.0), Dot, Eof]);
        assert_tokens("3.x", vec![Number(3.0), Dot, Identifier, Eof]);
        assert_tokens("-4", vec![Minus, Number(4.0), Eof]);
    }

    #[test]
    fn test_strings() {
        assert_tokens(r#""hello""#, vec![String("hello".to_string()), Eof]);
        assert_tokens(r#""""#, vec![String("".to_string()), Eof]);
        assert_tokens(
            r#""with # not a comment""#,
            vec![String("with # not a comment".to_string()), Eof],
        );
    }

    #[test]
    fn test_multiline_string_advances_line() {
        let tokens = scan_str("\"a\nb\" x").expect("should scan");
        assert_eq!(tokens[0].kind, String("a\nb".to_string()));
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].kind, Identifier);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_comments() {
        assert_tokens("x # trailing comment", vec![Identifier, Eof]);
        assert_tokens("# only comment", vec![Eof]);
    }

    #[test]
    fn test_indent_and_dedent() {
        assert_tokens(
            "if x:\n    y\nz",
            vec![
                If, Identifier, Colon, Newline, Indent, Identifier, Newline, Dedent, Identifier,
                Eof,
            ],
        );
    }

    #[test]
    fn test_any_deeper_width_opens_a_level() {
        assert_tokens(
            "if x:\n  y\nz",
            vec![
                If, Identifier, Colon, Newline, Indent, Identifier, Newline, Dedent, Identifier,
                Eof,
            ],
        );
        assert_tokens(
            "if x:\n    y\n        z\n",
            vec![
                If, Identifier, Colon, Newline, Indent, Identifier, Newline, Indent, Identifier,
                Newline, Dedent, Dedent, Eof,
            ],
        );
    }

    #[test]
    fn test_multiple_dedents_at_once() {
        assert_tokens(
            "if a:\n    if b:\n        c\nd\n",
            vec![
                If, Identifier, Colon, Newline, Indent, If, Identifier, Colon, Newline, Indent,
                Identifier, Newline, Dedent, Dedent, Identifier, Newline, Eof,
            ],
        );
    }

    #[test]
    fn test_blank_and_comment_lines_do_not_change_indentation() {
        assert_tokens(
            "if x:\n    y\n\n    # c\n    z\n",
            vec![
                If, Identifier, Colon, Newline, Indent, Identifier, Newline, Newline, Newline,
                Identifier, Newline, Dedent, Eof,
            ],
        );
    }

    #[test]
    fn test_open_levels_flushed_at_end() {
        let tokens = kinds("while a:\n    while b:\n        c");
        let indents = tokens.iter().filter(|k| **k == Indent).count();
        let dedents = tokens.iter().filter(|k| **k == Dedent).count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2);
        assert_eq!(tokens.iter().filter(|k| **k == Eof).count(), 1);
        assert_eq!(tokens.last(), Some(&Eof));
    }

    #[test]
    fn test_tab_counts_as_eight() {
        let mut diagnostics = Diagnostics::new();
        // A tab and eight spaces are the same level.
        let tokens = scan("if x:\n\ty\n        z\n", &mut diagnostics);
        assert!(!diagnostics.had_error());
        let indents = tokens.iter().filter(|t| t.kind == Indent).count();
        assert_eq!(indents, 1);
    }

    #[test]
    fn test_brackets_join_lines() {
        let tokens = scan_str("x = [1,\n  2]\ny").expect("should scan");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Identifier,
                Equal,
                LeftBracket,
                Number(1.0),
                Comma,
                Number(2.0),
                RightBracket,
                Newline,
                Identifier,
                Eof
            ]
        );
        assert_eq!(tokens[5].line, 2);
        assert_eq!(tokens[8].line, 3);
    }

    #[test]
    fn test_newline_lexeme() {
        let tokens = scan_str("a\n").expect("should scan");
        assert_eq!(tokens[1].lexeme, "\\n");
    }

    #[test]
    fn test_unterminated_string() {
        let (kinds, errors) = scan_with_errors("x = \"abc\ny = 2");
        assert_eq!(kinds, vec![Identifier, Equal, Eof]);
        assert_eq!(errors, vec!["[line 1] Error: Unterminated string."]);
    }

    #[test]
    fn test_unexpected_character_continues() {
        let (kinds, errors) = scan_with_errors("a $ b\n@");
        assert_eq!(kinds, vec![Identifier, Identifier, Newline, Eof]);
        assert_eq!(
            errors,
            vec![
                "[line 1] Error: Unexpected character.",
                "[line 2] Error: Unexpected character.",
            ]
        );
    }

    #[test]
    fn test_inconsistent_dedent() {
        let (_, errors) = scan_with_errors("if x:\n    y\n  z\n");
        assert_eq!(
            errors,
            vec!["[line 3] Error: Unindent does not match any outer indentation level."]
        );
    }

    #[test]
    fn test_token_spans_and_lines() {
        let tokens = scan_str("a\n  \nbc = 1").expect("should scan");
        assert_eq!(tokens[0].span, Span::new(0, 1));
        let bc = &tokens[3];
        assert_eq!(bc.lexeme, "bc");
        assert_eq!(bc.line, 3);
        assert_eq!(bc.span, Span::new(5, 7));
    }
}
