use std::borrow::Cow;
use std::cell::RefCell;
use std::io::{self, Stdout};
use std::rc::Rc;

use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};
use subpy::{Config, Diagnostics, Environment, RunStatus, Session, TokenKind, scan};

const HISTORY_FILE: &str = "subpy_history.txt";

const KEYWORDS: &[&str] = &[
    "and", "or", "if", "elif", "else", "while", "for", "in", "range", "def", "return", "print",
    "True", "False", "None",
];

struct SubpyCompleter {
    env: Rc<RefCell<Environment>>,
}

impl SubpyCompleter {
    fn new(env: Rc<RefCell<Environment>>) -> Self {
        SubpyCompleter { env }
    }
}

impl rustyline::completion::Completer for SubpyCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let before = &line[..pos];
        let start = before
            .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .map_or(0, |i| i + 1);
        let prefix = &before[start..];
        if prefix.is_empty() {
            return Ok((pos, vec![]));
        }

        let mut candidates: Vec<String> = self
            .env
            .borrow()
            .get_identifiers()
            .into_iter()
            .chain(KEYWORDS.iter().map(|k| k.to_string()))
            .filter(|id| id.starts_with(prefix) && id.len() > prefix.len())
            .map(|id| id[prefix.len()..].to_string())
            .collect();
        candidates.sort();
        candidates.dedup();
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputHelper {
    #[rustyline(Validator)]
    validator: BlockValidator,
    #[rustyline(Highlighter)]
    highlighter: TokenHighlighter,
    #[rustyline(Completer)]
    completer: SubpyCompleter,
}

/// Keeps reading while brackets or a string are open, and after a line ending in `:`
/// until an empty line closes the block.
struct BlockValidator;

impl Validator for BlockValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        let mut depth: i32 = 0;
        let mut in_string = false;
        let mut in_comment = false;

        for (i, c) in input.char_indices() {
            if in_string {
                in_string = c != '"';
                continue;
            }
            if in_comment {
                in_comment = c != '\n';
                continue;
            }
            match c {
                '"' => in_string = true,
                '#' => in_comment = true,
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched '{}' at position {}",
                            c, i
                        ))));
                    }
                }
                _ => {}
            }
        }

        if in_string || depth > 0 {
            return Ok(ValidationResult::Incomplete);
        }
        let opens_block = input.lines().any(|line| line.trim_end().ends_with(':'));
        if opens_block && !input.ends_with('\n') {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct TokenHighlighter;

impl Highlighter for TokenHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan(line, &mut diagnostics);
        let mut highlighted = String::with_capacity(line.len());
        let mut cursor = 0;

        for token in &tokens {
            let color = match token.kind {
                TokenKind::String(_) => "32", // Green for strings
                TokenKind::Number(_) => "33",
                TokenKind::True | TokenKind::False | TokenKind::None => "35",
                TokenKind::And
                | TokenKind::Or
                | TokenKind::If
                | TokenKind::Elif
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::In
                | TokenKind::Range
                | TokenKind::Def
                | TokenKind::Return
                | TokenKind::Print => "1;34",
                _ => continue,
            };
            let span = token.span.to_range();
            if span.start < cursor || span.end > line.len() {
                continue;
            }
            highlighted.push_str(&line[cursor..span.start]);
            highlighted.push_str(&format!("\x1b[{}m{}\x1b[0m", color, &line[span.clone()]));
            cursor = span.end;
        }
        highlighted.push_str(&line[cursor..]);

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn report(session: &Session<Stdout>, config: &Config, source: &str) {
    for diagnostic in session.diagnostics().entries() {
        if !config.fancy || diagnostic.pretty_print("REPL", source).is_err() {
            eprintln!("{}", diagnostic);
        }
    }
}

fn main() -> rustyline::Result<()> {
    subpy::init_tracing();
    let config = Config::from_env().unwrap_or_else(|err| {
        eprintln!("{}", err);
        Config::default()
    });

    println!("subpy REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit. End a block with an empty line.");

    let mut session = Session::new(&config, io::stdout());
    let h = InputHelper {
        highlighter: TokenHighlighter,
        validator: BlockValidator,
        completer: SubpyCompleter::new(session.globals()),
    };
    let editor_config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Vi)
        .build();
    let mut rl = Editor::with_config(editor_config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    loop {
        let readline = rl.readline("subpy> ");
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input.eq_ignore_ascii_case("exit") {
                    break;
                }

                if session.run(&line) != RunStatus::Success {
                    report(&session, &config, &line);
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}
