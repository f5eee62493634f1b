use crate::config::Config;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::environment::Environment;
use crate::evaluator::Interpreter;
use crate::lexer::scan;
use crate::parser::Parser;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Outcome of running one piece of source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// Lexing or parsing failed; nothing was executed.
    StaticError,
    RuntimeError,
}

impl RunStatus {
    /// Process exit code for the file runner.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::StaticError => 65,
            RunStatus::RuntimeError => 70,
        }
    }
}

/// Drives source text through scanning, parsing and execution.
///
/// Globals persist across [`Session::run`] calls while diagnostics are reset for each one.
pub struct Session<W: Write> {
    diagnostics: Diagnostics,
    interpreter: Interpreter<W>,
}

impl<W: Write> Session<W> {
    pub fn new(config: &Config, output: W) -> Self {
        Session {
            diagnostics: Diagnostics::new(),
            interpreter: Interpreter::new(output, config.max_call_depth),
        }
    }

    pub fn run(&mut self, source: &str) -> RunStatus {
        self.diagnostics.reset();

        let tokens = scan(source, &mut self.diagnostics);
        let statements = Parser::new(tokens).parse(&mut self.diagnostics);
        if self.diagnostics.had_error() {
            tracing::debug!(
                errors = self.diagnostics.entries().len(),
                "static errors, not executing"
            );
            return RunStatus::StaticError;
        }

        match self.interpreter.interpret(&statements) {
            Ok(()) => RunStatus::Success,
            Err(err) => {
                self.diagnostics.runtime_error(&err);
                RunStatus::RuntimeError
            }
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn globals(&self) -> Rc<RefCell<Environment>> {
        self.interpreter.globals()
    }

    pub fn output(&self) -> &W {
        self.interpreter.output()
    }

    pub fn into_output(self) -> W {
        self.interpreter.into_output()
    }
}

/// Runs `source` in a fresh session with default settings, capturing what it prints.
pub fn run_to_string(source: &str) -> (String, Vec<Diagnostic>) {
    let mut session = Session::new(&Config::default(), Vec::new());
    session.run(source);
    let diagnostics = session.diagnostics().entries().to_vec();
    let output = String::from_utf8_lossy(&session.into_output()).into_owned();
    (output, diagnostics)
}
