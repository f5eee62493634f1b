// Declare modules publicly so they are part of the library interface
pub mod ast;
pub mod batch;
pub mod config;
pub mod diagnostics;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod session;
pub mod source;
pub mod stack;
pub mod types;

pub use config::{Command, Config, ConfigError};
pub use diagnostics::{Diagnostic, Diagnostics, Stage};
pub use environment::{EnvError, Environment};
pub use evaluator::{EvalError, EvalResult, Flow, Interpreter};
pub use lexer::{Token, TokenKind, scan, scan_str};
pub use parser::{ParseError, Parser, parse_str};
pub use session::{RunStatus, Session, run_to_string};
pub use source::Span;
pub use types::{Function, Value};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs a `tracing` subscriber writing to stderr, only when `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
