use std::io;
use std::path::Path;
use std::process::ExitCode;

use subpy::ast::print_program;
use subpy::batch::run_batch;
use subpy::config::USAGE;
use subpy::{Command, Config, Diagnostics, Parser, RunStatus, Session, scan};

const USAGE_ERROR: u8 = 64;
const IO_ERROR: u8 = 74;

fn read_source(path: &Path) -> Result<String, ExitCode> {
    std::fs::read_to_string(path).map_err(|err| {
        eprintln!("Could not read '{}': {}", path.display(), err);
        ExitCode::from(IO_ERROR)
    })
}

// Token and tree dumps go to stdout ahead of the program's own output.
fn dump(source: &str, config: &Config) {
    if config.dump_tokens {
        for token in scan(source, &mut Diagnostics::new()) {
            println!("{}", token);
        }
    }
    if config.dump_ast {
        let tokens = scan(source, &mut Diagnostics::new());
        print!("{}", print_program(&Parser::new(tokens).parse(&mut Diagnostics::new())));
    }
}

fn run_file(path: &Path, config: &Config) -> ExitCode {
    let source = match read_source(path) {
        Ok(source) => source,
        Err(code) => return code,
    };
    dump(&source, config);

    let mut session = Session::new(config, io::stdout());
    let status = session.run(&source);
    if status != RunStatus::Success {
        let name = path.display().to_string();
        for diagnostic in session.diagnostics().entries() {
            if !config.fancy || diagnostic.pretty_print(&name, &source).is_err() {
                eprintln!("{}", diagnostic);
            }
        }
    }
    ExitCode::from(status.exit_code() as u8)
}

fn run_tests(path: &Path, config: &Config) -> ExitCode {
    match read_source(path) {
        Ok(cases) => {
            println!("{}", run_batch(&cases, config));
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn main() -> ExitCode {
    subpy::init_tracing();

    let command = Config::from_env()
        .and_then(|base| Command::parse(std::env::args().skip(1), base));
    match command {
        Ok(Command::Run { path, config }) => run_file(&path, &config),
        Ok(Command::Test { path, config }) => run_tests(&path, &config),
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("{}", USAGE);
            ExitCode::from(USAGE_ERROR)
        }
    }
}
