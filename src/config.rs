use crate::evaluator::DEFAULT_MAX_CALL_DEPTH;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable that overrides the default call-depth limit.
pub const MAX_DEPTH_ENV: &str = "SUBPY_MAX_DEPTH";

pub const USAGE: &str = "Usage: subpy run <file> [--tokens] [--ast] [--fancy] [--max-depth N]\n       subpy test <file> [--max-depth N]";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No command given.")]
    MissingCommand,
    #[error("Unknown command '{0}'.")]
    UnknownCommand(String),
    #[error("Command '{0}' needs a file path.")]
    MissingPath(String),
    #[error("Unknown option '{0}'.")]
    UnknownFlag(String),
    #[error("Option '{0}' needs a value.")]
    MissingValue(String),
    #[error("Invalid call depth '{0}': expected a positive integer.")]
    InvalidDepth(String),
    #[error("Unexpected argument '{0}'.")]
    UnexpectedArgument(String),
}

/// Settings shared by the file runner, the batch runner and the REPL.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub max_call_depth: usize,
    /// Render diagnostics with source snippets instead of one-line messages.
    pub fancy: bool,
    pub dump_tokens: bool,
    pub dump_ast: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            fancy: false,
            dump_tokens: false,
            dump_ast: false,
        }
    }
}

impl Config {
    /// Defaults with the process environment's overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(depth) = lookup(MAX_DEPTH_ENV) {
            self.max_call_depth = parse_depth(&depth)?;
        }
        Ok(self)
    }
}

fn parse_depth(text: &str) -> Result<usize, ConfigError> {
    match text.trim().parse::<usize>() {
        Ok(depth) if depth > 0 => Ok(depth),
        _ => Err(ConfigError::InvalidDepth(text.to_string())),
    }
}

/// What the `subpy` binary was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run { path: PathBuf, config: Config },
    Test { path: PathBuf, config: Config },
}

impl Command {
    /// Parses the arguments after the program name on top of `base`.
    pub fn parse<I>(args: I, base: Config) -> Result<Command, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let name = args.next().ok_or(ConfigError::MissingCommand)?;
        if name != "run" && name != "test" {
            return Err(ConfigError::UnknownCommand(name));
        }

        let mut config = base;
        let mut path = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--tokens" if name == "run" => config.dump_tokens = true,
                "--ast" if name == "run" => config.dump_ast = true,
                "--fancy" if name == "run" => config.fancy = true,
                "--max-depth" => {
                    let value = args.next().ok_or_else(|| ConfigError::MissingValue(arg.clone()))?;
                    config.max_call_depth = parse_depth(&value)?;
                }
                flag if flag.starts_with("--") => return Err(ConfigError::UnknownFlag(arg.clone())),
                _ if path.is_none() => path = Some(PathBuf::from(&arg)),
                _ => return Err(ConfigError::UnexpectedArgument(arg.clone())),
            }
        }

        let path = path.ok_or_else(|| ConfigError::MissingPath(name.clone()))?;
        Ok(match name.as_str() {
            "run" => Command::Run { path, config },
            _ => Command::Test { path, config },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, ConfigError> {
        Command::parse(args.iter().map(|s| s.to_string()), Config::default())
    }

    #[test]
    fn test_run_with_flags() {
        let command = parse(&["run", "prog.py", "--tokens", "--fancy", "--max-depth", "50"]);
        assert_eq!(
            command,
            Ok(Command::Run {
                path: PathBuf::from("prog.py"),
                config: Config {
                    max_call_depth: 50,
                    fancy: true,
                    dump_tokens: true,
                    dump_ast: false,
                },
            })
        );
    }

    #[test]
    fn test_test_command() {
        assert_eq!(
            parse(&["test", "cases.txt"]),
            Ok(Command::Test {
                path: PathBuf::from("cases.txt"),
                config: Config::default(),
            })
        );
    }

    #[test]
    fn test_argument_errors() {
        assert_eq!(parse(&[]), Err(ConfigError::MissingCommand));
        assert_eq!(
            parse(&["build", "x"]),
            Err(ConfigError::UnknownCommand("build".to_string()))
        );
        assert_eq!(parse(&["run"]), Err(ConfigError::MissingPath("run".to_string())));
        assert_eq!(
            parse(&["run", "a.py", "--verbose"]),
            Err(ConfigError::UnknownFlag("--verbose".to_string()))
        );
        // Dumps only make sense for a single program.
        assert_eq!(
            parse(&["test", "a.txt", "--ast"]),
            Err(ConfigError::UnknownFlag("--ast".to_string()))
        );
        assert_eq!(
            parse(&["run", "a.py", "--max-depth"]),
            Err(ConfigError::MissingValue("--max-depth".to_string()))
        );
        assert_eq!(
            parse(&["run", "a.py", "--max-depth", "0"]),
            Err(ConfigError::InvalidDepth("0".to_string()))
        );
        assert_eq!(
            parse(&["run", "a.py", "b.py"]),
            Err(ConfigError::UnexpectedArgument("b.py".to_string()))
        );
    }

    #[test]
    fn test_env_override() {
        let config = Config::default()
            .with_overrides(|key| (key == MAX_DEPTH_ENV).then(|| "250".to_string()))
            .unwrap();
        assert_eq!(config.max_call_depth, 250);

        let err = Config::default()
            .with_overrides(|_| Some("deep".to_string()))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidDepth("deep".to_string()));

        assert_eq!(Config::default().with_overrides(|_| None), Ok(Config::default()));
    }
}
