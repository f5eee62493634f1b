//! Batch runner for one-line test cases.
//!
//! Each line of a case file holds `source, expected`. Every source runs in its own
//! session and its trimmed output is compared with the expected text. Lines that do not
//! split into exactly two comma-separated fields are skipped.

use crate::config::Config;
use crate::session::{RunStatus, Session};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub source: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseResult {
    pub case: TestCase,
    pub actual: String,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.actual == self.case.expected
    }
}

impl fmt::Display for CaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            write!(f, "PASS: {} = {}", self.case.source, self.case.expected)
        } else {
            write!(
                f,
                "FAIL: {}, expected {} but got {}",
                self.case.source, self.case.expected, self.actual
            )
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub results: Vec<CaseResult>,
}

impl BatchReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{}", result)?;
        }
        write!(f, "Tests passed: {} / {}", self.passed(), self.total())
    }
}

pub fn parse_cases(text: &str) -> Vec<TestCase> {
    text.lines()
        .filter_map(|line| {
            let mut fields: Vec<&str> = line.split(',').collect();
            while fields.last().is_some_and(|field| field.is_empty()) {
                fields.pop();
            }
            match fields.as_slice() {
                [source, expected] => Some(TestCase {
                    source: source.trim().to_string(),
                    expected: expected.trim().to_string(),
                }),
                _ => {
                    tracing::trace!(line, "skipping malformed test line");
                    None
                }
            }
        })
        .collect()
}

/// Runs one source in a fresh session and returns its trimmed output.
pub fn run_case(source: &str, config: &Config) -> String {
    let mut session = Session::new(config, Vec::new());
    if session.run(source) == RunStatus::StaticError {
        return format!("Error scanning/parsing the expression: {}", source);
    }
    String::from_utf8_lossy(session.output()).trim().to_string()
}

pub fn run_batch(text: &str, config: &Config) -> BatchReport {
    let results = parse_cases(text)
        .into_iter()
        .map(|case| {
            let actual = run_case(&case.source, config);
            CaseResult { case, actual }
        })
        .collect::<Vec<_>>();
    let report = BatchReport { results };
    tracing::debug!(
        passed = report.passed(),
        total = report.total(),
        "batch finished"
    );
    report
}
