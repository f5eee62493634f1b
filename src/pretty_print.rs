use crate::diagnostics::{Diagnostic, Stage};
use ariadne::{Label, Report, ReportKind, Source};
use std::io::{self, Write};
use std::ops::Range;

impl Diagnostic {
    fn label_message(&self) -> &'static str {
        match self.stage {
            Stage::Lex => "This text could not be scanned",
            Stage::Parse => "Parsing stopped here",
            Stage::Runtime => "Failed while evaluating this",
        }
    }

    // Clamped so an end-of-input span still points inside the source.
    fn range_in(&self, input: &str) -> Range<usize> {
        let start = self.span.start.min(input.len());
        let end = self.span.end.clamp(start, input.len());
        start..end
    }

    fn report<'a>(
        &self,
        name: &'a str,
        input: &str,
        color: bool,
    ) -> Report<'a, (&'a str, Range<usize>)> {
        let range = self.range_in(input);
        Report::build(ReportKind::Error, (name, range.clone()))
            .with_config(ariadne::Config::default().with_color(color))
            .with_message(self.to_string())
            .with_label(Label::new((name, range)).with_message(self.label_message()))
            .finish()
    }

    /// Renders the diagnostic with a source snippet to `out`.
    pub fn write_pretty(&self, name: &str, input: &str, out: impl Write) -> io::Result<()> {
        self.report(name, input, false)
            .write((name, Source::from(input)), out)
    }

    /// Renders the diagnostic with a colored source snippet on stderr.
    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        self.report(name, input, true)
            .eprint((name, Source::from(input)))
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::Diagnostic;
    use crate::parser::parse_str;
    use crate::session::run_to_string;

    fn render(diagnostic: &Diagnostic, input: &str) -> String {
        let mut out = Vec::new();
        diagnostic
            .write_pretty("test.py", input, &mut out)
            .expect("rendering into a Vec cannot fail");
        String::from_utf8(out).expect("utf-8 report")
    }

    #[test]
    fn test_parse_error_report() {
        let input = "x = (1 +\nprint(x)";
        let diagnostics = parse_str(input).unwrap_err();
        let rendered = render(&diagnostics[0], input);
        assert!(rendered.contains("test.py"), "{}", rendered);
        assert!(rendered.contains(&diagnostics[0].message), "{}", rendered);
        assert!(rendered.contains("Parsing stopped here"), "{}", rendered);
    }

    #[test]
    fn test_runtime_error_report_points_at_source() {
        let input = "y = 2\nprint(y / 0)";
        let (_, diagnostics) = run_to_string(input);
        let rendered = render(&diagnostics[0], input);
        assert!(
            rendered.contains("[line 2] Error at '/': Division by zero."),
            "{}",
            rendered
        );
        assert!(rendered.contains("print(y / 0)"), "{}", rendered);
    }

    #[test]
    fn test_end_of_input_span_is_clamped() {
        let input = "print(";
        let diagnostics = parse_str(input).unwrap_err();
        let rendered = render(&diagnostics[0], input);
        assert!(rendered.contains("at end"), "{}", rendered);
    }
}
