use pretty_assertions::assert_eq;
use subpy::batch::run_batch;
use subpy::{Config, RunStatus, Session, Stage, run_to_string};

fn assert_prints(source: &str, expected: &str) {
    let (output, diagnostics) = run_to_string(source);
    assert!(
        diagnostics.is_empty(),
        "Unexpected diagnostics for {:?}: {:?}",
        source,
        diagnostics
    );
    assert_eq!(output, expected, "Source: {:?}", source);
}

fn assert_fails(source: &str, expected_output: &str, expected_diagnostic: &str) {
    let (output, diagnostics) = run_to_string(source);
    assert_eq!(output, expected_output, "Source: {:?}", source);
    let rendered: Vec<String> = diagnostics.iter().map(|d| d.to_string()).collect();
    assert!(
        rendered.iter().any(|d| d == expected_diagnostic),
        "Expected {:?} among {:?}",
        expected_diagnostic,
        rendered
    );
}

#[test]
fn numbers_print_without_trailing_zero() {
    assert_prints("print(5)\nprint(5.5)\nprint(2 / 4)\n", "5\n5.5\n0.5\n");
}

#[test]
fn strings_concatenate_with_numbers_either_side() {
    assert_prints("print(\"x\" + 5)\nprint(5 + \"x\")\n", "x5\n5x\n");
}

#[test]
fn division_by_zero_stops_later_statements() {
    assert_fails(
        "print(\"before\")\nprint(10 / 0)\nprint(\"after\")\n",
        "before\n",
        "[line 2] Error at '/': Division by zero.",
    );
}

#[test]
fn assignment_in_while_body_mutates_global() {
    assert_prints(
        "count = 0\nwhile count < 5:\n    count = count + 1\nprint(count)\n",
        "5\n",
    );
}

#[test]
fn names_introduced_in_a_block_vanish_after_it() {
    assert_fails(
        "i = 0\nwhile i < 1:\n    i = i + 1\n    inner = \"gone\"\nprint(inner)\n",
        "",
        "[line 5] Error at 'inner': Undefined variable 'inner'.",
    );
}

#[test]
fn slice_is_new_list_and_index_is_bare_element() {
    assert_prints(
        "xs = [1, 2, 3, 4, 5]\nys = xs[1:4]\nprint(ys)\nprint(xs[2])\nprint(ys[0:3] == [2, 3, 4])\n",
        "[2, 3, 4]\n3\ntrue\n",
    );
}

#[test]
fn function_body_cannot_see_caller_locals() {
    let source = "\
def helper():
    return hidden

def caller():
    hidden = 1
    return helper()

print(caller())
";
    assert_fails(
        source,
        "",
        "[line 2] Error at 'hidden': Undefined variable 'hidden'.",
    );
}

#[test]
fn function_body_sees_globals_defined_before_the_call() {
    let source = "\
def scaled(x):
    return x * factor

factor = 3
print(scaled(2))
";
    assert_prints(source, "6\n");
}

#[test]
fn functions_return_values() {
    assert_prints("def add(a, b):\n    return a + b\nprint(add(2, 3))\n", "5\n");
}

#[test]
fn range_loop_counts_from_zero() {
    assert_prints("for i in range(3):\n    print(i)\n", "0\n1\n2\n");
}

#[test]
fn blocks_accept_any_consistent_indent_width() {
    assert_prints("if True:\n  print(1)\n", "1\n");
    // A deeper body line opens a nested bare block.
    assert_prints(
        "if True:\n    print(1)\n        print(2)\n    print(3)\n",
        "1\n2\n3\n",
    );
}

#[test]
fn indentation_mismatch_is_a_static_error() {
    let mut session = Session::new(&Config::default(), Vec::new());
    let status = session.run("print(\"never\")\nif True:\n    print(1)\n  print(2)\n");
    assert_eq!(status, RunStatus::StaticError);
    assert!(session.output().is_empty());
    assert_eq!(session.diagnostics().entries()[0].stage, Stage::Lex);
}

#[test]
fn every_syntax_error_is_reported() {
    let (output, diagnostics) = run_to_string("print(1 +)\nx = \nprint(\"ok\")\ny = (2\n");
    assert_eq!(output, "");
    assert!(diagnostics.len() >= 3, "{:?}", diagnostics);
    assert!(diagnostics.iter().all(|d| d.stage == Stage::Parse));
    assert_eq!(diagnostics[0].line, 1);
    assert_eq!(diagnostics[1].line, 2);
}

#[test]
fn reassigning_a_parameter_stays_local() {
    let source = "\
x = \"global\"
def shadow(x):
    x = \"local\"
    return x
print(shadow(1))
print(x)
";
    assert_prints(source, "local\nglobal\n");
}

#[test]
fn index_applies_to_names_only() {
    // `xs[1][0:1]` would index an expression, which the grammar does not allow.
    let (output, diagnostics) = run_to_string("xs = [1, [2, 3]]\nprint(xs[1][0:1])\n");
    assert_eq!(output, "");
    assert_eq!(diagnostics[0].stage, Stage::Parse);

    assert_prints(
        "xs = [1, [2, 3]]\nys = xs\ninner = ys[1]\nprint(inner[0:1])\nprint(xs == ys)\n",
        "[2]\ntrue\n",
    );
}

#[test]
fn zero_is_falsy_but_empty_containers_are_truthy() {
    let source = "\
if 0:
    print(\"zero\")
if \"\":
    print(\"empty string\")
if []:
    print(\"empty list\")
";
    assert_prints(source, "empty string\nempty list\n");
}

#[test]
fn recursion_limit_is_a_runtime_error() {
    let mut config = Config::default();
    config.max_call_depth = 100;
    let mut session = Session::new(&config, Vec::new());
    let status = session.run("def forever(n):\n    return forever(n + 1)\nforever(0)\n");
    assert_eq!(status, RunStatus::RuntimeError);
    assert_eq!(
        session.diagnostics().entries()[0].message,
        "Maximum recursion depth exceeded."
    );
}

#[test]
fn deeply_nested_expressions_evaluate() {
    let depth = 3000;
    let source = format!("print({}1{})", "(".repeat(depth), ")".repeat(depth));
    assert_prints(&source, "1\n");
}

#[test]
fn demo_program_runs() {
    let (output, diagnostics) = run_to_string(include_str!("../demos/fizzbuzz.py"));
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(
        output,
        "1\n2\nFizz\n4\nBuzz\nFizz\n7\n8\nFizz\nBuzz\n11\nFizz\n13\n14\nFizzBuzz\n31\n[4, 1, 5, 9]\n[3, 1, 2]\ninter!\n"
    );
}

#[test]
fn demo_cases_all_pass() {
    let report = run_batch(include_str!("../demos/cases.txt"), &Config::default());
    let summary = report.to_string();
    assert!(summary.ends_with("Tests passed: 19 / 19"), "{}", summary);
    assert!(!summary.contains("FAIL:"), "{}", summary);
}
