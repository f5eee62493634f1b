use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use subpy::{parse_str, run_to_string, scan_str};

// A reasonably complex program for benchmarking
const BENCH_INPUT: &str = r#"
# Calculate Fibonacci numbers the slow way
def fib(n):
    if n < 2:
        return n
    return fib(n - 1) + fib(n - 2)

def factorial(n):
    result = 1
    for i in range(1, n + 1):
        result = result * i
    return result

def describe(xs):
    text = ""
    for x in xs:
        if x % 2 == 0 and x > 2:
            text = text + "even " + x + ", "
        elif x == 1 or x == 2:
            text = text + "small, "
        else:
            text = text + "odd, "
    return text

values = [1, 2, 3, 4, 5.5, "string with spaces", True, False, None]
print(fib(15))
print(factorial(10))
print(describe([1, 2, 3, 4, 5, 6]))
print(values[1:5:2])
i = 0
while i < 100:
    i = i + 3 ** 2 - 8
print(i)
"#;

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pipeline Stages");

    group.bench_with_input(
        BenchmarkId::new("scan", "program"),
        &BENCH_INPUT,
        |b, input| b.iter(|| scan_str(black_box(input))),
    );

    group.bench_with_input(
        BenchmarkId::new("parse", "program"),
        &BENCH_INPUT,
        |b, input| b.iter(|| parse_str(black_box(input))),
    );

    // Scanning, parsing and running, with output captured in memory
    group.bench_with_input(
        BenchmarkId::new("run", "program"),
        &BENCH_INPUT,
        |b, input| b.iter(|| run_to_string(black_box(input))),
    );

    group.finish();
}

// Register the benchmark group with Criterion
criterion_group!(benches, bench_pipeline);
// Generate the main function necessary for the benchmark executable
criterion_main!(benches);
