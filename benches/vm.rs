//! Compiler and VM benchmarks for tern.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tern::{Compiler, Runtime, Settings};

const FIB: &str = "func fib(n int) int {\n\
                   if n < 2 { return n }\n\
                   return fib(n - 1) + fib(n - 2)\n\
                   }\n";

const LOOP_SUM: &str = "sum := 0\n\
                        for i := 0; i < 10000; i++ { sum += i }\n";

const COLLECTIONS: &str = "a := []int{}\n\
                           for i := 0; i < 500; i++ { a = append(a, i * 2) }\n\
                           m := map[string]int{}\n\
                           for i, v := range a { m[strconv.itoa(i)] = v }\n\
                           total := 0\n\
                           for _, v := range m { total += v }\n";

/// Compile and run a program on a runtime whose output is discarded.
fn run_program(source: &str) {
    let (runtime, _) = Runtime::with_capture();
    runtime.run("bench", source).expect("runtime error");
}

fn fibonacci_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("fibonacci");
    for n in [10, 15, 20] {
        let source = format!("{}fib({})\n", FIB, n);
        group.bench_with_input(BenchmarkId::new("recursive", n), &source, |b, source| {
            b.iter(|| run_program(black_box(source)))
        });
    }
    group.finish();
}

fn loop_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("loops");
    group.bench_function("sum_10000", |b| b.iter(|| run_program(black_box(LOOP_SUM))));
    group.bench_function("collections_500", |b| {
        b.iter(|| run_program(black_box(COLLECTIONS)))
    });
    group.finish();
}

fn compile_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let source = format!("{}{}{}", FIB, LOOP_SUM, COLLECTIONS);
    group.bench_function("compile_only", |b| {
        b.iter(|| {
            let mut compiler = Compiler::new("bench", &Settings::default());
            compiler.compile(black_box(&source)).expect("compile error")
        })
    });
    group.finish();
}

criterion_group!(benches, fibonacci_benchmarks, loop_benchmarks, compile_benchmarks);
criterion_main!(benches);
