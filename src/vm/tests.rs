use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::compiler::Compiler;
use crate::config::{Settings, Strictness};
use crate::error::ErrorKind;
use crate::runtime::Runtime;
use crate::symbols::SymbolTable;
use crate::value::Value;
use crate::vm::{Context, ContextState};

fn run(source: &str) -> String {
    let (runtime, output) = Runtime::with_capture();
    runtime.run("test", source).unwrap();
    output.contents()
}

fn run_error(source: &str) -> ErrorKind {
    let (runtime, _) = Runtime::with_capture();
    runtime.run("test", source).unwrap_err().kind
}

/// A context over `source` in a fresh scope under the runtime's root.
fn context(runtime: &Arc<Runtime>, source: &str) -> Context {
    let code = Compiler::new("test", &runtime.settings)
        .compile(source)
        .unwrap();
    let symbols = SymbolTable::new_child(&runtime.root(), "main");
    Context::new(runtime, Arc::new(code), symbols)
}

#[test]
fn test_end_to_end_scenarios() {
    assert_eq!(run("print 1+2*3"), "7\n");
    assert_eq!(
        run("x := 10; for i := 0; i < 3; i = i + 1 { x = x + i }; print x"),
        "13\n"
    );
    assert_eq!(
        run("func f(n int) int { if n < 2 { return n }; return f(n-1) + f(n-2) }; print f(10)"),
        "55\n"
    );
    assert_eq!(run("try { x := 1/0 } catch { print _error }"), "division by zero\n");
    assert_eq!(run("a := [1,2,3]; a = a + 4; print len(a), a[3]"), "4 4\n");
    assert_eq!(
        run("type Point { x int; y int }; p := Point{x:3, y:4}; print p.x + p.y"),
        "7\n"
    );
}

#[test]
fn test_expression_leaves_one_value() {
    let (runtime, _) = Runtime::with_capture();
    let code = Compiler::new("expr", &Settings::default())
        .compile_expression("(1 + 2) * 3 - 4")
        .unwrap();
    let mut ctx = Context::new(&runtime, Arc::new(code), runtime.root());
    ctx.run().unwrap();
    assert_eq!(ctx.stack().len(), 1);
    assert_eq!(ctx.result(), Value::Int(5));
    assert_eq!(ctx.state(), ContextState::Stopped);
}

#[test]
fn test_call_consumes_arguments() {
    let (runtime, _) = Runtime::with_capture();
    let symbols = SymbolTable::new_child(&runtime.root(), "main");
    let code = Compiler::new("lib", &Settings::default())
        .compile("func add(a, b int) int { return a + b }\nfunc noop() {}")
        .unwrap();
    runtime.execute_in(code, &symbols).unwrap();

    let mut compiler = Compiler::new("expr", &Settings::default());
    let code = compiler.compile_expression("add(2, 3)").unwrap();
    let mut ctx = Context::new(&runtime, Arc::new(code), Arc::clone(&symbols));
    ctx.run().unwrap();
    assert_eq!(ctx.stack().len(), 1);
    assert_eq!(ctx.result(), Value::Int(5));

    // a void call leaves only its marker
    let code = compiler.compile_expression("noop()").unwrap();
    let mut ctx = Context::new(&runtime, Arc::new(code), symbols);
    ctx.run().unwrap();
    assert_eq!(ctx.stack().len(), 1);
    assert_eq!(ctx.result(), Value::Nil);
}

#[test]
fn test_try_records_are_released() {
    let (runtime, output) = Runtime::with_capture();
    let mut ctx = context(
        &runtime,
        "try { x := 1 } catch { print \"no\" }\n\
         try { panic(\"p\") } catch { print \"yes\" }\n\
         func f() { try { panic(\"q\") } catch { print \"inner\" } }\n\
         f()",
    );
    ctx.run().unwrap();
    assert_eq!(output.contents(), "yes\ninner\n");
    assert!(ctx.try_stack.is_empty());
}

#[test]
fn test_return_from_inside_try_discards_record() {
    let source = "func f() int {\n\
                  try { return 1 } catch { return 2 }\n\
                  return 3\n\
                  }\n\
                  print f()\n\
                  try { x := 1 / 0 } catch (e) { print \"outer\" }";
    assert_eq!(run(source), "1\nouter\n");
}

#[test]
fn test_nested_closures_capture_each_scope() {
    let source = "func adder(base int) func(int) int {\n\
                  return func(n int) int { return base + n }\n\
                  }\n\
                  add5 := adder(5)\n\
                  add10 := adder(10)\n\
                  print add5(1), add10(1), add5(2)";
    assert_eq!(run(source), "6 11 7\n");
}

#[test]
fn test_multiple_results() {
    let source = "func three() (int, string, bool) { return 1, \"a\", true }\n\
                  a, b, c := three()\n\
                  print c, b, a\n\
                  n, err := strconv.atoi(\"42\")\n\
                  print n, err\n\
                  _, err = strconv.atoi(\"x\")\n\
                  print err != nil";
    assert_eq!(run(source), "true a 1\n42 <nil>\ntrue\n");
}

#[test]
fn test_unconsumed_error_return_fails() {
    assert_eq!(run_error("n := strconv.atoi(\"x\")"), ErrorKind::UnusedErrorReturn);
    // a successful call in a single-value context is fine
    assert_eq!(run("n := strconv.atoi(\"7\")\nprint n + 1"), "8\n");
}

#[test]
fn test_strict_settings_reject_mixed_operands() {
    let settings = Settings {
        strictness: Strictness::Strict,
        ..Settings::default()
    };
    let (runtime, _) = Runtime::with_settings_capture(settings);
    let err = runtime.run("strict", "x := 1 + 1.5").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
    assert_eq!(run("x := 1 + 1.5\nprint x"), "2.5\n");
}

#[test]
fn test_debugger_suspends_and_resumes() {
    let (runtime, output) = Runtime::with_capture();
    let mut ctx = context(&runtime, "x := 1\nprint x\nx = 2\nprint x");
    ctx.debugger.set_breakpoint(3);

    let err = ctx.run().unwrap_err();
    assert_eq!(err.kind, ErrorKind::SignalDebugger);
    assert_eq!(ctx.state(), ContextState::Suspended);
    assert_eq!(ctx.line(), 3);
    assert_eq!(output.contents(), "1\n");

    ctx.debugger.clear_breakpoint(3);
    ctx.resume().unwrap();
    assert_eq!(ctx.state(), ContextState::Stopped);
    assert_eq!(output.contents(), "1\n2\n");
}

#[test]
fn test_single_step_visits_every_line() {
    let (runtime, _) = Runtime::with_capture();
    let mut ctx = context(&runtime, "a := 1\nb := 2\nc := a + b");
    ctx.debugger.set_single_step(true);
    let mut lines = Vec::new();
    let mut result = ctx.run();
    while result.is_err() {
        lines.push(ctx.line());
        result = ctx.resume();
    }
    assert_eq!(lines, vec![1, 2, 3]);
    assert_eq!(ctx.symbols().get("c"), Some(Value::Int(3)));
}

#[test]
fn test_stop_from_another_thread() {
    let (runtime, _) = Runtime::with_capture();
    let mut ctx = context(&runtime, "n := 0\nfor { n++ }");
    let handle = ctx.stop_handle();
    let watchdog = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.store(false, std::sync::atomic::Ordering::SeqCst);
    });
    ctx.run().unwrap();
    watchdog.join().unwrap();
    assert_eq!(ctx.state(), ContextState::Stopped);
}

#[test]
fn test_goroutines_with_wait_group_and_mutex() {
    let source = "var wg sync.WaitGroup\n\
                  var mu sync.Mutex\n\
                  total := 0\n\
                  for i := 1; i <= 4; i++ {\n\
                  wg.Add(1)\n\
                  go func(n int) {\n\
                  mu.Lock()\n\
                  total += n\n\
                  mu.Unlock()\n\
                  wg.Done()\n\
                  }(i)\n\
                  }\n\
                  wg.Wait()\n\
                  print total";
    assert_eq!(run(source), "10\n");
}

#[test]
fn test_channel_pipeline() {
    let source = "func produce(ch chan int) {\n\
                  for i := 0; i < 3; i++ { ch <- i * 10 }\n\
                  close(ch)\n\
                  }\n\
                  ch := make(chan int, 1)\n\
                  go produce(ch)\n\
                  for {\n\
                  v, ok := <-ch\n\
                  if !ok { break }\n\
                  print v\n\
                  }";
    assert_eq!(run(source), "0\n10\n20\n");
}

#[test]
fn test_goroutine_failure_does_not_stop_program() {
    let source = "go func() { panic(\"lost\") }()\nprint \"still here\"";
    assert_eq!(run(source), "still here\n");
}

#[test]
fn test_marker_surfacing_as_operand_fails() {
    assert_eq!(run_error("func f() {}\nx := f() + 1"), ErrorKind::VoidReturn);
}
