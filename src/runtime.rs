//! The runtime handle shared by every context of one program.
//!
//! A [`Runtime`] owns the root symbol table with the builtins bound into it,
//! the output sink, the persisted profile store and the wait group that
//! goroutines join. Contexts hold an `Arc<Runtime>`; natives reach it
//! through their calling context.

use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, error};

use crate::builtins;
use crate::bytecode::ByteCode;
use crate::compiler::Compiler;
use crate::config::{ProfileStore, Settings};
use crate::error::{Error, ErrorKind, Result};
use crate::symbols::SymbolTable;
use crate::value::{Value, WaitGroup};
use crate::vm::Context;

/// An in-memory stdout shared with whoever created the runtime.
#[derive(Debug, Clone, Default)]
pub struct Capture(Arc<Mutex<String>>);

impl Capture {
    pub fn contents(&self) -> String {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn push(&self, text: &str) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push_str(text);
    }
}

enum Output {
    Stdout,
    Capture(Capture),
}

/// A compiled top level, plus whether `main` must be called afterwards.
pub struct Program {
    pub code: ByteCode,
    pub calls_main: bool,
}

pub struct Runtime {
    root: Arc<SymbolTable>,
    output: Output,
    goroutines: WaitGroup,
    spawned: AtomicUsize,
    pub settings: Settings,
    profile: Mutex<ProfileStore>,
    args: Vec<String>,
    exit_code: AtomicI32,
    exited: AtomicBool,
}

impl Runtime {
    /// A runtime writing to stdout.
    pub fn new(settings: Settings, profile: ProfileStore, args: Vec<String>) -> Arc<Self> {
        Self::build(settings, profile, args, Output::Stdout)
    }

    /// A runtime with default settings whose output lands in the returned
    /// buffer.
    pub fn with_capture() -> (Arc<Self>, Capture) {
        Self::with_settings_capture(Settings::default())
    }

    pub fn with_settings_capture(settings: Settings) -> (Arc<Self>, Capture) {
        let capture = Capture::default();
        let runtime = Self::build(
            settings,
            ProfileStore::in_memory(),
            Vec::new(),
            Output::Capture(capture.clone()),
        );
        (runtime, capture)
    }

    fn build(
        settings: Settings,
        profile: ProfileStore,
        args: Vec<String>,
        output: Output,
    ) -> Arc<Self> {
        let root = SymbolTable::new_root("root");
        builtins::register_builtins(&root);
        debug!(target: "tern::app", strictness = %settings.strictness, "runtime created");
        Arc::new(Self {
            root,
            output,
            goroutines: WaitGroup::new(),
            spawned: AtomicUsize::new(0),
            settings,
            profile: Mutex::new(profile),
            args,
            exit_code: AtomicI32::new(0),
            exited: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> Arc<SymbolTable> {
        Arc::clone(&self.root)
    }

    pub fn write(&self, text: &str) -> Result<()> {
        match &self.output {
            Output::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes())?;
                out.flush()?;
            }
            Output::Capture(capture) => capture.push(text),
        }
        Ok(())
    }

    pub fn profile(&self) -> MutexGuard<'_, ProfileStore> {
        self.profile.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Program arguments visible through `os.args`.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Record the process exit code; the program stops after this.
    pub fn set_exit_code(&self, code: i32) {
        self.exit_code.store(code, Ordering::SeqCst);
        self.exited.store(true, Ordering::SeqCst);
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }

    /// Compile a program's top level. `base_dir` anchors relative imports.
    pub fn compile(&self, module: &str, source: &str, base_dir: Option<&Path>) -> Result<Program> {
        let mut compiler = Compiler::new(module, &self.settings);
        if let Some(dir) = base_dir {
            compiler = compiler.with_base_dir(dir);
        }
        let code = compiler.compile(source)?;
        Ok(Program {
            code,
            calls_main: compiler.package() == Some("main") && compiler.has_main(),
        })
    }

    /// Compile and run source text, then wait for its goroutines.
    pub fn run(self: &Arc<Self>, module: &str, source: &str) -> Result<()> {
        let program = self.compile(module, source, None)?;
        self.run_program(program)
    }

    /// Run the top level in a fresh `main` scope, call `main` if the
    /// program declared one, then join every goroutine.
    pub fn run_program(self: &Arc<Self>, program: Program) -> Result<()> {
        let symbols = SymbolTable::new_child(&self.root, "main");
        let result = self.execute_in(program.code, &symbols).and_then(|_| {
            if !program.calls_main || self.exited.load(Ordering::SeqCst) {
                return Ok(());
            }
            match symbols.get("main") {
                Some(main) => self.call_function(&main, Vec::new(), None, &symbols).map(|_| ()),
                None => Ok(()),
            }
        });
        self.wait();
        result
    }

    /// Run sealed code in a new `main` scope under the root.
    pub fn execute(self: &Arc<Self>, code: ByteCode) -> Result<()> {
        let symbols = SymbolTable::new_child(&self.root, "main");
        self.execute_in(code, &symbols)
    }

    /// Run sealed code directly in `symbols`; the REPL keeps one table
    /// across lines this way.
    pub fn execute_in(self: &Arc<Self>, code: ByteCode, symbols: &Arc<SymbolTable>) -> Result<()> {
        let mut ctx = Context::new(self, Arc::new(code), Arc::clone(symbols));
        ctx.run()
    }

    /// Call any callable value from outside bytecode.
    pub fn call_function(
        self: &Arc<Self>,
        func: &Value,
        args: Vec<Value>,
        this: Option<Value>,
        symbols: &Arc<SymbolTable>,
    ) -> Result<Value> {
        if !func.is_callable() {
            return Err(Error::new(ErrorKind::InvalidFunctionCall).context(func.type_name()));
        }
        Context::invoke(self, symbols, func, args, this)
    }

    /// Evaluate one expression in `symbols`.
    pub fn eval(self: &Arc<Self>, source: &str, symbols: &Arc<SymbolTable>) -> Result<Value> {
        let mut compiler = Compiler::new("eval", &self.settings);
        let code = compiler.compile_expression(source)?;
        let mut ctx = Context::new(self, Arc::new(code), Arc::clone(symbols));
        ctx.run()?;
        Ok(ctx.result())
    }

    /// Launch `func` on its own thread against the root table. Failures are
    /// logged; nothing waits on an individual goroutine.
    pub fn spawn(self: &Arc<Self>, func: Value, args: Vec<Value>, this: Option<Value>) {
        if let Err(err) = self.goroutines.add(1) {
            error!(target: "tern::app", "goroutine not started: {}", err);
            return;
        }
        let id = self.spawned.fetch_add(1, Ordering::SeqCst) + 1;
        let runtime = Arc::clone(self);
        let launched = thread::Builder::new()
            .name(format!("goroutine-{}", id))
            .spawn(move || {
                debug!(target: "tern::app", id, "goroutine started");
                let root = runtime.root();
                if let Err(err) = Context::invoke(&runtime, &root, &func, args, this) {
                    let function = match &func {
                        Value::Function(f) => f.name().to_string(),
                        other => other.type_name(),
                    };
                    error!(target: "tern::app", id, %function, "goroutine failed: {}", err);
                }
                let _ = runtime.goroutines.done();
            });
        if let Err(err) = launched {
            error!(target: "tern::app", id, "goroutine not started: {}", err);
            let _ = self.goroutines.done();
        }
    }

    /// Block until every goroutine launched so far has finished.
    pub fn wait(&self) {
        self.goroutines.wait();
    }

    /// Goroutines still running.
    pub fn active_goroutines(&self) -> i64 {
        self.goroutines.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_main_is_called_after_top_level() {
        let (runtime, output) = Runtime::with_capture();
        let source = "package main\n\
                      print \"top\"\n\
                      func main() { print \"main\" }";
        runtime.run("prog", source).unwrap();
        assert_eq!(output.contents(), "top\nmain\n");
    }

    #[test]
    fn test_main_not_called_outside_main_package() {
        let (runtime, output) = Runtime::with_capture();
        runtime.run("prog", "func main() { print \"main\" }").unwrap();
        assert_eq!(output.contents(), "");
    }

    #[test]
    fn test_exit_skips_main() {
        let (runtime, output) = Runtime::with_capture();
        let source = "package main\n\
                      os.exit(4)\n\
                      func main() { print \"main\" }";
        runtime.run("prog", source).unwrap();
        assert_eq!(output.contents(), "");
        assert_eq!(runtime.exit_code(), 4);
    }

    #[test]
    fn test_runs_do_not_share_top_level_scope() {
        let (runtime, output) = Runtime::with_capture();
        runtime.run("one", "x := 1\nprint x").unwrap();
        runtime.run("two", "x := 2\nprint x").unwrap();
        assert_eq!(output.contents(), "1\n2\n");
        assert_eq!(runtime.root().get_local("x"), None);
    }

    #[test]
    fn test_call_function_rejects_non_callables() {
        let (runtime, _) = Runtime::with_capture();
        let err = runtime
            .call_function(&Value::Int(1), Vec::new(), None, &runtime.root())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidFunctionCall);
    }

    #[test]
    fn test_call_function_returns_results() {
        let (runtime, _) = Runtime::with_capture();
        let symbols = SymbolTable::new_child(&runtime.root(), "main");
        let code = runtime
            .compile("lib", "func pair(n int) (int, int) { return n, n * 2 }", None)
            .unwrap()
            .code;
        runtime.execute_in(code, &symbols).unwrap();
        let pair = symbols.get("pair").unwrap();
        let result = runtime
            .call_function(&pair, vec![Value::Int(3)], None, &symbols)
            .unwrap();
        let Value::Tuple(values) = result else {
            panic!("expected two results, got {}", result);
        };
        assert_eq!(values, vec![Value::Int(3), Value::Int(6)]);
    }

    #[test]
    fn test_invoked_failure_reports_callee_position() {
        let (runtime, _) = Runtime::with_capture();
        let symbols = SymbolTable::new_child(&runtime.root(), "main");
        let code = runtime
            .compile("worker", "x := 1\nfunc boom() {\n panic(\"lost\")\n}", None)
            .unwrap()
            .code;
        runtime.execute_in(code, &symbols).unwrap();
        let boom = symbols.get("boom").unwrap();
        let err = runtime
            .call_function(&boom, Vec::new(), None, &symbols)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Panic);
        assert_eq!(err.module.as_deref(), Some("worker"));
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_goroutines_are_joined() {
        let (runtime, output) = Runtime::with_capture();
        let source = "func work(ch chan int, n int) { ch.send(n * n) }\n\
                      ch := make(chan int, 4)\n\
                      for i := 1; i <= 3; i++ { go work(ch, i) }\n\
                      sum := 0\n\
                      for i := 0; i < 3; i++ { sum += ch.receive() }\n\
                      print sum";
        runtime.run("go", source).unwrap();
        assert_eq!(output.contents(), "14\n");
        assert_eq!(runtime.active_goroutines(), 0);
    }

    #[test]
    fn test_eval_uses_given_scope() {
        let (runtime, _) = Runtime::with_capture();
        let symbols = SymbolTable::new_child(&runtime.root(), "main");
        symbols.set_always("n", Value::Int(5));
        assert_eq!(runtime.eval("n * n", &symbols).unwrap(), Value::Int(25));
        assert!(runtime.eval("n +", &symbols).is_err());
    }
}
