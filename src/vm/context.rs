//! The execution context: one value stack, one instruction stream at a
//! time, and the dispatch loop that drives them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use crate::bytecode::{ByteCode, Opcode, Operand, CALL_MULTI, CALL_THIS};
use crate::config::Strictness;
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::Runtime;
use crate::symbols::SymbolTable;
use crate::value::{StackMarker, Value};
use crate::vm::debugger::Debugger;
use crate::vm::dispatch::DISPATCH;
use crate::vm::frame::TryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Created,
    Running,
    /// Paused by the debugger; `resume` continues.
    Suspended,
    Stopped,
}

pub struct Context {
    pub(crate) runtime: Arc<Runtime>,
    pub(crate) module: String,
    pub(crate) bytecode: Arc<ByteCode>,
    pub(crate) symbols: Arc<SymbolTable>,
    pub(crate) stack: Vec<Value>,
    pub(crate) pc: usize,
    /// Stack index of the current call frame record.
    pub(crate) fp: usize,
    /// Number of active bytecode calls.
    pub(crate) depth: usize,
    pub(crate) line: usize,
    pub(crate) try_stack: Vec<TryRecord>,
    pub(crate) this_stack: Vec<Value>,
    pub(crate) strictness: Strictness,
    pub(crate) timers: Vec<Instant>,
    pub debugger: Debugger,
    state: ContextState,
    running: Arc<AtomicBool>,
    trace: bool,
}

impl Context {
    pub fn new(runtime: &Arc<Runtime>, bytecode: Arc<ByteCode>, symbols: Arc<SymbolTable>) -> Self {
        let module = bytecode
            .package
            .clone()
            .unwrap_or_else(|| bytecode.name.clone());
        Self {
            runtime: Arc::clone(runtime),
            module,
            bytecode,
            symbols,
            stack: Vec::with_capacity(64),
            pc: 0,
            fp: 0,
            depth: 0,
            line: 0,
            try_stack: Vec::new(),
            this_stack: Vec::new(),
            strictness: runtime.settings.strictness,
            timers: Vec::new(),
            debugger: Debugger::new(),
            state: ContextState::Created,
            running: Arc::new(AtomicBool::new(false)),
            trace: runtime.settings.trace,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn set_trace(&mut self, on: bool) {
        self.trace = on;
    }

    /// Ask the context to stop at the next instruction boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// A handle another thread can use to stop this context.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn run(&mut self) -> Result<()> {
        self.run_from_address(0)
    }

    pub fn run_from_address(&mut self, address: usize) -> Result<()> {
        if address > self.bytecode.len() {
            return Err(Error::new(ErrorKind::InvalidAddress).context(address));
        }
        self.pc = address;
        self.running.store(true, Ordering::SeqCst);
        self.execute()
    }

    /// Continue after a debugger suspension.
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            ContextState::Created => self.run(),
            ContextState::Suspended => {
                self.running.store(true, Ordering::SeqCst);
                self.execute()
            }
            ContextState::Running | ContextState::Stopped => Ok(()),
        }
    }

    /// The value on top of the stack after a run; markers read as nil.
    pub fn result(&self) -> Value {
        match self.stack.last() {
            Some(Value::Marker(_)) | None => Value::Nil,
            Some(v) => v.clone(),
        }
    }

    fn execute(&mut self) -> Result<()> {
        self.state = ContextState::Running;
        loop {
            if !self.running.load(Ordering::Relaxed) {
                self.state = ContextState::Stopped;
                return Ok(());
            }
            let err = match self.step() {
                Ok(true) => continue,
                Ok(false) => {
                    self.state = ContextState::Stopped;
                    return Ok(());
                }
                Err(err) => err,
            };
            match err.kind {
                ErrorKind::Stop => {
                    self.state = ContextState::Stopped;
                    return Ok(());
                }
                ErrorKind::SignalDebugger => {
                    self.state = ContextState::Suspended;
                    return Err(err.locate(&self.module, self.line));
                }
                _ => {}
            }
            let err = err.locate(&self.module, self.line);
            if !self.catch(&err) {
                debug!(target: "tern::app", module = %self.module, line = self.line, "{}", err);
                self.state = ContextState::Stopped;
                return Err(err);
            }
        }
    }

    /// Execute one instruction. `Ok(false)` means the code ran off its end.
    fn step(&mut self) -> Result<bool> {
        let code = Arc::clone(&self.bytecode);
        let Some(instruction) = code.instruction(self.pc) else {
            if self.depth > 0 {
                crate::vm::call_ops::return_from_call(self, 0)?;
                return Ok(true);
            }
            return Ok(false);
        };
        if self.trace {
            trace!(
                target: "tern::trace",
                module = %self.module,
                pc = self.pc,
                sp = self.stack.len(),
                "{}",
                instruction
            );
        }
        self.pc += 1;
        DISPATCH[instruction.op as usize](self, &instruction.operand)
            .map(|_| true)
    }

    /// Route an error to the innermost unused `try` record. Records already
    /// used by a running catch block are discarded first.
    fn catch(&mut self, err: &Error) -> bool {
        while self.try_stack.last().is_some_and(|r| r.address.is_none()) {
            self.try_stack.pop();
        }
        let Some(record) = self.try_stack.last_mut() else {
            return false;
        };
        let Some(address) = record.address.take() else {
            return false;
        };
        let record = record.clone();
        debug!(target: "tern::app", address, "caught: {}", err.message());
        self.stack.truncate(record.sp);
        self.fp = record.fp;
        self.depth = record.depth;
        self.bytecode = record.bytecode;
        self.symbols = record.symbols;
        self.this_stack.truncate(record.this_len);
        self.module = record.module;
        self.line = record.line;
        self.pc = address;
        self.symbols.set_always("_error", Value::error(err.clone()));
        true
    }

    /// Index of the lowest stack slot the current frame may pop.
    fn base(&self) -> usize {
        if self.depth > 0 {
            self.fp + 1
        } else {
            0
        }
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> Result<Value> {
        if self.stack.len() <= self.base() {
            return Err(Error::new(ErrorKind::StackUnderflow));
        }
        self.stack
            .pop()
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow))
    }

    /// Pop a value an operator will use; a marker means a void call result.
    pub(crate) fn pop_value(&mut self) -> Result<Value> {
        match self.pop()? {
            Value::Marker(_) => Err(Error::new(ErrorKind::VoidReturn)),
            value => Ok(value),
        }
    }

    /// Pop `n` values, returned in push order.
    pub(crate) fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        if self.stack.len() < self.base() + n {
            return Err(Error::new(ErrorKind::StackUnderflow).context(n));
        }
        let values = self.stack.split_off(self.stack.len() - n);
        Ok(values)
    }

    pub(crate) fn peek(&self, offset: usize) -> Result<&Value> {
        let len = self.stack.len();
        if offset >= len.saturating_sub(self.base()) {
            return Err(Error::new(ErrorKind::StackUnderflow).context(offset));
        }
        Ok(&self.stack[len - 1 - offset])
    }

    /// Collect whatever a call with the multi flag left on the stack.
    fn take_results(&mut self) -> Value {
        let marker = self.stack.iter().rposition(
            |v| matches!(v, Value::Marker(m) if m.label == StackMarker::RESULTS),
        );
        match marker {
            Some(index) => {
                let mut values = self.stack.split_off(index + 1);
                self.stack.truncate(index);
                values.reverse();
                Value::Tuple(values)
            }
            None => match self.stack.pop() {
                Some(Value::Marker(_)) | None => Value::Nil,
                Some(value) => value,
            },
        }
    }

    /// Call a function value in a fresh context over `symbols`. Several
    /// results come back as a tuple, no result as nil.
    pub fn invoke(
        runtime: &Arc<Runtime>,
        symbols: &Arc<SymbolTable>,
        func: &Value,
        args: Vec<Value>,
        this: Option<Value>,
    ) -> Result<Value> {
        let argc = args.len() as i64;
        let mut code = ByteCode::new(format!("invoke {}", func.type_name()));
        if let Value::Function(f) = func {
            code.package = f.code.package.clone();
        }
        code.emit(Opcode::Push, Operand::Value(func.clone()))?;
        for arg in args {
            code.emit(Opcode::Push, Operand::Value(arg))?;
        }
        let mut flags = CALL_MULTI;
        if let Some(this) = this {
            code.emit(Opcode::Push, Operand::Value(this))?;
            code.emit_op(Opcode::SetThis)?;
            flags |= CALL_THIS;
        }
        code.emit(
            Opcode::Call,
            Operand::Tuple(vec![Operand::Int(argc), Operand::Int(flags)]),
        )?;
        code.emit_op(Opcode::Stop)?;
        code.seal();

        let mut ctx = Context::new(runtime, Arc::new(code), Arc::clone(symbols));
        ctx.run()?;
        Ok(ctx.take_results())
    }
}
