//! Source-to-bytecode compiler.
//!
//! Single pass: the compiler walks the token stream once and emits
//! instructions as it recognizes each construct. There is no syntax tree.
//! Forward branches are emitted with a placeholder address and patched once
//! the target is known.
//!
//! Statement families live in sibling files, each adding an `impl Compiler`
//! block the way the VM splits its handlers.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::path::PathBuf;

use tracing::debug;

use crate::bytecode::{ByteCode, Opcode, Operand, CALL_MULTI};
use crate::config::{Settings, Strictness};
use crate::error::{Error, ErrorKind, Result};
use crate::lexer::{Token, TokenClass, Tokenizer};
use crate::value::{StackMarker, Type, Value};

mod assignment;
mod constants;
mod control;
mod directives;
mod expressions;
mod functions;
mod packages;
mod reference;
mod statements;
mod types;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Breakable {
    Loop,
    Switch,
}

/// Fixups for one enclosing `for` or `switch`.
#[derive(Debug)]
struct LoopFrame {
    kind: Breakable,
    breaks: Vec<usize>,
    continues: Vec<usize>,
    /// Runtime scope depth at which the break target runs.
    scope_depth: usize,
    try_depth: usize,
}

/// Per-function compilation state. A nested function literal swaps in a
/// fresh unit and restores the outer one when its body is done.
#[derive(Debug)]
struct Unit {
    code: ByteCode,
    /// Names declared in each open block, innermost last.
    scopes: Vec<HashSet<String>>,
    loops: Vec<LoopFrame>,
    /// `PushScope`s currently open in this function.
    scope_depth: usize,
    /// `Try` records currently open in this function.
    try_depth: usize,
    last_line: usize,
    /// Declared result types of the function being compiled.
    returns: Option<Vec<Type>>,
    /// Names of declared results, for a bare `return`.
    named_results: Vec<String>,
}

impl Unit {
    fn new(name: &str) -> Self {
        Self {
            code: ByteCode::new(name),
            scopes: vec![HashSet::new()],
            loops: Vec::new(),
            scope_depth: 0,
            try_depth: 0,
            last_line: 0,
            returns: None,
            named_results: Vec::new(),
        }
    }
}

pub struct Compiler {
    module: String,
    t: Tokenizer,
    unit: Unit,
    /// User-declared type names.
    types: HashMap<String, Type>,
    /// The subset of `types` that are struct types with a model value.
    struct_types: HashSet<String>,
    /// Names declared with `const`, usable in later constant expressions.
    constants: HashSet<String>,
    strictness: Strictness,
    normalize: bool,
    package: Option<String>,
    has_main: bool,
    imported: HashSet<String>,
    base_dir: Option<PathBuf>,
    import_path: Vec<PathBuf>,
    /// Top-level names, exported when compiling an imported package.
    exports: Vec<String>,
    /// Echo expression statements (`Say`) for the interactive loop.
    repl: bool,
    /// Suppress `Name{…}` literals while parsing `if`/`for`/`switch` heads.
    no_struct_literal: bool,
    temp_counter: usize,
}

impl Compiler {
    pub fn new(module: &str, settings: &Settings) -> Self {
        Self {
            module: module.to_string(),
            t: Tokenizer::from_tokens(Vec::new(), ""),
            unit: Unit::new(module),
            types: HashMap::new(),
            struct_types: HashSet::new(),
            constants: HashSet::new(),
            strictness: settings.strictness,
            normalize: settings.normalize,
            package: None,
            has_main: false,
            imported: HashSet::new(),
            base_dir: None,
            import_path: settings.import_path.clone(),
            exports: Vec::new(),
            repl: false,
            no_struct_literal: false,
            temp_counter: 0,
        }
    }

    /// Directory that relative imports resolve against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn set_repl(&mut self, on: bool) {
        self.repl = on;
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// True once a top-level `func main` has been compiled.
    pub fn has_main(&self) -> bool {
        self.has_main
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Compile a sequence of statements. Declarations made by earlier
    /// calls stay visible, which is what the interactive loop relies on.
    pub fn compile(&mut self, source: &str) -> Result<ByteCode> {
        self.compile_statements(source)?;
        self.finish()
    }

    /// Compile into the current unit without sealing it.
    fn compile_statements(&mut self, source: &str) -> Result<()> {
        self.t = Tokenizer::new(source).map_err(|e| e.in_module(&self.module))?;
        self.unit.code = ByteCode::new(self.module.as_str());
        self.unit.last_line = 0;
        while !self.t.at_end() {
            self.statement()?;
        }
        Ok(())
    }

    /// Compile a single expression that leaves its value on the stack.
    pub fn compile_expression(&mut self, source: &str) -> Result<ByteCode> {
        self.t = Tokenizer::new(source).map_err(|e| e.in_module(&self.module))?;
        self.unit.code = ByteCode::new(self.module.as_str());
        self.emit(Opcode::AtLine, Operand::Int(self.t.line() as i64))?;
        self.expression()?;
        if !self.t.at_end() {
            return Err(self.error(ErrorKind::UnexpectedToken));
        }
        self.finish()
    }

    fn finish(&mut self) -> Result<ByteCode> {
        let mut code = mem::replace(&mut self.unit.code, ByteCode::new(self.module.as_str()));
        code.package = self.package.clone();
        code.seal();
        debug!(
            target: "tern::compiler",
            module = %self.module,
            instructions = code.len(),
            "compiled"
        );
        Ok(code)
    }

    // --- emission ---

    fn emit(&mut self, op: Opcode, operand: Operand) -> Result<usize> {
        self.unit.code.emit(op, operand)
    }

    fn emit_op(&mut self, op: Opcode) -> Result<usize> {
        self.unit.code.emit_op(op)
    }

    fn emit_name(&mut self, op: Opcode, name: &str) -> Result<usize> {
        self.emit(op, Operand::Name(name.to_string()))
    }

    fn emit_value(&mut self, value: Value) -> Result<usize> {
        self.emit(Opcode::Push, Operand::Value(value))
    }

    /// Emit a branch whose target is patched later.
    fn emit_fixup(&mut self, op: Opcode) -> Result<usize> {
        self.emit(op, Operand::Address(0))
    }

    fn emit_branch_to(&mut self, op: Opcode, target: usize) -> Result<usize> {
        self.emit(op, Operand::Address(target))
    }

    fn mark(&self) -> usize {
        self.unit.code.mark()
    }

    fn patch_here(&mut self, fixup: usize) -> Result<()> {
        self.unit.code.set_address_here(fixup)
    }

    fn patch(&mut self, fixup: usize, target: usize) -> Result<()> {
        self.unit.code.set_address(fixup, target)
    }

    fn emit_marker(&mut self, label: &str) -> Result<usize> {
        self.emit_value(Value::Marker(StackMarker::new(label, 0)))
    }

    fn emit_drop_to_marker(&mut self, label: &str) -> Result<usize> {
        self.emit_name(Opcode::DropToMarker, label)
    }

    /// `Call` with an argument count and flags.
    fn emit_call(&mut self, argc: usize, flags: i64) -> Result<usize> {
        if flags == 0 {
            return self.emit(Opcode::Call, Operand::Int(argc as i64));
        }
        self.emit(
            Opcode::Call,
            Operand::Tuple(vec![Operand::Int(argc as i64), Operand::Int(flags)]),
        )
    }

    /// Compile into a scratch buffer and hand it back instead of emitting.
    fn capture(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<ByteCode> {
        let saved = mem::replace(&mut self.unit.code, ByteCode::new("scratch"));
        let result = f(self);
        let captured = mem::replace(&mut self.unit.code, saved);
        result.map(|_| captured)
    }

    fn append(&mut self, code: &ByteCode) -> Result<()> {
        self.unit.code.append(code)
    }

    /// If the last emitted instruction is a call, ask it for every result.
    fn request_multiple_results(&mut self) -> Result<bool> {
        let Some(last) = self.mark().checked_sub(1) else {
            return Ok(false);
        };
        let Some(instruction) = self.unit.code.instruction(last).cloned() else {
            return Ok(false);
        };
        if instruction.op != Opcode::Call {
            return Ok(false);
        }
        let (argc, flags) = statements::call_parts(&instruction.operand);
        self.unit.code.emit_at(
            last,
            Opcode::Call,
            Operand::Tuple(vec![
                Operand::Int(argc as i64),
                Operand::Int(flags | CALL_MULTI),
            ]),
        )?;
        Ok(true)
    }

    /// Record the source line of the statement about to be compiled.
    fn at_line(&mut self) -> Result<()> {
        let line = self.t.current().line;
        if line > 0 && line != self.unit.last_line {
            self.emit(Opcode::AtLine, Operand::Int(line as i64))?;
            self.unit.last_line = line;
        }
        Ok(())
    }

    // --- tokens ---

    fn error(&self, kind: ErrorKind) -> Error {
        let token = self.t.current();
        let err = Error::new(kind).in_module(&self.module);
        let err = if token.is_end() {
            err.at(self.t.previous().line, self.t.previous().column)
        } else {
            err.at(token.line, token.column)
        };
        if token.spelling.is_empty() {
            err
        } else {
            err.context(&token.spelling)
        }
    }

    /// Consume `text` or fail with a "missing" error.
    fn expect(&mut self, text: &'static str) -> Result<()> {
        if self.t.is_next_consume(text) {
            Ok(())
        } else {
            Err(self.error(ErrorKind::Missing(text)))
        }
    }

    fn identifier(&mut self) -> Result<String> {
        let token = self.t.current().clone();
        match token.class {
            TokenClass::Identifier => {
                self.t.next();
                Ok(self.spell(&token))
            }
            TokenClass::Reserved => Err(self.error(ErrorKind::ReservedWord)),
            TokenClass::End => Err(self.error(ErrorKind::UnexpectedEnd)),
            _ => Err(self.error(ErrorKind::InvalidSymbolName)),
        }
    }

    fn spell(&self, token: &Token) -> String {
        if self.normalize {
            token.spelling.to_lowercase()
        } else {
            token.spelling.clone()
        }
    }

    /// The next token starts on the line of the one just consumed.
    fn same_line(&self) -> bool {
        !self.t.at_end() && self.t.current().line == self.t.previous().line
    }

    /// Nothing else belongs to the current statement.
    fn at_statement_end(&self) -> bool {
        self.t.at_end() || self.t.is_any_next(&[";", "}"]) || !self.same_line()
    }

    fn temp_name(&mut self, prefix: &str) -> String {
        self.temp_counter += 1;
        format!("${}_{}", prefix, self.temp_counter)
    }

    // --- scopes ---

    /// Note `name` as declared in the innermost block; false if it was
    /// already declared there.
    fn declare(&mut self, name: &str) -> bool {
        match self.unit.scopes.last_mut() {
            Some(scope) => scope.insert(name.to_string()),
            None => true,
        }
    }

    fn is_declared_here(&self, name: &str) -> bool {
        self.unit
            .scopes
            .last()
            .is_some_and(|scope| scope.contains(name))
    }

    fn push_scope(&mut self) -> Result<()> {
        self.emit_op(Opcode::PushScope)?;
        self.unit.scopes.push(HashSet::new());
        self.unit.scope_depth += 1;
        Ok(())
    }

    fn pop_scope(&mut self) -> Result<()> {
        self.emit(Opcode::PopScope, Operand::Int(1))?;
        self.unit.scopes.pop();
        self.unit.scope_depth = self.unit.scope_depth.saturating_sub(1);
        Ok(())
    }

    fn at_top_level(&self) -> bool {
        self.unit.returns.is_none() && self.unit.scopes.len() == 1
    }
}
