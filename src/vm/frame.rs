//! Records the VM keeps while calling functions and guarding `try` blocks.

use std::sync::Arc;

use crate::bytecode::ByteCode;
use crate::symbols::SymbolTable;

/// Caller state saved on the value stack when a bytecode function is called.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub module: String,
    pub line: usize,
    pub symbols: Arc<SymbolTable>,
    pub bytecode: Arc<ByteCode>,
    /// Return address in the caller.
    pub pc: usize,
    pub fp: usize,
    pub this_len: usize,
    /// The caller consumes every result.
    pub multi: bool,
}

/// An active `try` block. The catch path restores everything captured here.
#[derive(Debug, Clone)]
pub struct TryRecord {
    /// Catch address; `None` once the record has been used.
    pub address: Option<usize>,
    pub sp: usize,
    pub fp: usize,
    pub depth: usize,
    pub bytecode: Arc<ByteCode>,
    pub symbols: Arc<SymbolTable>,
    pub this_len: usize,
    pub module: String,
    pub line: usize,
}
