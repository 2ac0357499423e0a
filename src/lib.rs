//! Tern: an embeddable scripting runtime for a small Go-like language.
//!
//! Source text is tokenized and compiled in a single pass into bytecode,
//! which a stack VM executes through a dispatch table indexed by opcode.
//!
//! # Embedding
//!
//! ```no_run
//! use tern::Runtime;
//!
//! let (runtime, output) = Runtime::with_capture();
//! runtime.run("hello", "print \"hi\"").unwrap();
//! assert_eq!(output.contents(), "hi\n");
//! ```

#![allow(clippy::module_inception)]
#![allow(clippy::result_large_err)]
#![allow(clippy::new_without_default)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::too_many_arguments)]

pub mod builtins;
pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod error;
pub mod lexer;
pub mod logging;
pub mod runtime;
pub mod symbols;
pub mod template;
pub mod value;
pub mod vm;

pub use bytecode::{disassemble, ByteCode, Opcode};
pub use compiler::Compiler;
pub use config::{ProfileStore, Settings, Strictness};
pub use error::{Error, ErrorKind, Result};
pub use runtime::{Capture, Program, Runtime};
pub use symbols::SymbolTable;
pub use value::Value;
pub use vm::Context;
