//! Bytecode VM for tern: a value stack, a dispatch table indexed by opcode,
//! and call frames kept on the stack itself.
//!
//! Handlers are grouped by concern into sibling modules; each one has the
//! same [`dispatch::Handler`] signature and is looked up by opcode number.

mod call_ops;
pub mod context;
mod data_ops;
pub mod debugger;
pub mod dispatch;
mod flow_ops;
pub mod frame;
mod io_ops;
mod math_ops;
mod scope_ops;
mod stack_ops;

#[cfg(test)]
mod tests;

pub use context::{Context, ContextState};
pub use debugger::Debugger;
pub use frame::{CallFrame, TryRecord};
