//! Bytecode: opcodes, instructions and the container the compiler fills.

pub mod chunk;
pub mod disassembler;
pub mod instruction;
pub mod opcode;

pub use chunk::{ByteCode, Declaration, FunctionScope, Parameter};
pub use disassembler::disassemble;
pub use instruction::{Instruction, Operand, CALL_MULTI, CALL_SPREAD, CALL_THIS};
pub use opcode::Opcode;
