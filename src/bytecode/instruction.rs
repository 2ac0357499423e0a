//! Instructions and their operands.

use std::fmt;

use crate::bytecode::opcode::Opcode;
use crate::value::Value;

/// `Call` flag: the last argument was flattened and a count follows it.
pub const CALL_SPREAD: i64 = 1;
/// `Call` flag: the caller consumes every result, not just the first.
pub const CALL_MULTI: i64 = 2;
/// `Call` flag: a receiver was pushed with `SetThis`.
pub const CALL_THIS: i64 = 4;

/// The immediate attached to an instruction.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Operand {
    #[default]
    None,
    Int(i64),
    Address(usize),
    Name(String),
    Value(Value),
    Tuple(Vec<Operand>),
}

impl Operand {
    pub fn name(name: impl Into<String>) -> Self {
        Operand::Name(name.into())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Operand::Int(n) => Some(*n),
            Operand::Address(a) => Some(*a as i64),
            Operand::Value(v) => v.as_int(),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<usize> {
        match self {
            Operand::Address(a) => Some(*a),
            Operand::Int(n) if *n >= 0 => Some(*n as usize),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(s) => Some(s),
            Operand::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Operand]> {
        match self {
            Operand::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Operand::None)
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Name(s.to_string())
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Operand::Name(s)
    }
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Operand::Int(n)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Int(n) => write!(f, "{}", n),
            Operand::Address(a) => write!(f, "@{}", a),
            Operand::Name(s) => f.write_str(s),
            Operand::Value(v) => f.write_str(&v.format_nested()),
            Operand::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: Opcode,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(op: Opcode, operand: Operand) -> Self {
        Self { op, operand }
    }

    pub fn noop() -> Self {
        Self::new(Opcode::NoOperation, Operand::None)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operand.is_none() {
            f.write_str(self.op.name())
        } else {
            write!(f, "{:<18} {}", self.op.name(), self.operand)
        }
    }
}
