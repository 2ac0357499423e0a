//! The bytecode container and function declarations.

use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::bytecode::instruction::{Instruction, Operand};
use crate::bytecode::opcode::Opcode;
use crate::error::{Error, ErrorKind, Result};
use crate::value::{Type, Value};

/// Slots added whenever an emit runs past the allocated instructions.
pub const GROWTH_INCREMENT: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: Type,
}

/// Which table a called function's locals hang from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FunctionScope {
    /// The scope captured when the function value was created.
    #[default]
    Lexical,
    /// A boundary table under the caller's current scope.
    Caller,
}

/// Signature information for a compiled function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Declaration {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub returns: Vec<Type>,
    pub variadic: bool,
    pub receiver: Option<String>,
    pub scope: FunctionScope,
}

impl Declaration {
    pub fn min_args(&self) -> usize {
        if self.variadic {
            self.parameters.len().saturating_sub(1)
        } else {
            self.parameters.len()
        }
    }

    /// `None` when variadic.
    pub fn max_args(&self) -> Option<usize> {
        if self.variadic {
            None
        } else {
            Some(self.parameters.len())
        }
    }

    fn format_parameters(&self) -> String {
        let parts: Vec<String> = self
            .parameters
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if self.variadic && i + 1 == self.parameters.len() {
                    format!("{} ...{}", p.name, p.kind)
                } else {
                    format!("{} {}", p.name, p.kind)
                }
            })
            .collect();
        parts.join(", ")
    }

    fn format_returns(&self) -> String {
        match self.returns.len() {
            0 => String::new(),
            1 => format!(" {}", self.returns[0]),
            _ => {
                let parts: Vec<String> = self.returns.iter().map(ToString::to_string).collect();
                format!(" ({})", parts.join(", "))
            }
        }
    }

    /// The anonymous form, e.g. `func(n int) int`.
    pub fn signature(&self) -> String {
        format!("func({}){}", self.format_parameters(), self.format_returns())
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "func {}({}){}",
            self.name,
            self.format_parameters(),
            self.format_returns()
        )
    }
}

/// A linear instruction array under construction or ready to run.
#[derive(Debug, Clone)]
pub struct ByteCode {
    pub name: String,
    pub declaration: Option<Declaration>,
    instructions: Vec<Instruction>,
    next_address: usize,
    sealed: bool,
    /// Constants declared in this unit, by name.
    pub symbol_map: IndexMap<String, Value>,
    /// Owning package, or the source module for function bodies. Errors
    /// raised inside the code report this name.
    pub package: Option<String>,
}

impl ByteCode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaration: None,
            instructions: Vec::new(),
            next_address: 0,
            sealed: false,
            symbol_map: IndexMap::new(),
            package: None,
        }
    }

    /// Append an instruction and return its address.
    pub fn emit(&mut self, op: Opcode, operand: Operand) -> Result<usize> {
        if self.sealed {
            return Err(Error::new(ErrorKind::Sealed).context(&self.name));
        }
        if self.next_address >= self.instructions.len() {
            let size = self.instructions.len() + GROWTH_INCREMENT;
            self.instructions.resize(size, Instruction::noop());
        }
        let addr = self.next_address;
        self.instructions[addr] = Instruction::new(op, operand);
        self.next_address += 1;
        Ok(addr)
    }

    pub fn emit_op(&mut self, op: Opcode) -> Result<usize> {
        self.emit(op, Operand::None)
    }

    /// Overwrite an already emitted instruction.
    pub fn emit_at(&mut self, addr: usize, op: Opcode, operand: Operand) -> Result<()> {
        if self.sealed {
            return Err(Error::new(ErrorKind::Sealed).context(&self.name));
        }
        if addr >= self.next_address {
            return Err(Error::new(ErrorKind::InvalidAddress).context(addr));
        }
        self.instructions[addr] = Instruction::new(op, operand);
        Ok(())
    }

    /// The address the next emit will use.
    pub fn mark(&self) -> usize {
        self.next_address
    }

    /// Patch the address operand of the instruction at `mark`.
    pub fn set_address(&mut self, mark: usize, target: usize) -> Result<()> {
        if mark >= self.next_address || target > self.next_address {
            return Err(Error::new(ErrorKind::InvalidAddress).context(mark));
        }
        self.instructions[mark].operand = Operand::Address(target);
        Ok(())
    }

    pub fn set_address_here(&mut self, mark: usize) -> Result<()> {
        self.set_address(mark, self.next_address)
    }

    /// Copy another bytecode's instructions onto the end of this one,
    /// relocating branch targets by the current size.
    pub fn append(&mut self, other: &ByteCode) -> Result<()> {
        let offset = self.next_address;
        for instruction in other.instructions() {
            let operand = match (&instruction.operand, instruction.op.is_branch()) {
                (Operand::Address(target), true) => Operand::Address(target + offset),
                (operand, _) => operand.clone(),
            };
            self.emit(instruction.op, operand)?;
        }
        for (name, value) in &other.symbol_map {
            self.symbol_map.entry(name.clone()).or_insert_with(|| value.clone());
        }
        Ok(())
    }

    /// Delete one instruction, shifting later branch targets down.
    pub fn remove(&mut self, addr: usize) -> Result<()> {
        if addr >= self.next_address {
            return Err(Error::new(ErrorKind::InvalidAddress).context(addr));
        }
        self.instructions.remove(addr);
        self.next_address -= 1;
        for instruction in &mut self.instructions[..self.next_address] {
            if let (true, Operand::Address(target)) =
                (instruction.op.is_branch(), &mut instruction.operand)
            {
                if *target > addr {
                    *target -= 1;
                }
            }
        }
        Ok(())
    }

    pub fn instruction(&self, addr: usize) -> Option<&Instruction> {
        if addr < self.next_address {
            self.instructions.get(addr)
        } else {
            None
        }
    }

    /// The emitted instructions.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions[..self.next_address]
    }

    pub fn len(&self) -> usize {
        self.next_address
    }

    pub fn is_empty(&self) -> bool {
        self.next_address == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Allocated instruction slots, including unused growth.
    pub fn capacity(&self) -> usize {
        self.instructions.len()
    }

    /// Trim unreachable code and the unused tail, then forbid emission.
    pub fn seal(&mut self) {
        if self.sealed {
            return;
        }
        let before = self.next_address;
        self.trim_dead_code();
        self.instructions.truncate(self.next_address);
        self.sealed = true;
        debug!(
            target: "tern::bytecode",
            name = %self.name,
            instructions = self.next_address,
            trimmed = before - self.next_address,
            "sealed"
        );
    }

    fn is_branch_target(&self, addr: usize) -> bool {
        self.instructions().iter().any(|i| {
            i.op.is_branch() && matches!(i.operand, Operand::Address(target) if target == addr)
        })
    }

    /// Drop instructions that directly follow an unconditional transfer and
    /// that nothing branches to.
    fn trim_dead_code(&mut self) {
        let mut addr = 0;
        while addr + 1 < self.next_address {
            let terminal = matches!(
                self.instructions[addr].op,
                Opcode::Branch | Opcode::Return | Opcode::Stop
            );
            if terminal && !self.is_branch_target(addr + 1) {
                // remove() cannot fail for an in-range address
                let _ = self.remove(addr + 1);
            } else {
                addr += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ops(b: &ByteCode) -> Vec<Opcode> {
        b.instructions().iter().map(|i| i.op).collect()
    }

    #[test]
    fn test_emit_grows_by_increment() {
        let mut b = ByteCode::new("t");
        b.emit_op(Opcode::Drop).unwrap();
        assert_eq!(b.capacity(), GROWTH_INCREMENT);
        for _ in 0..GROWTH_INCREMENT {
            b.emit_op(Opcode::Drop).unwrap();
        }
        assert_eq!(b.capacity(), 2 * GROWTH_INCREMENT);
        assert_eq!(b.len(), GROWTH_INCREMENT + 1);
    }

    #[test]
    fn test_seal_truncates_and_rejects_emit() {
        let mut b = ByteCode::new("t");
        b.emit(Opcode::Push, Operand::Value(Value::Int(1))).unwrap();
        b.seal();
        b.seal();
        assert_eq!(b.capacity(), b.len());
        assert_eq!(b.emit_op(Opcode::Drop).unwrap_err().kind, ErrorKind::Sealed);
    }

    #[test]
    fn test_forward_patch() {
        let mut b = ByteCode::new("t");
        let fixup = b.emit(Opcode::BranchFalse, Operand::None).unwrap();
        b.emit_op(Opcode::Drop).unwrap();
        b.set_address_here(fixup).unwrap();
        assert_eq!(b.instruction(fixup).unwrap().operand, Operand::Address(2));
        assert!(b.set_address(10, 0).is_err());
    }

    #[test]
    fn test_append_relocates_branches() {
        let mut a = ByteCode::new("a");
        a.emit_op(Opcode::Drop).unwrap();
        a.emit_op(Opcode::Drop).unwrap();

        let mut b = ByteCode::new("b");
        b.emit(Opcode::Branch, Operand::Address(1)).unwrap();
        b.emit(Opcode::Push, Operand::Int(1)).unwrap();
        b.emit(Opcode::Try, Operand::Address(0)).unwrap();

        a.append(&b).unwrap();
        assert_eq!(a.instruction(2).unwrap().operand, Operand::Address(3));
        assert_eq!(a.instruction(3).unwrap().operand, Operand::Int(1));
        assert_eq!(a.instruction(4).unwrap().operand, Operand::Address(2));
    }

    #[test]
    fn test_remove_shifts_targets() {
        let mut b = ByteCode::new("t");
        b.emit(Opcode::Branch, Operand::Address(3)).unwrap();
        b.emit_op(Opcode::NoOperation).unwrap();
        b.emit_op(Opcode::Drop).unwrap();
        b.emit_op(Opcode::Stop).unwrap();
        b.remove(1).unwrap();
        assert_eq!(b.instruction(0).unwrap().operand, Operand::Address(2));
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn test_seal_trims_unreachable_code() {
        let mut b = ByteCode::new("t");
        b.emit(Opcode::Return, Operand::Int(1)).unwrap();
        b.emit(Opcode::Return, Operand::Int(0)).unwrap();
        b.seal();
        assert_eq!(ops(&b), vec![Opcode::Return]);
    }

    #[test]
    fn test_seal_keeps_branch_targets() {
        let mut b = ByteCode::new("t");
        b.emit(Opcode::BranchFalse, Operand::Address(3)).unwrap();
        b.emit(Opcode::Branch, Operand::Address(4)).unwrap();
        b.emit_op(Opcode::Drop).unwrap();
        b.emit_op(Opcode::Dup).unwrap();
        b.emit_op(Opcode::Stop).unwrap();
        b.seal();
        assert_eq!(
            ops(&b),
            vec![Opcode::BranchFalse, Opcode::Branch, Opcode::Dup, Opcode::Stop]
        );
        assert_eq!(b.instruction(0).unwrap().operand, Operand::Address(2));
        assert_eq!(b.instruction(1).unwrap().operand, Operand::Address(3));
    }

    #[test]
    fn test_declaration_display() {
        let decl = Declaration {
            name: "f".into(),
            parameters: vec![Parameter {
                name: "n".into(),
                kind: Type::of(crate::value::Kind::Int),
            }],
            returns: vec![Type::of(crate::value::Kind::Int)],
            ..Declaration::default()
        };
        assert_eq!(decl.to_string(), "func f(n int) int");
        assert_eq!(decl.signature(), "func(n int) int");
        assert_eq!(decl.max_args(), Some(1));
    }
}
