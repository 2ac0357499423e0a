//! `const name [T] = expr` and `const ( … )`.

use crate::bytecode::{Opcode, Operand};
use crate::compiler::Compiler;
use crate::error::{ErrorKind, Result};
use crate::value::Value;

impl Compiler {
    pub(super) fn const_statement(&mut self) -> Result<()> {
        self.t.next();
        if !self.t.is_next_consume("(") {
            return self.const_spec();
        }
        loop {
            if self.t.is_next_consume(")") {
                return Ok(());
            }
            if self.t.at_end() {
                return Err(self.error(ErrorKind::Missing(")")));
            }
            if self.t.is_next_consume(";") {
                continue;
            }
            self.const_spec()?;
        }
    }

    fn const_spec(&mut self) -> Result<()> {
        let name = self.identifier()?;
        let declared = if self.t.is_next("=") {
            None
        } else {
            Some(self.parse_type()?)
        };
        self.expect("=")?;
        let code = self.capture(|c| c.expression())?;

        // only literals, operators and earlier constants
        for instruction in code.instructions() {
            let allowed = match instruction.op {
                Opcode::Load => instruction
                    .operand
                    .as_name()
                    .is_some_and(|n| self.constants.contains(n)),
                Opcode::Call | Opcode::Member | Opcode::ClassMember | Opcode::SetThis => false,
                _ => true,
            };
            if !allowed {
                return Err(self.error(ErrorKind::InvalidConstant).context(&name));
            }
        }
        if let [only] = code.instructions() {
            if let (Opcode::Push, Operand::Value(value)) = (only.op, &only.operand) {
                self.unit.code.symbol_map.insert(name.clone(), value.clone());
            }
        }

        self.append(&code)?;
        if let Some(t) = declared.filter(|t| !t.is_interface()) {
            self.emit(Opcode::Coerce, Operand::Value(Value::Type(t)))?;
        }
        if !self.declare(&name) {
            return Err(self.error(ErrorKind::DuplicateDeclaration).context(&name));
        }
        if self.at_top_level() {
            self.exports.push(name.clone());
        }
        self.emit_name(Opcode::Constant, &name)?;
        self.constants.insert(name);
        Ok(())
    }
}
