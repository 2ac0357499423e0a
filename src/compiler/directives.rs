//! `@` directives.

use crate::bytecode::{Opcode, Operand};
use crate::compiler::Compiler;
use crate::config::Strictness;
use crate::error::{ErrorKind, Result};
use crate::lexer::TokenClass;
use crate::value::Value;

impl Compiler {
    pub(super) fn directive(&mut self) -> Result<()> {
        self.expect("@")?;
        let token = self.t.current().clone();
        // `@type` names a reserved word
        if !token.is_identifier() && token.class != TokenClass::Reserved {
            return Err(self.error(ErrorKind::InvalidDirective));
        }
        self.t.next();
        match token.spelling.to_lowercase().as_str() {
            "type" => {
                let level = self.t.next();
                let strictness: Strictness = level.spelling.parse().map_err(|_| {
                    self.t.advance(-1);
                    self.error(ErrorKind::InvalidDirective).context(&level.spelling)
                })?;
                self.strictness = strictness;
                self.emit(Opcode::StaticTyping, Operand::Int(strictness.level()))?;
            }
            "template" => {
                let name = self.identifier()?;
                self.expression()?;
                self.emit_name(Opcode::Template, &name)?;
                self.create_and_store(&name)?;
            }
            "log" => {
                let class = self.identifier()?;
                self.expression()?;
                self.emit_name(Opcode::Log, &class)?;
            }
            "timer" => match self.t.next().spelling.as_str() {
                "start" => {
                    self.emit(Opcode::Timer, Operand::Int(0))?;
                }
                "stop" => {
                    self.emit(Opcode::Timer, Operand::Int(1))?;
                    self.emit_op(Opcode::Say)?;
                }
                _ => {
                    self.t.advance(-1);
                    return Err(self.error(ErrorKind::InvalidDirective));
                }
            },
            "global" => {
                let name = self.identifier()?;
                self.emit_name(Opcode::Load, "$global")?;
                self.emit_value(Value::String(name))?;
                self.expression()?;
                self.emit_call(2, 0)?;
                self.emit_op(Opcode::Drop)?;
            }
            "error" => {
                self.expression()?;
                self.emit_op(Opcode::Panic)?;
            }
            "say" => {
                self.expression()?;
                self.emit_op(Opcode::Say)?;
            }
            _ => {
                self.t.advance(-1);
                return Err(self.error(ErrorKind::InvalidDirective));
            }
        }
        Ok(())
    }
}
