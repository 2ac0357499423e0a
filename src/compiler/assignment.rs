//! Assignment statements: `=`, `:=`, the compound operators, `++` and `--`,
//! and their multi-target forms.

use crate::bytecode::{ByteCode, Opcode, Operand};
use crate::compiler::Compiler;
use crate::error::{ErrorKind, Result};
use crate::lexer::TokenClass;
use crate::value::{StackMarker, Value};

/// A storage target parsed ahead of the value it receives.
enum LValue {
    Name(String),
    /// `container[index]` or `container.field`, as code that pushes each part.
    Element { container: ByteCode, index: ByteCode },
}

/// The last accessor of a target chain, not yet applied.
enum Accessor {
    Index(ByteCode),
    Field(String),
}

impl Compiler {
    pub(super) fn assignment(&mut self) -> Result<()> {
        let mut targets = vec![self.lvalue()?];
        while self.t.is_next_consume(",") {
            targets.push(self.lvalue()?);
        }
        let op = self.t.next();
        match op.spelling.as_str() {
            "++" | "--" if op.class == TokenClass::Punctuation => {
                let [target] = targets.as_slice() else {
                    return Err(self.error(ErrorKind::InvalidAssignment));
                };
                self.emit_load(target)?;
                self.emit_value(Value::Int(1))?;
                self.emit_op(if op.spelling == "++" { Opcode::Add } else { Opcode::Sub })?;
                self.emit_store(target, false)
            }
            "+=" | "-=" | "*=" | "/=" => {
                let [target] = targets.as_slice() else {
                    return Err(self.error(ErrorKind::InvalidAssignment));
                };
                self.emit_load(target)?;
                self.expression()?;
                self.emit_op(match op.spelling.as_str() {
                    "+=" => Opcode::Add,
                    "-=" => Opcode::Sub,
                    "*=" => Opcode::Mul,
                    _ => Opcode::Div,
                })?;
                self.emit_store(target, false)
            }
            ":=" => self.assign_values(targets, true),
            "=" => self.assign_values(targets, false),
            _ => {
                self.t.advance(-1);
                Err(self.error(ErrorKind::InvalidAssignment))
            }
        }
    }

    fn assign_values(&mut self, targets: Vec<LValue>, define: bool) -> Result<()> {
        let creates = if define {
            self.new_names(&targets)?
        } else {
            Vec::new()
        };

        if let [target] = targets.as_slice() {
            self.expression()?;
            return self.emit_store(target, creates.first().copied().unwrap_or(false));
        }

        self.emit_marker(StackMarker::LET)?;
        let count = self.expression_list()?;
        let from_call = count == 1 && self.request_multiple_results()?;
        if !from_call && count != targets.len() {
            return Err(self.error(ErrorKind::InvalidAssignment)
                .context(format!("{} targets, {} values", targets.len(), count)));
        }
        let create = |i: usize| creates.get(i).copied().unwrap_or(false);
        if from_call {
            for (i, target) in targets.iter().enumerate() {
                self.emit_store(target, create(i))?;
            }
        } else {
            for (i, target) in targets.iter().enumerate().rev() {
                self.emit_store(target, create(i))?;
            }
        }
        self.emit_drop_to_marker(StackMarker::LET)?;
        Ok(())
    }

    /// For `:=`, which targets are new in this block. At least one must be.
    fn new_names(&mut self, targets: &[LValue]) -> Result<Vec<bool>> {
        let mut creates = Vec::with_capacity(targets.len());
        for target in targets {
            let LValue::Name(name) = target else {
                return Err(self.error(ErrorKind::InvalidAssignment));
            };
            creates.push(name != "_" && !self.is_declared_here(name));
        }
        if !creates.iter().any(|c| *c) {
            return Err(self.error(ErrorKind::DuplicateDeclaration));
        }
        for target in targets {
            if let LValue::Name(name) = target {
                if name != "_" && self.declare(name) && self.at_top_level() {
                    self.exports.push(name.clone());
                }
            }
        }
        Ok(creates)
    }

    fn lvalue(&mut self) -> Result<LValue> {
        // `*p = v` stores through the name
        self.t.is_next_consume("*");
        let name = self.identifier()?;
        if !self.t.is_any_next(&["[", "."]) {
            return Ok(LValue::Name(name));
        }
        let mut container = ByteCode::new("lvalue");
        container.emit(Opcode::Load, Operand::Name(name))?;
        let mut pending: Option<Accessor> = None;
        loop {
            let accessor = if self.t.is_next_consume("[") {
                let index = self.capture(|c| c.expression())?;
                self.expect("]")?;
                Accessor::Index(index)
            } else if self.t.is_next_consume(".") {
                Accessor::Field(self.identifier()?)
            } else {
                break;
            };
            match pending.replace(accessor) {
                Some(Accessor::Index(index)) => {
                    container.append(&index)?;
                    container.emit_op(Opcode::LoadIndex)?;
                }
                Some(Accessor::Field(field)) => {
                    container.emit(Opcode::Member, Operand::Name(field))?;
                }
                None => {}
            }
        }
        let index = match pending {
            Some(Accessor::Index(index)) => index,
            Some(Accessor::Field(field)) => {
                let mut index = ByteCode::new("lvalue");
                index.emit(Opcode::Push, Operand::Value(Value::String(field)))?;
                index
            }
            None => return Err(self.error(ErrorKind::InvalidAssignment)),
        };
        Ok(LValue::Element { container, index })
    }

    fn emit_load(&mut self, target: &LValue) -> Result<()> {
        match target {
            LValue::Name(name) => {
                self.emit_name(Opcode::Load, name)?;
            }
            LValue::Element { container, index } => {
                self.append(container)?;
                self.append(index)?;
                self.emit_op(Opcode::LoadIndex)?;
            }
        }
        Ok(())
    }

    /// Store the top of stack into `target`, consuming it.
    fn emit_store(&mut self, target: &LValue, create: bool) -> Result<()> {
        match target {
            LValue::Name(name) if name == "_" => {
                self.emit_op(Opcode::Drop)?;
            }
            LValue::Name(name) => {
                if create {
                    self.emit_name(Opcode::SymbolCreate, name)?;
                }
                self.emit_name(Opcode::Store, name)?;
            }
            LValue::Element { container, index } => {
                self.append(container)?;
                self.append(index)?;
                self.emit(Opcode::ReadStack, Operand::Int(2))?;
                self.emit_op(Opcode::StoreIndex)?;
                self.emit(Opcode::Drop, Operand::Int(2))?;
            }
        }
        Ok(())
    }
}
