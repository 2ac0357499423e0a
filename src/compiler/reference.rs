//! Primaries, literals and the postfix reference chain (`[i]`, `[lo:hi]`,
//! `.name`, `->name`, calls).

use crate::bytecode::{Opcode, Operand, CALL_SPREAD, CALL_THIS};
use crate::compiler::Compiler;
use crate::error::{ErrorKind, Result};
use crate::lexer::TokenClass;
use crate::value::{Kind, Type, Value};

impl Compiler {
    pub(super) fn reference(&mut self) -> Result<()> {
        self.primary()?;
        loop {
            if self.same_line() && self.t.is_next("[") {
                self.index_or_slice()?;
            } else if self.same_line() && self.t.is_next("(") {
                let (argc, flags) = self.arguments()?;
                self.emit_call(argc, flags)?;
            } else if self.t.is_next(".") || self.t.is_next("->") {
                let class = self.t.next().is("->");
                let name = self.identifier()?;
                let op = if class { Opcode::ClassMember } else { Opcode::Member };
                if self.same_line() && self.t.is_next("(") {
                    self.emit_op(Opcode::Dup)?;
                    self.emit_op(Opcode::SetThis)?;
                    self.emit_name(op, &name)?;
                    let (argc, flags) = self.arguments()?;
                    self.emit_call(argc, flags | CALL_THIS)?;
                } else {
                    self.emit_name(op, &name)?;
                }
            } else {
                return Ok(());
            }
        }
    }

    fn index_or_slice(&mut self) -> Result<()> {
        self.expect("[")?;
        let saved = std::mem::replace(&mut self.no_struct_literal, false);
        if self.t.is_next(":") {
            self.emit_value(Value::Int(0))?;
        } else {
            self.expression()?;
        }
        if self.t.is_next_consume(":") {
            if self.t.is_next("]") {
                // the container sits two slots below the len builtin
                self.emit_name(Opcode::Load, "len")?;
                self.emit(Opcode::ReadStack, Operand::Int(2))?;
                self.emit_call(1, 0)?;
            } else {
                self.expression()?;
            }
            self.expect("]")?;
            self.emit_op(Opcode::LoadSlice)?;
        } else {
            self.expect("]")?;
            self.emit_op(Opcode::LoadIndex)?;
        }
        self.no_struct_literal = saved;
        Ok(())
    }

    /// `(a, b, rest...)`: returns the argument count and call flags.
    pub(super) fn arguments(&mut self) -> Result<(usize, i64)> {
        self.expect("(")?;
        let saved = std::mem::replace(&mut self.no_struct_literal, false);
        let mut argc = 0;
        let mut flags = 0;
        while !self.t.is_next_consume(")") {
            if argc > 0 {
                self.expect(",")?;
                if self.t.is_next_consume(")") {
                    break;
                }
            }
            if flags & CALL_SPREAD != 0 {
                return Err(self.error(ErrorKind::UnexpectedToken));
            }
            self.expression()?;
            argc += 1;
            if self.t.is_next_consume("...") {
                self.emit_op(Opcode::Flatten)?;
                flags |= CALL_SPREAD;
            }
            if self.t.at_end() {
                return Err(self.error(ErrorKind::Missing(")")));
            }
        }
        self.no_struct_literal = saved;
        Ok((argc, flags))
    }

    fn primary(&mut self) -> Result<()> {
        let token = self.t.current().clone();
        match token.class {
            TokenClass::Integer => {
                self.t.next();
                let n = token
                    .spelling
                    .parse::<i64>()
                    .map_err(|_| self.error(ErrorKind::InvalidNumber).context(&token.spelling))?;
                self.emit_value(Value::Int(n))?;
            }
            TokenClass::Float => {
                self.t.next();
                let n = token
                    .spelling
                    .parse::<f64>()
                    .map_err(|_| self.error(ErrorKind::InvalidNumber).context(&token.spelling))?;
                self.emit_value(Value::Float64(n))?;
            }
            TokenClass::String => {
                self.t.next();
                self.emit_value(Value::String(token.spelling))?;
            }
            TokenClass::Boolean => {
                self.t.next();
                self.emit_value(Value::Bool(token.spelling == "true"))?;
            }
            TokenClass::Identifier => self.identifier_primary()?,
            TokenClass::Reserved => self.reserved_primary(&token.spelling)?,
            TokenClass::Punctuation if token.is("(") => {
                self.t.next();
                let saved = std::mem::replace(&mut self.no_struct_literal, false);
                self.expression()?;
                self.no_struct_literal = saved;
                self.expect(")")?;
            }
            TokenClass::Punctuation if token.is("[") => self.array_primary()?,
            TokenClass::Punctuation if token.is("{") => self.struct_literal()?,
            TokenClass::End => return Err(self.error(ErrorKind::UnexpectedEnd)),
            _ => return Err(self.error(ErrorKind::UnexpectedToken)),
        }
        Ok(())
    }

    fn reserved_primary(&mut self, word: &str) -> Result<()> {
        match word {
            "nil" => {
                self.t.next();
                self.emit_value(Value::Nil)?;
            }
            "func" => {
                self.t.next();
                self.function_literal()?;
            }
            "map" => {
                let t = self.parse_type()?;
                if self.t.is_next("{") {
                    self.map_literal(t)?;
                } else {
                    self.emit_value(Value::Type(t))?;
                }
            }
            "chan" | "interface" | "struct" => {
                let t = self.parse_type()?;
                self.emit_value(Value::Type(t))?;
            }
            _ => return Err(self.error(ErrorKind::ReservedWord)),
        }
        Ok(())
    }

    fn identifier_primary(&mut self) -> Result<()> {
        let name = self.identifier()?;
        if name == "panic" && self.t.is_next("(") {
            self.expect("(")?;
            self.expression()?;
            self.expect(")")?;
            self.emit_op(Opcode::Panic)?;
            return Ok(());
        }
        if self.struct_types.contains(&name) && self.t.is_next("{") && !self.no_struct_literal {
            return self.typed_struct_literal(&name);
        }
        self.emit_name(Opcode::Load, &name)?;
        Ok(())
    }

    /// `[a, b]`, `[]T{a, b}`, or the type `[]T` itself.
    fn array_primary(&mut self) -> Result<()> {
        let close = self.t.peek(2);
        let after = self.t.peek(3);
        let typed = close.is("]")
            && after.line == close.line
            && (after.is_identifier()
                || after.is("[")
                || after.is("*")
                || ["map", "chan", "interface", "struct", "func"].iter().any(|w| after.is(w)));
        if typed {
            let t = self.parse_type()?;
            if self.t.is_next("{") {
                let element = t.element_type();
                let count = self.element_list("{", "}")?;
                self.emit(
                    Opcode::Array,
                    Operand::Tuple(vec![
                        Operand::Int(count as i64),
                        Operand::Value(Value::Type(element)),
                    ]),
                )?;
            } else {
                self.emit_value(Value::Type(t))?;
            }
            return Ok(());
        }
        let count = self.element_list("[", "]")?;
        self.emit(Opcode::Array, Operand::Int(count as i64))?;
        Ok(())
    }

    /// Comma-separated expressions between delimiters; a trailing comma and
    /// line breaks are allowed.
    fn element_list(&mut self, open: &'static str, close: &'static str) -> Result<usize> {
        self.expect(open)?;
        let saved = std::mem::replace(&mut self.no_struct_literal, false);
        let mut count = 0;
        while !self.t.is_next_consume(close) {
            if self.t.at_end() {
                return Err(self.error(ErrorKind::Missing(close)));
            }
            if count > 0 {
                self.expect(",")?;
                if self.t.is_next_consume(close) {
                    break;
                }
            }
            self.expression()?;
            count += 1;
        }
        self.no_struct_literal = saved;
        Ok(count)
    }

    /// Key of a literal entry: a bare identifier is a field name.
    fn literal_key(&mut self) -> Result<()> {
        let token = self.t.current().clone();
        if token.is_identifier() && self.t.peek(2).is(":") {
            self.t.next();
            let key = self.spell(&token);
            self.emit_value(Value::String(key))?;
            return Ok(());
        }
        self.expression()
    }

    /// Parse `key: value` pairs up to `}`; returns the pair count.
    fn pairs(&mut self, mut entry: impl FnMut(&mut Self) -> Result<()>) -> Result<usize> {
        self.expect("{")?;
        let saved = std::mem::replace(&mut self.no_struct_literal, false);
        let mut count = 0;
        while !self.t.is_next_consume("}") {
            if self.t.at_end() {
                return Err(self.error(ErrorKind::Missing("}")));
            }
            if count > 0 {
                self.expect(",")?;
                if self.t.is_next_consume("}") {
                    break;
                }
            }
            entry(self)?;
            count += 1;
        }
        self.no_struct_literal = saved;
        Ok(count)
    }

    /// `{a: 1, "b": 2}`
    fn struct_literal(&mut self) -> Result<()> {
        let count = self.pairs(|c| {
            c.literal_key()?;
            c.expect(":")?;
            c.expression()
        })?;
        self.emit(Opcode::Struct, Operand::Int(count as i64))?;
        Ok(())
    }

    /// `map[K]V{k: v, …}`
    fn map_literal(&mut self, t: Type) -> Result<()> {
        let count = self.pairs(|c| {
            c.expression()?;
            c.expect(":")?;
            c.expression()
        })?;
        self.emit(
            Opcode::Struct,
            Operand::Tuple(vec![Operand::Int(count as i64), Operand::Value(Value::Type(t))]),
        )?;
        Ok(())
    }

    /// `Point{x: 1, y: 2}` or positional `Point{1, 2}`: a fresh instance of
    /// the type's model with each listed field stored in turn.
    fn typed_struct_literal(&mut self, name: &str) -> Result<()> {
        self.emit_name(Opcode::Load, "new")?;
        self.emit_name(Opcode::Load, name)?;
        self.emit_call(1, 0)?;
        let fields: Vec<String> = self
            .types
            .get(name)
            .and_then(|t| t.fields.as_ref())
            .map(|fields| fields.iter().map(|(f, _)| f.clone()).collect())
            .unwrap_or_default();
        let mut position = 0;
        self.pairs(|c| {
            let keyed = c.t.current().is_identifier() && c.t.peek(2).is(":");
            if keyed {
                c.literal_key()?;
                c.expect(":")?;
            } else {
                let Some(field) = fields.get(position) else {
                    return Err(c.error(ErrorKind::InvalidField));
                };
                c.emit_value(Value::String(field.clone()))?;
            }
            position += 1;
            c.expression()?;
            c.emit_op(Opcode::StoreIndex)?;
            Ok(())
        })?;
        Ok(())
    }
}

/// The zero value of a scalar type is a constant; aggregates are built at
/// run time so every declaration gets its own storage.
pub(super) fn constant_zero(t: &Type) -> Option<Value> {
    match t.kind {
        k if k.is_scalar() => Some(Value::zero(t)),
        Kind::Interface | Kind::Error | Kind::Function | Kind::Pointer | Kind::Channel => {
            Some(Value::Nil)
        }
        _ => None,
    }
}
