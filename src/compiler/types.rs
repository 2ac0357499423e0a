//! Type expressions and `type` declarations.

use crate::bytecode::{Opcode, Operand};
use crate::compiler::reference::constant_zero;
use crate::compiler::Compiler;
use crate::error::{ErrorKind, Result};
use crate::value::{Kind, Type, Value};

impl Compiler {
    /// Parse a type expression at the cursor.
    pub(super) fn parse_type(&mut self) -> Result<Type> {
        let token = self.t.current().clone();
        if token.is("[") {
            self.t.next();
            self.expect("]")?;
            return Ok(Type::array_of(self.parse_type()?));
        }
        if token.is("*") {
            self.t.next();
            return Ok(Type::pointer_to(self.parse_type()?));
        }
        if token.is("map") {
            self.t.next();
            self.expect("[")?;
            let key = self.parse_type()?;
            self.expect("]")?;
            let value = self.parse_type()?;
            return Ok(Type::map_of(key, value));
        }
        if token.is("chan") {
            self.t.next();
            return Ok(Type::channel_of(self.parse_type()?));
        }
        if token.is("interface") {
            self.t.next();
            self.expect("{")?;
            self.expect("}")?;
            return Ok(Type::interface());
        }
        if token.is("struct") {
            self.t.next();
            return Ok(Type::struct_of(self.struct_fields()?));
        }
        if token.is("func") {
            self.t.next();
            self.skip_signature()?;
            return Ok(Type::of(Kind::Function));
        }
        if !token.is_identifier() {
            return Err(self.error(ErrorKind::InvalidTypeSpec));
        }
        let name = self.spell(&token);
        self.t.next();
        if name == "sync" && self.t.is_next_consume(".") {
            return match self.t.next().spelling.as_str() {
                "WaitGroup" => Ok(Type::of(Kind::WaitGroup)),
                "Mutex" => Ok(Type::of(Kind::Mutex)),
                _ => {
                    self.t.advance(-1);
                    Err(self.error(ErrorKind::InvalidTypeSpec))
                }
            };
        }
        if let Some(t) = Type::from_name(&name) {
            return Ok(t);
        }
        match self.types.get(&name) {
            Some(t) => Ok(t.clone()),
            None => {
                self.t.advance(-1);
                Err(self.error(ErrorKind::InvalidTypeSpec))
            }
        }
    }

    /// Skip the parameter and result lists of a `func(…) …` type.
    fn skip_signature(&mut self) -> Result<()> {
        self.skip_balanced("(", ")")?;
        if !self.same_line() || self.t.is_any_next(&["{", ",", ")", "]", ";", "}", "="]) {
            return Ok(());
        }
        if self.t.is_next("(") {
            return self.skip_balanced("(", ")");
        }
        self.parse_type().map(|_| ())
    }

    fn skip_balanced(&mut self, open: &'static str, close: &'static str) -> Result<()> {
        self.expect(open)?;
        let mut depth = 1;
        while depth > 0 {
            if self.t.at_end() {
                return Err(self.error(ErrorKind::Missing(close)));
            }
            let token = self.t.next();
            if token.is(open) {
                depth += 1;
            } else if token.is(close) {
                depth -= 1;
            }
        }
        Ok(())
    }

    /// `{ a, b int; c string }` with `;` or line breaks between fields.
    fn struct_fields(&mut self) -> Result<Vec<(String, Type)>> {
        self.expect("{")?;
        let mut fields: Vec<(String, Type)> = Vec::new();
        loop {
            if self.t.is_next_consume("}") {
                return Ok(fields);
            }
            if self.t.is_next_consume(";") {
                continue;
            }
            if self.t.at_end() {
                return Err(self.error(ErrorKind::Missing("}")));
            }
            let mut names = vec![self.identifier()?];
            while self.t.is_next_consume(",") {
                names.push(self.identifier()?);
            }
            let t = self.parse_type()?;
            for name in names {
                if fields.iter().any(|(existing, _)| *existing == name) {
                    return Err(self.error(ErrorKind::DuplicateDeclaration).context(name));
                }
                fields.push((name, t.clone()));
            }
        }
    }

    /// Push the zero value of `t`. Aggregates are built by `new` at run
    /// time so that each declaration gets its own storage.
    pub(super) fn emit_zero(&mut self, t: &Type) -> Result<()> {
        if let Some(zero) = constant_zero(t) {
            self.emit_value(zero)?;
            return Ok(());
        }
        self.emit_name(Opcode::Load, "new")?;
        match t.name.as_ref().filter(|name| self.struct_types.contains(*name)) {
            Some(name) => self.emit_name(Opcode::Load, name)?,
            None => self.emit_value(Value::Type(t.clone()))?,
        };
        self.emit_call(1, 0)?;
        Ok(())
    }

    /// `type Name [struct] [-> Parent] { fields }` or `type Name T`.
    pub(super) fn type_statement(&mut self) -> Result<()> {
        self.t.next();
        let name = self.identifier()?;
        let is_struct = self.t.is_next_consume("struct") || self.t.is_any_next(&["{", "->"]);
        if !is_struct {
            let t = self.parse_type()?.named(name.as_str());
            self.types.insert(name.clone(), t.clone());
            self.emit_value(Value::Type(t))?;
            return self.create_and_store(&name);
        }

        let parent = if self.t.is_next_consume("->") {
            Some(self.identifier()?)
        } else {
            None
        };
        let mut fields = match parent.as_ref().and_then(|p| self.types.get(p)) {
            Some(t) => t.fields.clone().unwrap_or_default(),
            None => Vec::new(),
        };
        for (field, t) in self.struct_fields()? {
            fields.retain(|(existing, _)| *existing != field);
            fields.push((field, t));
        }
        let t = Type::struct_of(fields).named(name.as_str());
        self.types.insert(name.clone(), t.clone());
        self.struct_types.insert(name.clone());

        // the model value: a zero instance that also carries the methods
        self.emit_name(Opcode::Load, "new")?;
        self.emit_value(Value::Type(t))?;
        self.emit_call(1, 0)?;
        self.emit_value(Value::string("__static"))?;
        self.emit_value(Value::Bool(true))?;
        self.emit_op(Opcode::StoreIndex)?;
        if let Some(parent) = parent {
            self.emit_value(Value::string("__parent"))?;
            self.emit_name(Opcode::Load, &parent)?;
            self.emit_op(Opcode::StoreIndex)?;
        }
        self.create_and_store(&name)
    }

    /// A `Coerce` or `RequiredType` check for a declared parameter type.
    pub(super) fn emit_type_check(&mut self, t: &Type) -> Result<()> {
        if t.is_interface() || matches!(t.kind, Kind::Function | Kind::Pointer) {
            return Ok(());
        }
        if t.kind == Kind::Struct {
            self.emit_op(Opcode::Copy)?;
            return Ok(());
        }
        let op = if self.strictness == crate::config::Strictness::Strict {
            Opcode::Coerce
        } else {
            Opcode::RequiredType
        };
        self.emit(op, Operand::Value(Value::Type(t.clone())))?;
        Ok(())
    }
}
