//! Function declarations, methods and function literals.
//!
//! Each body compiles into its own [`ByteCode`] with a prologue that checks
//! the argument count and binds every parameter from `_args`. The finished
//! code is pushed as a function value, which captures the scope it is
//! pushed in.

use std::mem;
use std::sync::Arc;

use crate::bytecode::{ByteCode, Declaration, FunctionScope, Opcode, Operand, Parameter};
use crate::compiler::{Compiler, Unit};
use crate::error::{ErrorKind, Result};
use crate::value::{FunctionValue, Type, Value};

/// How a method body finds its receiver.
struct Receiver {
    name: String,
    /// `*T` receivers share the caller's value instead of copying it.
    pointer: bool,
}

struct Signature {
    parameters: Vec<Parameter>,
    variadic: bool,
    returns: Vec<Type>,
    named_results: Vec<String>,
}

impl Compiler {
    /// `func name(…)`, `func (r T) name(…)` or `func name ->r (…)`. A `func`
    /// that turns out to be a literal is compiled as an expression.
    pub(super) fn function_statement(&mut self) -> Result<()> {
        if self.is_method_declaration() {
            return self.method_declaration();
        }
        if !self.t.peek(2).is_identifier() {
            return self.expression_statement();
        }
        self.t.next();
        let name = self.identifier()?;
        let receiver = self.receiver_binding()?;
        let code = self.function_body(&name, receiver)?;
        self.emit_value(Value::Function(FunctionValue::new(Arc::new(code))))?;
        let top_level = self.at_top_level();
        if self.declare(&name) {
            if top_level {
                self.exports.push(name.clone());
            }
            self.emit_name(Opcode::SymbolCreate, &name)?;
        }
        self.emit_name(Opcode::Store, &name)?;
        if top_level && name == "main" {
            self.has_main = true;
        }
        Ok(())
    }

    /// `func (` IDENT [`*`] IDENT `)` IDENT `(`
    fn is_method_declaration(&self) -> bool {
        let t = &self.t;
        if !t.peek(2).is("(") || !t.peek(3).is_identifier() {
            return false;
        }
        let mut n = 4;
        if t.peek(n).is("*") {
            n += 1;
        }
        t.peek(n).is_identifier()
            && t.peek(n + 1).is(")")
            && t.peek(n + 2).is_identifier()
            && t.peek(n + 3).is("(")
    }

    /// `func (p T) name(…) { … }` stores the function into the type's model.
    fn method_declaration(&mut self) -> Result<()> {
        self.t.next();
        self.expect("(")?;
        let receiver = self.identifier()?;
        let pointer = self.t.is_next_consume("*");
        let type_name = self.identifier()?;
        self.expect(")")?;
        if !self.struct_types.contains(&type_name) {
            self.t.advance(-2);
            return Err(self.error(ErrorKind::InvalidTypeSpec));
        }
        let name = self.identifier()?;
        let code = self.function_body(
            &format!("{}.{}", type_name, name),
            Some(Receiver {
                name: receiver,
                pointer,
            }),
        )?;
        self.emit_name(Opcode::Load, &type_name)?;
        self.emit_value(Value::String(name))?;
        self.emit_value(Value::Function(FunctionValue::new(Arc::new(code))))?;
        self.emit_op(Opcode::StoreIndex)?;
        self.emit_op(Opcode::Drop)?;
        Ok(())
    }

    /// `->r` after the name binds the receiver of a method call to `r`.
    fn receiver_binding(&mut self) -> Result<Option<Receiver>> {
        if !self.t.is_next_consume("->") {
            return Ok(None);
        }
        let name = self.identifier()?;
        Ok(Some(Receiver {
            name,
            pointer: true,
        }))
    }

    /// `func(…) … { … }` or `func ->r (…) { … }` in an expression; the
    /// `func` keyword has been consumed.
    pub(super) fn function_literal(&mut self) -> Result<()> {
        let receiver = self.receiver_binding()?;
        self.temp_counter += 1;
        let name = format!("func#{}", self.temp_counter);
        let code = self.function_body(&name, receiver)?;
        self.emit_value(Value::Function(FunctionValue::new(Arc::new(code))))?;
        Ok(())
    }

    /// Compile a signature and body into a sealed, declared unit. The outer
    /// unit is restored whether or not compilation succeeds.
    fn function_body(&mut self, name: &str, receiver: Option<Receiver>) -> Result<ByteCode> {
        let outer = mem::replace(&mut self.unit, Unit::new(name));
        self.unit.last_line = outer.last_line;
        let saved = mem::replace(&mut self.no_struct_literal, false);
        let result = self.compile_body(name, receiver);
        self.no_struct_literal = saved;
        let inner = mem::replace(&mut self.unit, outer);
        let declaration = result?;
        let mut code = inner.code;
        code.declaration = Some(declaration);
        code.package = Some(self.package.clone().unwrap_or_else(|| self.module.clone()));
        code.seal();
        Ok(code)
    }

    fn compile_body(&mut self, name: &str, receiver: Option<Receiver>) -> Result<Declaration> {
        let signature = self.signature()?;
        if !self.t.is_next("{") {
            return Err(self.error(ErrorKind::MissingFunctionBody).context(name));
        }
        self.unit.returns = Some(signature.returns.clone());
        self.unit.named_results = signature.named_results.clone();
        self.at_line()?;

        let count = signature.parameters.len();
        let min = if signature.variadic { count - 1 } else { count };
        let max = if signature.variadic { -1 } else { count as i64 };
        self.emit(
            Opcode::ArgCheck,
            Operand::Tuple(vec![
                Operand::Int(min as i64),
                Operand::Int(max),
                Operand::Name(name.to_string()),
            ]),
        )?;
        for (i, parameter) in signature.parameters.iter().enumerate() {
            if signature.variadic && i + 1 == count {
                // the rest of `_args` as an array
                self.emit_name(Opcode::Load, "_args")?;
                self.emit_value(Value::Int(i as i64))?;
                self.emit_name(Opcode::Load, "len")?;
                self.emit_name(Opcode::Load, "_args")?;
                self.emit_call(1, 0)?;
                self.emit_op(Opcode::LoadSlice)?;
                if !parameter.kind.is_interface() {
                    self.emit_type_check(&Type::array_of(parameter.kind.clone()))?;
                }
            } else {
                self.emit_name(Opcode::Load, "_args")?;
                self.emit_value(Value::Int(i as i64))?;
                self.emit_op(Opcode::LoadIndex)?;
                self.emit_type_check(&parameter.kind)?;
            }
            self.create_and_store(&parameter.name)?;
        }
        if let Some(receiver) = &receiver {
            self.emit_op(Opcode::LoadThis)?;
            if !receiver.pointer {
                self.emit_op(Opcode::Copy)?;
            }
            self.create_and_store(&receiver.name)?;
        }
        for (result, t) in signature.named_results.iter().zip(&signature.returns) {
            self.emit_zero(t)?;
            self.create_and_store(result)?;
        }

        self.expect("{")?;
        self.statements_until_close()?;
        self.emit(Opcode::Return, Operand::Int(0))?;

        Ok(Declaration {
            name: name.to_string(),
            parameters: signature.parameters,
            returns: signature.returns,
            variadic: signature.variadic,
            receiver: receiver.map(|r| r.name),
            scope: FunctionScope::Lexical,
        })
    }

    /// `(a, b int, rest ...string) (int, error)`. Names sharing a type are
    /// grouped the Go way; an untyped trailing name is `interface{}`.
    fn signature(&mut self) -> Result<Signature> {
        self.expect("(")?;
        let mut entries: Vec<(String, Option<Type>)> = Vec::new();
        let mut variadic = false;
        while !self.t.is_next_consume(")") {
            if self.t.at_end() {
                return Err(self.error(ErrorKind::Missing(")")));
            }
            if !entries.is_empty() {
                self.expect(",")?;
            }
            if variadic {
                return Err(self
                    .error(ErrorKind::UnexpectedToken)
                    .context("variadic parameter must be last"));
            }
            let name = self.identifier()?;
            if self.t.is_any_next(&[",", ")"]) {
                entries.push((name, None));
                continue;
            }
            if self.t.is_next_consume("...") {
                variadic = true;
            }
            let t = self.parse_type()?;
            entries.push((name, Some(t)));
        }
        let mut parameters = Vec::with_capacity(entries.len());
        let mut following = Type::interface();
        for (name, t) in entries.into_iter().rev() {
            if let Some(t) = t {
                following = t;
            }
            parameters.push(Parameter {
                name,
                kind: following.clone(),
            });
        }
        parameters.reverse();

        let (returns, named_results) = self.result_list()?;
        Ok(Signature {
            parameters,
            variadic,
            returns,
            named_results,
        })
    }

    /// Nothing, a single type, or a parenthesized list of types that may
    /// all be named.
    fn result_list(&mut self) -> Result<(Vec<Type>, Vec<String>)> {
        if !self.same_line() || self.t.is_next("{") {
            return Ok((Vec::new(), Vec::new()));
        }
        if !self.t.is_next_consume("(") {
            return Ok((vec![self.parse_type()?], Vec::new()));
        }
        let mut types = Vec::new();
        let mut names = Vec::new();
        while !self.t.is_next_consume(")") {
            if self.t.at_end() {
                return Err(self.error(ErrorKind::Missing(")")));
            }
            if !types.is_empty() {
                self.expect(",")?;
            }
            let named = self.t.current().is_identifier()
                && !self.t.peek(2).is(",")
                && !self.t.peek(2).is(")")
                && !self.t.peek(2).is(".");
            if named {
                names.push(self.identifier()?);
            }
            types.push(self.parse_type()?);
        }
        if !names.is_empty() && names.len() != types.len() {
            return Err(self.error(ErrorKind::InvalidReturn).context("mixed named results"));
        }
        Ok((types, names))
    }
}
