//! Operator precedence, lowest first: `?:`, `||`, `&&`, relations, additive
//! (`+ - &`), multiplicative (`* / % | ^ << >>`), unary, then the reference
//! chain and primaries in `reference.rs`.
//!
//! A binary operator continues an expression only when it sits on the same
//! line as the token before it, so a newline ends an expression the way it
//! ends a statement.

use crate::bytecode::{Opcode, CALL_THIS};
use crate::compiler::Compiler;
use crate::error::Result;
use crate::value::Value;

impl Compiler {
    pub(super) fn expression(&mut self) -> Result<()> {
        self.logical_or()?;
        if self.same_line() && self.t.is_next_consume("?") {
            let otherwise = self.emit_fixup(Opcode::BranchFalse)?;
            self.expression()?;
            self.expect(":")?;
            let end = self.emit_fixup(Opcode::Branch)?;
            self.patch_here(otherwise)?;
            self.expression()?;
            self.patch_here(end)?;
        }
        Ok(())
    }

    /// Binary operator at the cursor, if it continues the current line.
    fn operator(&mut self, operators: &[&'static str]) -> Option<&'static str> {
        if !self.same_line() {
            return None;
        }
        let found = operators.iter().find(|op| self.t.is_next(op)).copied();
        if found.is_some() {
            self.t.next();
        }
        found
    }

    fn logical_or(&mut self) -> Result<()> {
        self.logical_and()?;
        while self.operator(&["||"]).is_some() {
            self.short_circuit(true, Self::logical_and)?;
        }
        Ok(())
    }

    fn logical_and(&mut self) -> Result<()> {
        self.relation()?;
        while self.operator(&["&&"]).is_some() {
            self.short_circuit(false, Self::relation)?;
        }
        Ok(())
    }

    /// The left operand is on the stack. When it already decides the
    /// result, skip the right operand and push that result.
    fn short_circuit(&mut self, on: bool, right: fn(&mut Self) -> Result<()>) -> Result<()> {
        self.emit_op(Opcode::Dup)?;
        let short = self.emit_fixup(if on { Opcode::BranchTrue } else { Opcode::BranchFalse })?;
        right(self)?;
        self.emit_op(if on { Opcode::Or } else { Opcode::And })?;
        let end = self.emit_fixup(Opcode::Branch)?;
        self.patch_here(short)?;
        self.emit_op(Opcode::Drop)?;
        self.emit_value(Value::Bool(on))?;
        self.patch_here(end)
    }

    fn relation(&mut self) -> Result<()> {
        self.additive()?;
        while let Some(op) = self.operator(&["==", "!=", "<=", ">=", "<", ">"]) {
            self.additive()?;
            self.emit_op(match op {
                "==" => Opcode::Equal,
                "!=" => Opcode::NotEqual,
                "<=" => Opcode::LessThanOrEqual,
                ">=" => Opcode::GreaterThanOrEqual,
                "<" => Opcode::LessThan,
                _ => Opcode::GreaterThan,
            })?;
        }
        Ok(())
    }

    fn additive(&mut self) -> Result<()> {
        self.multiplicative()?;
        while let Some(op) = self.operator(&["+", "-", "&"]) {
            self.multiplicative()?;
            self.emit_op(match op {
                "+" => Opcode::Add,
                "-" => Opcode::Sub,
                _ => Opcode::BitAnd,
            })?;
        }
        Ok(())
    }

    fn multiplicative(&mut self) -> Result<()> {
        self.unary()?;
        while let Some(op) = self.operator(&["*", "/", "%", "|", "^", "<<", ">>"]) {
            self.unary()?;
            match op {
                "*" => self.emit_op(Opcode::Mul)?,
                "/" => self.emit_op(Opcode::Div)?,
                "%" => self.emit_op(Opcode::Modulo)?,
                "|" => self.emit_op(Opcode::BitOr)?,
                "^" => self.emit_op(Opcode::Exp)?,
                "<<" => self.emit_op(Opcode::BitShift)?,
                _ => {
                    // a negative count shifts right
                    self.emit_op(Opcode::Negate)?;
                    self.emit_op(Opcode::BitShift)?
                }
            };
        }
        Ok(())
    }

    pub(super) fn unary(&mut self) -> Result<()> {
        if self.t.is_next_consume("-") || self.t.is_next_consume("!") {
            self.unary()?;
            self.emit_op(Opcode::Negate)?;
            return Ok(());
        }
        if self.t.is_next_consume("<-") {
            self.unary()?;
            self.emit_op(Opcode::Dup)?;
            self.emit_op(Opcode::SetThis)?;
            self.emit_name(Opcode::Member, "Receive")?;
            self.emit_call(0, CALL_THIS)?;
            return Ok(());
        }
        // references are shared already; `&x` and `*p` are the value itself
        if self.t.is_next_consume("&") || self.t.is_next_consume("*") || self.t.is_next_consume("+") {
            return self.unary();
        }
        self.reference()
    }
}
