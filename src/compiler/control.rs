//! Control flow: `if`, `for`, `switch`, `try`, `break`/`continue` and
//! `return`.

use crate::bytecode::{Opcode, Operand};
use crate::compiler::{Breakable, Compiler, LoopFrame};
use crate::error::{ErrorKind, Result};
use crate::value::{StackMarker, Value};

impl Compiler {
    /// Scan a statement head up to its `{` for a token at bracket depth
    /// zero.
    fn head_contains(&self, text: &str) -> bool {
        let mut depth = 0usize;
        let mut n = 1;
        loop {
            let token = self.t.peek(n);
            if token.is_end() {
                return false;
            }
            if depth == 0 {
                if token.is("{") {
                    return false;
                }
                if token.is(text) {
                    return true;
                }
            }
            if token.is("(") || token.is("[") {
                depth += 1;
            } else if token.is(")") || token.is("]") {
                depth = depth.saturating_sub(1);
            }
            n += 1;
        }
    }

    /// An expression in a statement head, where `Name {` opens the body.
    fn condition(&mut self) -> Result<()> {
        let saved = std::mem::replace(&mut self.no_struct_literal, true);
        let result = self.expression();
        self.no_struct_literal = saved;
        result
    }

    fn head_statement(&mut self) -> Result<()> {
        let saved = std::mem::replace(&mut self.no_struct_literal, true);
        let result = self.simple_statement();
        self.no_struct_literal = saved;
        result
    }

    pub(super) fn if_statement(&mut self) -> Result<()> {
        self.t.next();
        let scoped = self.head_contains(";");
        if scoped {
            self.push_scope()?;
            self.head_statement()?;
            self.expect(";")?;
        }
        self.condition()?;
        let otherwise = self.emit_fixup(Opcode::BranchFalse)?;
        self.block()?;
        if self.t.is_next_consume("else") {
            let end = self.emit_fixup(Opcode::Branch)?;
            self.patch_here(otherwise)?;
            if self.t.is_next("if") {
                self.if_statement()?;
            } else {
                self.block()?;
            }
            self.patch_here(end)?;
        } else {
            self.patch_here(otherwise)?;
        }
        if scoped {
            self.pop_scope()?;
        }
        Ok(())
    }

    fn open_loop(&mut self, kind: Breakable) {
        self.unit.loops.push(LoopFrame {
            kind,
            breaks: Vec::new(),
            continues: Vec::new(),
            scope_depth: self.unit.scope_depth,
            try_depth: self.unit.try_depth,
        });
    }

    /// Patch the innermost frame's `continue`s to `next` and its `break`s
    /// to the current address.
    fn close_loop(&mut self, next: Option<usize>) -> Result<()> {
        let Some(frame) = self.unit.loops.pop() else {
            return Ok(());
        };
        if let Some(next) = next {
            for fixup in frame.continues {
                self.patch(fixup, next)?;
            }
        }
        for fixup in frame.breaks {
            self.patch_here(fixup)?;
        }
        Ok(())
    }

    /// Every loop runs in a scope of its own that holds the loop variables.
    pub(super) fn for_statement(&mut self) -> Result<()> {
        self.t.next();
        self.push_scope()?;
        if self.head_contains("range") {
            self.range_loop()?;
        } else {
            self.counted_loop()?;
        }
        self.pop_scope()
    }

    /// `for {`, `for cond {` and `for init; cond; post {`.
    fn counted_loop(&mut self) -> Result<()> {
        let clauses = self.head_contains(";");
        if clauses && !self.t.is_next(";") {
            self.head_statement()?;
        }
        if clauses {
            self.expect(";")?;
        }

        let top = self.mark();
        let mut exit = None;
        if !self.t.is_next("{") && !(clauses && self.t.is_next(";")) {
            self.condition()?;
            exit = Some(self.emit_fixup(Opcode::BranchFalse)?);
        }
        let post = if clauses {
            self.expect(";")?;
            if self.t.is_next("{") {
                None
            } else {
                Some(self.capture(|c| c.head_statement())?)
            }
        } else {
            None
        };

        self.open_loop(Breakable::Loop);
        self.block()?;
        let next = self.mark();
        if let Some(post) = post {
            self.append(&post)?;
        }
        self.emit_branch_to(Opcode::Branch, top)?;
        if let Some(exit) = exit {
            self.patch_here(exit)?;
        }
        self.close_loop(Some(next))
    }

    /// `for [k[, v] := | =] range expr {`: iterate over the keys that
    /// `$rangekeys` reports, fetching each value by key. The loop variables
    /// are bound once and updated on every pass.
    fn range_loop(&mut self) -> Result<()> {
        let mut vars = Vec::new();
        let mut define = false;
        if !self.t.is_next("range") {
            vars.push(self.identifier()?);
            if self.t.is_next_consume(",") {
                vars.push(self.identifier()?);
            }
            if self.t.is_next_consume(":=") {
                define = true;
            } else {
                self.expect("=")?;
            }
        }
        self.expect("range")?;

        let container = self.temp_name("range");
        let keys = self.temp_name("keys");
        let count = self.temp_name("len");
        let index = self.temp_name("i");
        self.condition()?;
        self.create_temp(&container)?;
        self.emit_name(Opcode::Load, "$rangekeys")?;
        self.emit_name(Opcode::Load, &container)?;
        self.emit_call(1, 0)?;
        self.create_temp(&keys)?;
        self.emit_name(Opcode::Load, "len")?;
        self.emit_name(Opcode::Load, &keys)?;
        self.emit_call(1, 0)?;
        self.create_temp(&count)?;
        self.emit_value(Value::Int(0))?;
        self.create_temp(&index)?;
        if define {
            for var in vars.iter().filter(|v| *v != "_") {
                self.declare(var);
                self.emit_value(Value::Nil)?;
                self.emit_name(Opcode::SymbolCreate, var)?;
                self.emit_name(Opcode::Store, var)?;
            }
        }

        let top = self.mark();
        self.emit_name(Opcode::Load, &index)?;
        self.emit_name(Opcode::Load, &count)?;
        self.emit_op(Opcode::LessThan)?;
        let exit = self.emit_fixup(Opcode::BranchFalse)?;
        if let Some(key) = vars.first().filter(|k| *k != "_") {
            self.emit_name(Opcode::Load, &keys)?;
            self.emit_name(Opcode::Load, &index)?;
            self.emit_op(Opcode::LoadIndex)?;
            self.emit_name(Opcode::Store, key)?;
        }
        if let Some(value) = vars.get(1).filter(|v| *v != "_") {
            self.emit_name(Opcode::Load, &container)?;
            self.emit_name(Opcode::Load, &keys)?;
            self.emit_name(Opcode::Load, &index)?;
            self.emit_op(Opcode::LoadIndex)?;
            self.emit_op(Opcode::LoadIndex)?;
            self.emit_name(Opcode::Store, value)?;
        }

        self.open_loop(Breakable::Loop);
        self.block()?;
        let next = self.mark();
        self.emit_name(Opcode::Load, &index)?;
        self.emit_value(Value::Int(1))?;
        self.emit_op(Opcode::Add)?;
        self.emit_name(Opcode::Store, &index)?;
        self.emit_branch_to(Opcode::Branch, top)?;
        self.patch_here(exit)?;
        self.close_loop(Some(next))
    }

    fn create_temp(&mut self, name: &str) -> Result<()> {
        self.emit_name(Opcode::SymbolCreate, name)?;
        self.emit_name(Opcode::Store, name)?;
        Ok(())
    }

    /// `break` and `continue` leave the scopes and `try` blocks opened
    /// since the target frame before branching.
    pub(super) fn loop_control(&mut self) -> Result<()> {
        let is_break = self.t.next().is("break");
        let wanted = |frame: &&LoopFrame| is_break || frame.kind == Breakable::Loop;
        let Some(frame) = self.unit.loops.iter().rev().find(wanted) else {
            self.t.advance(-1);
            return Err(self.error(ErrorKind::InvalidLoopControl));
        };
        let scopes = self.unit.scope_depth - frame.scope_depth;
        let tries = self.unit.try_depth - frame.try_depth;
        if scopes > 0 {
            self.emit(Opcode::PopScope, Operand::Int(scopes as i64))?;
        }
        for _ in 0..tries {
            self.emit_op(Opcode::TryPop)?;
        }
        let fixup = self.emit_fixup(Opcode::Branch)?;
        let Some(frame) = self.unit.loops.iter_mut().rev().find(|f| is_break || f.kind == Breakable::Loop)
        else {
            return Err(self.error(ErrorKind::InvalidLoopControl));
        };
        if is_break {
            frame.breaks.push(fixup);
        } else {
            frame.continues.push(fixup);
        }
        Ok(())
    }

    /// `switch [expr] { case a, b: … default: … }`. Cases are tested in
    /// order; a body ends by branching past the switch unless it closes
    /// with `fallthrough`.
    pub(super) fn switch_statement(&mut self) -> Result<()> {
        self.t.next();
        self.push_scope()?;
        let subject = if self.t.is_next("{") {
            None
        } else {
            let name = self.temp_name("switch");
            self.condition()?;
            self.create_temp(&name)?;
            Some(name)
        };
        self.expect("{")?;
        self.open_loop(Breakable::Switch);

        // tests and bodies are interleaved; a failed test, and the entry
        // flow over a default body, go on to the next clause's tests
        let mut pending: Vec<usize> = Vec::new();
        let mut fall_into: Option<usize> = None;
        let mut default_body: Option<usize> = None;
        let mut ends = Vec::new();
        loop {
            if self.t.is_next_consume("}") {
                break;
            }
            if self.t.at_end() {
                return Err(self.error(ErrorKind::Missing("}")));
            }
            let mut matches = Vec::new();
            let is_default = self.t.is_next_consume("default");
            if is_default {
                pending.push(self.emit_fixup(Opcode::Branch)?);
            } else {
                self.expect("case")?;
                for fixup in std::mem::take(&mut pending) {
                    self.patch_here(fixup)?;
                }
                loop {
                    if let Some(subject) = &subject {
                        self.emit_name(Opcode::Load, subject)?;
                        self.expression()?;
                        self.emit_op(Opcode::Equal)?;
                    } else {
                        self.expression()?;
                    }
                    matches.push(self.emit_fixup(Opcode::BranchTrue)?);
                    if !self.t.is_next_consume(",") {
                        break;
                    }
                }
                pending.push(self.emit_fixup(Opcode::Branch)?);
            }
            self.expect(":")?;

            let body = self.mark();
            for fixup in matches {
                self.patch(fixup, body)?;
            }
            if let Some(fall) = fall_into.take() {
                self.patch(fall, body)?;
            }
            if is_default {
                default_body = Some(body);
            }

            self.push_scope()?;
            let mut falls = false;
            while !self.t.is_any_next(&["case", "default", "}"]) {
                if self.t.at_end() {
                    return Err(self.error(ErrorKind::Missing("}")));
                }
                if self.t.is_next_consume("fallthrough") {
                    falls = true;
                    self.t.is_next_consume(";");
                    if !self.t.is_any_next(&["case", "default"]) {
                        return Err(self.error(ErrorKind::InvalidLoopControl).context("fallthrough"));
                    }
                    break;
                }
                self.statement()?;
            }
            self.pop_scope()?;
            if falls {
                fall_into = Some(self.emit_fixup(Opcode::Branch)?);
            } else {
                ends.push(self.emit_fixup(Opcode::Branch)?);
            }
        }

        // no case matched
        for fixup in pending {
            match default_body {
                Some(body) => self.patch(fixup, body)?,
                None => self.patch_here(fixup)?,
            }
        }
        for end in ends {
            self.patch_here(end)?;
        }
        self.close_loop(None)?;
        self.pop_scope()
    }

    /// `try { … } catch [(e) | e] { … }`
    pub(super) fn try_statement(&mut self) -> Result<()> {
        self.t.next();
        let catch = self.emit_fixup(Opcode::Try)?;
        self.unit.try_depth += 1;
        self.block()?;
        self.emit_op(Opcode::TryPop)?;
        let end = self.emit_fixup(Opcode::Branch)?;

        if !self.t.is_next_consume("catch") {
            self.unit.try_depth -= 1;
            return Err(self.error(ErrorKind::MissingCatch));
        }
        self.patch_here(catch)?;
        let name = if self.t.is_next_consume("(") {
            let name = self.identifier()?;
            self.expect(")")?;
            Some(name)
        } else if self.t.current().is_identifier() {
            Some(self.identifier()?)
        } else {
            None
        };
        self.expect("{")?;
        self.push_scope()?;
        if let Some(name) = name {
            self.emit_name(Opcode::Load, "_error")?;
            self.create_and_store(&name)?;
        }
        self.statements_until_close()?;
        self.pop_scope()?;
        // the record stays in place while the catch body runs
        self.emit_op(Opcode::TryPop)?;
        self.unit.try_depth -= 1;
        self.patch_here(end)
    }

    /// `return [e, …]`. Scalar results are converted to their declared
    /// types; a single call returning several values is unpacked into
    /// them.
    pub(super) fn return_statement(&mut self) -> Result<()> {
        self.t.next();
        let declared = self.unit.returns.clone();
        if self.at_statement_end() {
            let named = self.unit.named_results.clone();
            for name in &named {
                self.emit_name(Opcode::Load, name)?;
            }
            self.emit(Opcode::Return, Operand::Int(named.len() as i64))?;
            return Ok(());
        }

        let mut values = Vec::new();
        loop {
            values.push(self.capture(|c| c.expression())?);
            if !self.t.is_next_consume(",") {
                break;
            }
        }
        let Some(declared) = declared else {
            // top level: the values are only a stop
            for value in &values {
                self.append(value)?;
            }
            self.emit(Opcode::Return, Operand::Int(values.len() as i64))?;
            return Ok(());
        };

        if values.len() == 1 && declared.len() > 1 {
            self.append(&values[0])?;
            if !self.request_multiple_results()? {
                return Err(self.error(ErrorKind::InvalidReturn));
            }
            self.push_scope()?;
            let temps: Vec<String> = (0..declared.len()).map(|_| self.temp_name("ret")).collect();
            for temp in &temps {
                self.create_temp(temp)?;
            }
            self.emit_drop_to_marker(StackMarker::RESULTS)?;
            for (temp, t) in temps.iter().zip(&declared) {
                self.emit_name(Opcode::Load, temp)?;
                if t.kind.is_scalar() {
                    self.emit(Opcode::Coerce, Operand::Value(Value::Type(t.clone())))?;
                }
            }
            self.pop_scope()?;
            self.emit(Opcode::Return, Operand::Int(declared.len() as i64))?;
            return Ok(());
        }

        if values.len() != declared.len() {
            return Err(self.error(ErrorKind::InvalidReturn)
                .context(format!("{} values for {} results", values.len(), declared.len())));
        }
        for (value, t) in values.iter().zip(&declared) {
            self.append(value)?;
            if t.kind.is_scalar() {
                self.emit(Opcode::Coerce, Operand::Value(Value::Type(t.clone())))?;
            }
        }
        self.emit(Opcode::Return, Operand::Int(values.len() as i64))?;
        Ok(())
    }
}
