//! Statement dispatch and the small statement forms.

use crate::bytecode::{Opcode, Operand, CALL_MULTI};
use crate::compiler::Compiler;
use crate::error::{ErrorKind, Result};
use crate::lexer::TokenClass;
use crate::value::{StackMarker, Value};

/// What a simple statement turns out to be once its operators are seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimpleForm {
    Assignment,
    Send,
    Expression,
}

const ASSIGNMENT_OPERATORS: &[&str] = &[":=", "=", "+=", "-=", "*=", "/=", "++", "--"];

impl Compiler {
    pub(super) fn statement(&mut self) -> Result<()> {
        if self.t.is_next_consume(";") {
            return Ok(());
        }
        self.at_line()?;
        let token = self.t.current().clone();
        if token.is("{") {
            self.block()?;
        } else if token.is("@") {
            self.directive()?;
        } else if token.class == TokenClass::Reserved {
            self.keyword_statement(&token.spelling)?;
        } else {
            self.simple_statement()?;
        }
        // statements sharing a line need a `;` between them
        if !self.t.is_next_consume(";") && !self.at_statement_end() {
            return Err(self.error(ErrorKind::UnexpectedToken));
        }
        Ok(())
    }

    fn keyword_statement(&mut self, keyword: &str) -> Result<()> {
        match keyword {
            "var" => self.var_statement(),
            "const" => self.const_statement(),
            "array" => self.array_statement(),
            "assert" => self.assert_statement(),
            "break" | "continue" => self.loop_control(),
            "call" => {
                self.t.next();
                self.expression_statement()
            }
            "for" => self.for_statement(),
            "if" => self.if_statement(),
            "switch" => self.switch_statement(),
            "try" => self.try_statement(),
            "func" => self.function_statement(),
            "go" => self.go_statement(),
            "import" => self.import_statement(),
            "package" => self.package_statement(),
            "print" => self.print_statement(),
            "return" => self.return_statement(),
            "type" => self.type_statement(),
            "fallthrough" => Err(self.error(ErrorKind::InvalidLoopControl)),
            // `nil`, `map`, `chan`, `interface` and `struct` start expressions
            "nil" | "map" | "chan" | "interface" | "struct" => self.simple_statement(),
            _ => Err(self.error(ErrorKind::UnexpectedToken)),
        }
    }

    /// `{ … }` in its own scope.
    pub(super) fn block(&mut self) -> Result<()> {
        self.expect("{")?;
        self.push_scope()?;
        self.statements_until_close()?;
        self.pop_scope()
    }

    /// Compile statements up to and including the closing `}`.
    pub(super) fn statements_until_close(&mut self) -> Result<()> {
        loop {
            if self.t.is_next_consume("}") {
                return Ok(());
            }
            if self.t.at_end() {
                return Err(self.error(ErrorKind::Missing("}")));
            }
            self.statement()?;
        }
    }

    /// Look ahead over the rest of the statement for an assignment or send
    /// operator at bracket depth zero.
    fn classify(&self) -> SimpleForm {
        let mut depth = 0usize;
        let mut n = 1;
        let mut previous_line = self.t.current().line;
        loop {
            let token = self.t.peek(n);
            if token.is_end() {
                return SimpleForm::Expression;
            }
            if depth == 0 {
                if n > 1 && token.line != previous_line {
                    return SimpleForm::Expression;
                }
                if token.is(";") || token.is("}") {
                    return SimpleForm::Expression;
                }
                if ASSIGNMENT_OPERATORS.iter().any(|op| token.is(op)) {
                    return SimpleForm::Assignment;
                }
                if token.is("<-") && n > 1 {
                    return SimpleForm::Send;
                }
            }
            if token.is("(") || token.is("[") || token.is("{") {
                depth += 1;
            } else if token.is(")") || token.is("]") || token.is("}") {
                depth = depth.saturating_sub(1);
            }
            previous_line = token.line;
            n += 1;
        }
    }

    pub(super) fn simple_statement(&mut self) -> Result<()> {
        match self.classify() {
            SimpleForm::Assignment => self.assignment(),
            SimpleForm::Send => self.send_statement(),
            SimpleForm::Expression => self.expression_statement(),
        }
    }

    /// Evaluate for effect. Whatever the expression leaves, including the
    /// marker of a void call or every result of a multi-value call, is
    /// discarded down to a fresh marker.
    pub(super) fn expression_statement(&mut self) -> Result<()> {
        self.emit_marker(StackMarker::CALL)?;
        self.expression()?;
        self.request_multiple_results()?;
        if self.repl {
            self.emit_op(Opcode::Say)?;
        }
        self.emit_drop_to_marker(StackMarker::CALL)?;
        Ok(())
    }

    /// `ch <- v`
    fn send_statement(&mut self) -> Result<()> {
        self.expression()?;
        self.expect("<-")?;
        self.emit_op(Opcode::Dup)?;
        self.emit_op(Opcode::SetThis)?;
        self.emit_name(Opcode::Member, "Send")?;
        self.expression()?;
        self.emit_call(1, crate::bytecode::CALL_THIS)?;
        self.emit_op(Opcode::Drop)?;
        Ok(())
    }

    fn print_statement(&mut self) -> Result<()> {
        self.t.next();
        if self.at_statement_end() {
            self.emit_op(Opcode::Newline)?;
            return Ok(());
        }
        let mut count = 0;
        loop {
            self.expression()?;
            count += 1;
            if !self.t.is_next_consume(",") {
                break;
            }
        }
        self.emit(Opcode::Print, Operand::Int(count))?;
        self.emit_op(Opcode::Newline)?;
        Ok(())
    }

    /// `assert cond[, message]`
    fn assert_statement(&mut self) -> Result<()> {
        self.t.next();
        self.expression()?;
        let ok = self.emit_fixup(Opcode::BranchTrue)?;
        if self.t.is_next_consume(",") {
            self.expression()?;
        } else {
            self.emit_value(Value::string("assertion failed"))?;
        }
        self.emit_op(Opcode::Panic)?;
        self.patch_here(ok)
    }

    /// `array name[size] [= fill]`
    fn array_statement(&mut self) -> Result<()> {
        self.t.next();
        let name = self.identifier()?;
        self.expect("[")?;
        self.expression()?;
        self.expect("]")?;
        if self.t.is_next_consume("=") {
            self.expression()?;
            self.emit(Opcode::MakeArray, Operand::Int(2))?;
        } else {
            self.emit(Opcode::MakeArray, Operand::Int(1))?;
        }
        self.create_and_store(&name)
    }

    /// Bind the top of stack to a name new in this block.
    pub(super) fn create_and_store(&mut self, name: &str) -> Result<()> {
        if name == "_" {
            self.emit_op(Opcode::Drop)?;
            return Ok(());
        }
        if !self.declare(name) {
            return Err(self.error(ErrorKind::DuplicateDeclaration).context(name));
        }
        if self.at_top_level() {
            self.exports.push(name.to_string());
        }
        self.emit_name(Opcode::SymbolCreate, name)?;
        self.emit_name(Opcode::Store, name)?;
        Ok(())
    }

    /// `var a, b T`, `var a [T] = e, …`, or a parenthesized group of those.
    fn var_statement(&mut self) -> Result<()> {
        self.t.next();
        if self.t.is_next_consume("(") {
            while !self.t.is_next_consume(")") {
                if self.t.at_end() {
                    return Err(self.error(ErrorKind::Missing(")")));
                }
                if self.t.is_next_consume(";") {
                    continue;
                }
                self.var_spec()?;
            }
            return Ok(());
        }
        self.var_spec()
    }

    fn var_spec(&mut self) -> Result<()> {
        let mut names = vec![self.identifier()?];
        while self.t.is_next_consume(",") {
            names.push(self.identifier()?);
        }
        let declared = if self.t.is_next("=") {
            None
        } else {
            Some(self.parse_type()?)
        };
        if !self.t.is_next_consume("=") {
            let Some(t) = declared else {
                return Err(self.error(ErrorKind::Missing("=")));
            };
            for name in &names {
                self.emit_zero(&t)?;
                self.create_and_store(name)?;
            }
            return Ok(());
        }

        let count = self.expression_list()?;
        if count == 1 && names.len() > 1 {
            if !self.request_multiple_results()? {
                return Err(self.error(ErrorKind::InvalidAssignment));
            }
        } else if count != names.len() {
            return Err(self.error(ErrorKind::InvalidAssignment));
        }
        if names.len() == 1 {
            if let Some(t) = declared.as_ref().filter(|t| !t.is_interface()) {
                self.emit(Opcode::Coerce, Operand::Value(Value::Type(t.clone())))?;
            }
            return self.create_and_store(&names[0]);
        }
        // several values: the first one is on top
        let ordered: Vec<String> = if count == 1 {
            names.clone()
        } else {
            names.iter().rev().cloned().collect()
        };
        for name in &ordered {
            if let Some(t) = declared.as_ref().filter(|t| !t.is_interface()) {
                self.emit(Opcode::Coerce, Operand::Value(Value::Type(t.clone())))?;
            }
            self.create_and_store(name)?;
        }
        if count == 1 {
            self.emit_drop_to_marker(StackMarker::RESULTS)?;
        }
        Ok(())
    }

    /// Comma-separated expressions; returns how many were compiled.
    pub(super) fn expression_list(&mut self) -> Result<usize> {
        let mut count = 0;
        loop {
            self.expression()?;
            count += 1;
            if !self.t.is_next_consume(",") {
                return Ok(count);
            }
        }
    }

    /// `go f(args)`: the launch is a call of `$go` with the callee as its
    /// first argument.
    fn go_statement(&mut self) -> Result<()> {
        self.t.next();
        let mut code = self.capture(|c| c.unary())?;
        let Some(last) = code.len().checked_sub(1) else {
            return Err(self.error(ErrorKind::InvalidFunctionCall));
        };
        let (argc, flags) = match code.instruction(last) {
            Some(instruction) if instruction.op == Opcode::Call => {
                call_parts(&instruction.operand)
            }
            _ => return Err(self.error(ErrorKind::InvalidFunctionCall).context("go")),
        };
        code.remove(last)?;
        self.emit_name(Opcode::Load, "$go")?;
        self.append(&code)?;
        self.emit_call(argc + 1, flags & !CALL_MULTI)?;
        self.emit_op(Opcode::Drop)?;
        Ok(())
    }
}

/// Argument count and flags of a `Call` operand.
pub(super) fn call_parts(operand: &Operand) -> (usize, i64) {
    match operand {
        Operand::Tuple(parts) => (
            parts.first().and_then(Operand::as_int).unwrap_or(0).max(0) as usize,
            parts.get(1).and_then(Operand::as_int).unwrap_or(0),
        ),
        other => (other.as_int().unwrap_or(0).max(0) as usize, 0),
    }
}
