//! Scope and symbol management.

use crate::bytecode::Operand;
use crate::error::{Error, ErrorKind, Result};
use crate::symbols::SymbolTable;
use crate::vm::context::Context;

fn name(operand: &Operand) -> Result<&str> {
    operand
        .as_name()
        .ok_or_else(|| Error::new(ErrorKind::InvalidSymbolName).context(operand))
}

pub(crate) fn push_scope(ctx: &mut Context, _: &Operand) -> Result<()> {
    ctx.symbols = SymbolTable::new_child(&ctx.symbols, "block");
    Ok(())
}

pub(crate) fn pop_scope(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let count = operand.as_int().unwrap_or(1).max(1);
    for _ in 0..count {
        let parent = ctx
            .symbols
            .parent()
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow).context("scope"))?;
        ctx.symbols = parent;
    }
    Ok(())
}

/// Declare a name in the current table. The blank identifier is ignored.
pub(crate) fn symbol_create(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let name = name(operand)?;
    if name == "_" {
        return Ok(());
    }
    ctx.symbols.create(name)
}

pub(crate) fn symbol_delete(ctx: &mut Context, operand: &Operand) -> Result<()> {
    ctx.symbols.delete(name(operand)?, true)
}

pub(crate) fn constant(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let name = name(operand)?.to_string();
    let value = ctx.pop_value()?;
    ctx.symbols.set_constant(&name, value)
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> String {
        let (runtime, output) = Runtime::with_capture();
        runtime.run("test", source).unwrap();
        output.contents()
    }

    #[test]
    fn test_block_scopes_shadow() {
        let source = "x := 1\n\
                      if true {\n\
                      x := 2\n\
                      print x\n\
                      }\n\
                      print x";
        assert_eq!(run(source), "2\n1\n");
    }

    #[test]
    fn test_constants_are_readonly() {
        assert_eq!(run("const limit = 10\nprint limit * 2"), "20\n");
        let (runtime, _) = Runtime::with_capture();
        let err = runtime.run("test", "const limit = 10\nlimit = 3").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReadOnly);
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let (runtime, _) = Runtime::with_capture();
        let err = runtime.run("test", "var x int\nvar x int").unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::SymbolExists | ErrorKind::DuplicateDeclaration
        ));
    }
}
