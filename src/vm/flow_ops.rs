//! Branches, stops, panics, line tracking and try/catch records.

use std::sync::Arc;

use crate::bytecode::Operand;
use crate::error::{Error, ErrorKind, Result};
use crate::value::Value;
use crate::vm::context::Context;
use crate::vm::frame::TryRecord;

fn address(ctx: &Context, operand: &Operand) -> Result<usize> {
    match operand.as_address() {
        Some(addr) if addr <= ctx.bytecode.len() => Ok(addr),
        _ => Err(Error::new(ErrorKind::InvalidAddress).context(operand)),
    }
}

pub(crate) fn branch(ctx: &mut Context, operand: &Operand) -> Result<()> {
    ctx.pc = address(ctx, operand)?;
    Ok(())
}

pub(crate) fn branch_true(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let target = address(ctx, operand)?;
    if ctx.pop_value()?.is_truthy() {
        ctx.pc = target;
    }
    Ok(())
}

pub(crate) fn branch_false(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let target = address(ctx, operand)?;
    if !ctx.pop_value()?.is_truthy() {
        ctx.pc = target;
    }
    Ok(())
}

pub(crate) fn stop(_: &mut Context, _: &Operand) -> Result<()> {
    Err(Error::stop())
}

/// Raise the top of stack. An error value is rethrown as-is.
pub(crate) fn panic(ctx: &mut Context, _: &Operand) -> Result<()> {
    match ctx.pop_value()? {
        Value::Error(err) => Err(err.as_ref().clone()),
        other => Err(Error::panic(other.to_string())),
    }
}

pub(crate) fn at_line(ctx: &mut Context, operand: &Operand) -> Result<()> {
    ctx.line = operand.as_int().unwrap_or(0).max(0) as usize;
    if ctx.debugger.should_stop(ctx.line) {
        return Err(Error::new(ErrorKind::SignalDebugger).context(ctx.line));
    }
    Ok(())
}

pub(crate) fn try_block(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let catch = address(ctx, operand)?;
    ctx.try_stack.push(TryRecord {
        address: Some(catch),
        sp: ctx.stack.len(),
        fp: ctx.fp,
        depth: ctx.depth,
        bytecode: Arc::clone(&ctx.bytecode),
        symbols: Arc::clone(&ctx.symbols),
        this_len: ctx.this_stack.len(),
        module: ctx.module.clone(),
        line: ctx.line,
    });
    Ok(())
}

pub(crate) fn try_pop(ctx: &mut Context, _: &Operand) -> Result<()> {
    ctx.try_stack
        .pop()
        .map(|_| ())
        .ok_or_else(|| Error::new(ErrorKind::InvalidTryState))
}

pub(crate) fn unimplemented(_: &mut Context, _: &Operand) -> Result<()> {
    Err(Error::new(ErrorKind::UnimplementedInstruction))
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
    fn test_loops_and_conditions() {
        let source = "sum := 0\n\
                      for i := 0; i < 5; i++ {\n\
                      if i == 3 { continue }\n\
                      sum += i\n\
                      }\n\
                      print sum";
        assert_eq!(run(source), "7\n");
    }

    #[test]
    fn test_nested_try_rethrows_outward() {
        let source = "try {\n\
                      try {\n\
                      x := 1 / 0\n\
                      } catch (e) {\n\
                      print \"inner\", e\n\
                      panic(e)\n\
                      }\n\
                      } catch (e) {\n\
                      print \"outer\", e\n\
                      }\n\
                      print \"done\"";
        assert_eq!(
            run(source),
            "inner division by zero\nouter division by zero\ndone\n"
        );
    }

    #[test]
    fn test_error_unwinds_calls_into_try() {
        let source = "func inner() { panic(\"deep\") }\n\
                      func outer() int { inner(); return 1 }\n\
                      try { outer() } catch (e) { print e }\n\
                      print \"after\"";
        assert_eq!(run(source), "deep\nafter\n");
    }

    #[test]
    fn test_uncaught_error_carries_line() {
        let (runtime, _) = Runtime::with_capture();
        let err = runtime.run("test", "x := 1\n\ny := x / 0").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
        assert_eq!(err.line, 3);
        assert_eq!(err.module.as_deref(), Some("test"));
    }
}
