//! Stack manipulation: Push Drop Dup Swap Copy ReadStack Flatten DropToMarker.

use crate::bytecode::{FunctionScope, Operand};
use crate::error::{Error, ErrorKind, Result};
use crate::value::{read, Value};
use crate::vm::context::Context;

pub(crate) fn no_operation(_: &mut Context, _: &Operand) -> Result<()> {
    Ok(())
}

/// Push the operand. A lexical function literal captures the current scope.
pub(crate) fn push(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let value = match operand {
        Operand::Value(Value::Function(func)) => {
            let lexical = func
                .code
                .declaration
                .as_ref()
                .map_or(true, |d| d.scope == FunctionScope::Lexical);
            let mut func = func.clone();
            if lexical && func.scope.is_none() {
                func.scope = Some(ctx.symbols.clone());
            }
            Value::Function(func)
        }
        Operand::Value(value) => value.clone(),
        Operand::Int(n) => Value::Int(*n),
        Operand::Name(s) => Value::String(s.clone()),
        Operand::None => Value::Nil,
        other => return Err(Error::new(ErrorKind::InvalidType).context(other)),
    };
    ctx.push(value);
    Ok(())
}

pub(crate) fn drop_values(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let count = operand.as_int().unwrap_or(1).max(1) as usize;
    ctx.pop_n(count).map(|_| ())
}

pub(crate) fn dup(ctx: &mut Context, _: &Operand) -> Result<()> {
    let top = ctx.peek(0)?.clone();
    ctx.push(top);
    Ok(())
}

pub(crate) fn swap(ctx: &mut Context, _: &Operand) -> Result<()> {
    let top = ctx.pop()?;
    let below = ctx.pop()?;
    ctx.push(top);
    ctx.push(below);
    Ok(())
}

/// Replace the top of stack with a deep copy of itself.
pub(crate) fn copy(ctx: &mut Context, _: &Operand) -> Result<()> {
    let top = ctx.pop_value()?;
    ctx.push(top.deep_copy());
    Ok(())
}

/// Push a copy of the value `n` slots below the top.
pub(crate) fn read_stack(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let offset = operand.as_int().unwrap_or(0).max(0) as usize;
    let value = ctx.peek(offset)?.clone();
    ctx.push(value);
    Ok(())
}

/// Spread an array argument: push its items, then their count.
pub(crate) fn flatten(ctx: &mut Context, _: &Operand) -> Result<()> {
    let value = ctx.pop_value()?;
    let Value::Array(array) = &value else {
        return Err(Error::new(ErrorKind::InvalidType).context(value.type_name()));
    };
    let items = read(array).items.clone();
    let count = items.len() as i64;
    ctx.stack.extend(items);
    ctx.push(Value::Int(count));
    Ok(())
}

/// Pop everything down to and including the marker with the given label.
pub(crate) fn drop_to_marker(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let label = operand.as_name().unwrap_or_default().to_string();
    loop {
        match ctx.pop() {
            Ok(Value::Marker(m)) if m.label == label => return Ok(()),
            Ok(_) => {}
            Err(_) => return Err(Error::new(ErrorKind::InvalidMarker).context(label)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_spread_arguments() {
        let (runtime, output) = Runtime::with_capture();
        let source = "func sum(xs ...int) int {\n t := 0\n for _, x := range xs { t += x }\n return t\n}\nnums := [1, 2, 3]\nprint sum(nums...), sum(10, nums...)";
        runtime.run("test", source).unwrap();
        assert_eq!(output.contents(), "6 16\n");
    }

    #[test]
    fn test_copy_detaches_aggregates() {
        let (runtime, output) = Runtime::with_capture();
        let source = "type P struct { n int }\nfunc bump(p P) { p.n = 9 }\nq := P{n: 1}\nbump(q)\nprint q.n";
        runtime.run("test", source).unwrap();
        assert_eq!(output.contents(), "1\n");
    }
}
