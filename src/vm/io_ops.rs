//! Output, logging, timers, receivers and runtime type checks.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::bytecode::Operand;
use crate::config::Strictness;
use crate::error::{Error, ErrorKind, Result};
use crate::template::Template;
use crate::value::coerce::coerce;
use crate::value::Value;
use crate::vm::context::Context;

/// Print `n` values separated by spaces, without a trailing newline.
pub(crate) fn print(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let count = operand.as_int().unwrap_or(1).max(0) as usize;
    let values = ctx.pop_n(count)?;
    if values.iter().any(Value::is_marker) {
        return Err(Error::new(ErrorKind::VoidReturn));
    }
    let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
    ctx.runtime.write(&parts.join(" "))
}

pub(crate) fn newline(ctx: &mut Context, _: &Operand) -> Result<()> {
    ctx.runtime.write("\n")
}

/// Echo a value on its own line. A void result prints nothing.
pub(crate) fn say(ctx: &mut Context, _: &Operand) -> Result<()> {
    match ctx.pop()? {
        Value::Marker(_) => Ok(()),
        value => ctx.runtime.write(&format!("{}\n", value)),
    }
}

/// `@log class expr`: user messages go to the `tern::user` target.
pub(crate) fn log(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let class = operand.as_name().unwrap_or("user");
    let value = ctx.pop_value()?;
    info!(target: "tern::user", class, module = %ctx.module, line = ctx.line, "{}", value);
    Ok(())
}

pub(crate) fn template(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let name = operand.as_name().unwrap_or("template");
    let source = ctx.pop_value()?;
    let Value::String(source) = source else {
        return Err(Error::new(ErrorKind::InvalidTemplate).context(source.type_name()));
    };
    let compiled = Template::compile(name, &source)?;
    ctx.push(Value::Template(Arc::new(compiled)));
    Ok(())
}

/// `Timer 0` starts a timer; `Timer 1` stops the latest one and pushes the
/// elapsed time as a string.
pub(crate) fn timer(ctx: &mut Context, operand: &Operand) -> Result<()> {
    match operand.as_int().unwrap_or(0) {
        0 => {
            ctx.timers.push(Instant::now());
            Ok(())
        }
        _ => {
            let start = ctx
                .timers
                .pop()
                .ok_or_else(|| Error::new(ErrorKind::StackUnderflow).context("timer"))?;
            ctx.push(Value::String(format!("{:?}", start.elapsed())));
            Ok(())
        }
    }
}

pub(crate) fn set_this(ctx: &mut Context, _: &Operand) -> Result<()> {
    let value = ctx.pop_value()?;
    ctx.this_stack.push(value);
    Ok(())
}

pub(crate) fn load_this(ctx: &mut Context, _: &Operand) -> Result<()> {
    let this = ctx
        .symbols
        .get("_this")
        .ok_or_else(|| Error::new(ErrorKind::InvalidFunctionCall).context("missing receiver"))?;
    ctx.push(this);
    Ok(())
}

/// Check the length of `_args` against `[min, max, name]`; a negative max
/// means variadic.
pub(crate) fn arg_check(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let parts = operand.as_tuple().unwrap_or_default();
    let min = parts.first().and_then(Operand::as_int).unwrap_or(0);
    let max = parts.get(1).and_then(Operand::as_int).unwrap_or(-1);
    let name = parts.get(2).and_then(Operand::as_name).unwrap_or("function");
    let count = ctx
        .symbols
        .get_local("_args")
        .and_then(|args| args.len())
        .unwrap_or(0) as i64;
    if count < min || (max >= 0 && count > max) {
        return Err(Error::new(ErrorKind::ArgumentCount).context(name));
    }
    Ok(())
}

/// Check the top of stack against a declared type, per strictness.
pub(crate) fn required_type(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let Operand::Value(Value::Type(required)) = operand else {
        return Err(Error::new(ErrorKind::InvalidTypeSpec).context(operand));
    };
    let value = ctx.pop_value()?;
    let value = match ctx.strictness {
        Strictness::Strict if !value.type_of().matches(required) && !value.is_nil() => {
            return Err(Error::new(ErrorKind::TypeMismatch)
                .context(format!("{} is not {}", value.type_name(), required)));
        }
        Strictness::Strict | Strictness::Dynamic => value,
        Strictness::Relaxed => coerce(&value, required)?,
    };
    ctx.push(value);
    Ok(())
}

pub(crate) fn static_typing(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let level = operand
        .as_int()
        .ok_or_else(|| Error::new(ErrorKind::InvalidDirective).context(operand))?;
    ctx.strictness = Strictness::from_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::ByteCode;
    use crate::runtime::Runtime;
    use crate::value::{Kind, Type};
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> String {
        let (runtime, output) = Runtime::with_capture();
        runtime.run("test", source).unwrap();
        output.contents()
    }

    #[test]
    fn test_print_joins_with_spaces() {
        assert_eq!(run("print \"a\", 1, true, nil"), "a 1 true <nil>\n");
        assert_eq!(run("print"), "\n");
    }

    #[test]
    fn test_parameter_types_convert() {
        let source = "func twice(n int) int { return n * 2 }\nprint twice(\"4\")";
        assert_eq!(run(source), "8\n");
        assert_eq!(run(&format!("@type strict\n{}", source)), "8\n");
    }

    fn check_type(strictness: Strictness, value: Value) -> Result<Value> {
        let (runtime, _) = Runtime::with_capture();
        let code = Arc::new(ByteCode::new("check"));
        let mut ctx = Context::new(&runtime, code, runtime.root());
        ctx.strictness = strictness;
        ctx.push(value);
        required_type(&mut ctx, &Operand::Value(Value::Type(Type::of(Kind::Int))))?;
        ctx.pop()
    }

    #[test]
    fn test_required_type_by_strictness() {
        let err = check_type(Strictness::Strict, Value::string("4")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert_eq!(check_type(Strictness::Strict, Value::Int(4)).unwrap(), Value::Int(4));
        assert_eq!(check_type(Strictness::Relaxed, Value::string("4")).unwrap(), Value::Int(4));
        assert_eq!(
            check_type(Strictness::Dynamic, Value::string("4")).unwrap(),
            Value::string("4")
        );
    }

    #[test]
    fn test_methods_see_receiver() {
        let source = "type Point struct { x int; y int }\n\
                      func (p Point) Sum() int { return p.x + p.y }\n\
                      pt := Point{x: 2, y: 3}\n\
                      print pt.Sum()";
        assert_eq!(run(source), "5\n");
    }

    #[test]
    fn test_timer_directive() {
        let source = "@timer start\nx := 1\n@timer stop";
        let output = run(source);
        assert!(!output.is_empty());
    }
}
