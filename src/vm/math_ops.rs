//! Arithmetic, logic, bitwise and comparison opcodes.
//!
//! Every diadic handler pops its operands through [`operands`], which applies
//! the context's strictness: strict requires matching scalar kinds, relaxed
//! promotes both sides to the wider kind, and dynamic promotes where it can
//! and falls back to comparing string forms.

use std::cmp::Ordering;

use crate::bytecode::Operand;
use crate::config::Strictness;
use crate::error::{Error, ErrorKind, Result};
use crate::value::coerce::{coerce, normalize};
use crate::value::{read, Value};
use crate::vm::context::Context;

fn invalid(a: &Value, b: &Value) -> Error {
    Error::new(ErrorKind::InvalidType).context(format!("{} and {}", a.type_name(), b.type_name()))
}

fn mismatch(a: &Value, b: &Value) -> Error {
    Error::new(ErrorKind::TypeMismatch).context(format!("{} and {}", a.type_name(), b.type_name()))
}

/// Bring two operands to a common kind per the strictness level.
fn unify(strictness: Strictness, a: Value, b: Value) -> Result<(Value, Value)> {
    let (ka, kb) = (a.kind(), b.kind());
    if ka == kb || !ka.is_scalar() || !kb.is_scalar() {
        return Ok((a, b));
    }
    match strictness {
        Strictness::Strict => Err(mismatch(&a, &b)),
        Strictness::Relaxed => normalize(&a, &b),
        Strictness::Dynamic => Ok(normalize(&a, &b)
            .unwrap_or_else(|_| (Value::String(a.to_string()), Value::String(b.to_string())))),
    }
}

fn operands(ctx: &mut Context) -> Result<(Value, Value)> {
    let b = ctx.pop_value()?;
    let a = ctx.pop_value()?;
    unify(ctx.strictness, a, b)
}

/// Apply an integer or float operation to two operands of the same numeric
/// kind, keeping that kind.
fn numeric(
    a: &Value,
    b: &Value,
    int_op: impl Fn(i64, i64) -> Result<i64>,
    float_op: impl Fn(f64, f64) -> Result<f64>,
) -> Result<Value> {
    Ok(match (a, b) {
        (Value::Byte(x), Value::Byte(y)) => Value::Byte(int_op(*x as i64, *y as i64)? as u8),
        (Value::Int32(x), Value::Int32(y)) => Value::Int32(int_op(*x as i64, *y as i64)? as i32),
        (Value::Int(x), Value::Int(y)) => Value::Int(int_op(*x, *y)?),
        (Value::Int64(x), Value::Int64(y)) => Value::Int64(int_op(*x, *y)?),
        (Value::Float32(x), Value::Float32(y)) => {
            Value::Float32(float_op(*x as f64, *y as f64)? as f32)
        }
        (Value::Float64(x), Value::Float64(y)) => Value::Float64(float_op(*x, *y)?),
        _ => return Err(invalid(a, b)),
    })
}

fn binary(ctx: &mut Context, op: impl Fn(&Value, &Value) -> Result<Value>) -> Result<()> {
    let (a, b) = operands(ctx)?;
    let result = op(&a, &b)?;
    ctx.push(result);
    Ok(())
}

pub(crate) fn add(ctx: &mut Context, _: &Operand) -> Result<()> {
    binary(ctx, |a, b| match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            let x = read(x);
            let mut items = x.items.clone();
            items.extend(read(y).items.iter().cloned());
            Ok(Value::typed_array(x.element.clone(), items))
        }
        (Value::Array(x), item) => {
            let x = read(x);
            let mut items = x.items.clone();
            items.push(coerce(item, &x.element)?);
            Ok(Value::typed_array(x.element.clone(), items))
        }
        (Value::Struct(x), Value::Struct(y)) => {
            let merged = read(x).merge(&read(y));
            Ok(Value::from_struct(merged))
        }
        (Value::String(x), Value::String(y)) => Ok(Value::String(format!("{}{}", x, y))),
        _ => numeric(
            a,
            b,
            |x, y| Ok(x.wrapping_add(y)),
            |x, y| Ok(x + y),
        ),
    })
}

pub(crate) fn sub(ctx: &mut Context, _: &Operand) -> Result<()> {
    binary(ctx, |a, b| match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(Value::String(x.replace(y.as_str(), ""))),
        (Value::Array(x), item) => {
            let x = read(x);
            let items = x.items.iter().filter(|v| !v.deep_equal(item)).cloned().collect();
            Ok(Value::typed_array(x.element.clone(), items))
        }
        _ => numeric(
            a,
            b,
            |x, y| Ok(x.wrapping_sub(y)),
            |x, y| Ok(x - y),
        ),
    })
}

pub(crate) fn mul(ctx: &mut Context, _: &Operand) -> Result<()> {
    binary(ctx, |a, b| {
        numeric(a, b, |x, y| Ok(x.wrapping_mul(y)), |x, y| Ok(x * y))
    })
}

fn division_by_zero() -> Error {
    Error::new(ErrorKind::DivisionByZero)
}

pub(crate) fn div(ctx: &mut Context, _: &Operand) -> Result<()> {
    binary(ctx, |a, b| {
        numeric(
            a,
            b,
            |x, y| {
                if y == 0 {
                    return Err(division_by_zero());
                }
                Ok(x.wrapping_div(y))
            },
            |x, y| {
                if y == 0.0 {
                    return Err(division_by_zero());
                }
                Ok(x / y)
            },
        )
    })
}

pub(crate) fn modulo(ctx: &mut Context, _: &Operand) -> Result<()> {
    binary(ctx, |a, b| {
        numeric(
            a,
            b,
            |x, y| {
                if y == 0 {
                    return Err(division_by_zero());
                }
                Ok(x.wrapping_rem(y))
            },
            |x, y| {
                if y == 0.0 {
                    return Err(division_by_zero());
                }
                Ok(x % y)
            },
        )
    })
}

pub(crate) fn exp(ctx: &mut Context, _: &Operand) -> Result<()> {
    binary(ctx, |a, b| {
        numeric(
            a,
            b,
            |x, y| {
                if y < 0 {
                    return Ok(if x == 1 { 1 } else { 0 });
                }
                Ok(x.wrapping_pow(y.min(u32::MAX as i64) as u32))
            },
            |x, y| Ok(x.powf(y)),
        )
    })
}

/// Numeric negation, or logical not for booleans.
pub(crate) fn negate(ctx: &mut Context, _: &Operand) -> Result<()> {
    let value = ctx.pop_value()?;
    let result = match value {
        Value::Bool(b) => Value::Bool(!b),
        Value::Byte(n) => Value::Byte(n.wrapping_neg()),
        Value::Int32(n) => Value::Int32(n.wrapping_neg()),
        Value::Int(n) => Value::Int(n.wrapping_neg()),
        Value::Int64(n) => Value::Int64(n.wrapping_neg()),
        Value::Float32(n) => Value::Float32(-n),
        Value::Float64(n) => Value::Float64(-n),
        Value::Nil => Value::Bool(true),
        other => return Err(Error::new(ErrorKind::InvalidType).context(other.type_name())),
    };
    ctx.push(result);
    Ok(())
}

pub(crate) fn and(ctx: &mut Context, _: &Operand) -> Result<()> {
    let b = ctx.pop_value()?;
    let a = ctx.pop_value()?;
    ctx.push(Value::Bool(a.is_truthy() && b.is_truthy()));
    Ok(())
}

pub(crate) fn or(ctx: &mut Context, _: &Operand) -> Result<()> {
    let b = ctx.pop_value()?;
    let a = ctx.pop_value()?;
    ctx.push(Value::Bool(a.is_truthy() || b.is_truthy()));
    Ok(())
}

fn bitwise(ctx: &mut Context, int_op: fn(i64, i64) -> i64, bool_op: fn(bool, bool) -> bool) -> Result<()> {
    binary(ctx, |a, b| match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(bool_op(*x, *y))),
        (x, y) if x.kind().is_integer() => numeric(x, y, |p, q| Ok(int_op(p, q)), |_, _| {
            Err(invalid(a, b))
        }),
        _ => Err(invalid(a, b)),
    })
}

pub(crate) fn bit_and(ctx: &mut Context, _: &Operand) -> Result<()> {
    bitwise(ctx, |x, y| x & y, |x, y| x && y)
}

pub(crate) fn bit_or(ctx: &mut Context, _: &Operand) -> Result<()> {
    bitwise(ctx, |x, y| x | y, |x, y| x || y)
}

/// Shift left by a positive count, right by a negative one.
pub(crate) fn bit_shift(ctx: &mut Context, _: &Operand) -> Result<()> {
    let count = ctx.pop_value()?;
    let value = ctx.pop_value()?;
    let (Some(n), Some(shift)) = (
        value.as_int().filter(|_| value.kind().is_integer()),
        count.as_int().filter(|_| count.kind().is_integer()),
    ) else {
        return Err(invalid(&value, &count));
    };
    let shifted = if shift >= 0 {
        n.checked_shl(shift as u32).unwrap_or(0)
    } else {
        n.checked_shr(shift.unsigned_abs() as u32).unwrap_or(if n < 0 { -1 } else { 0 })
    };
    let result = coerce(&Value::Int(shifted), &value.type_of())?;
    ctx.push(result);
    Ok(())
}

fn compare(a: &Value, b: &Value) -> Result<Ordering> {
    let ordering = match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (x, y) if x.kind().is_integer() && y.kind().is_integer() => x.as_int().zip(y.as_int()).map(|(p, q)| p.cmp(&q)),
        (x, y) if x.kind().is_numeric() && y.kind().is_numeric() => {
            x.as_float().zip(y.as_float()).and_then(|(p, q)| p.partial_cmp(&q))
        }
        _ => None,
    };
    ordering.ok_or_else(|| invalid(a, b))
}

fn ordered(ctx: &mut Context, test: fn(Ordering) -> bool) -> Result<()> {
    let (a, b) = operands(ctx)?;
    let result = test(compare(&a, &b)?);
    ctx.push(Value::Bool(result));
    Ok(())
}

fn equality(ctx: &mut Context) -> Result<bool> {
    let (a, b) = operands(ctx)?;
    Ok(a.deep_equal(&b))
}

pub(crate) fn equal(ctx: &mut Context, _: &Operand) -> Result<()> {
    let result = equality(ctx)?;
    ctx.push(Value::Bool(result));
    Ok(())
}

pub(crate) fn not_equal(ctx: &mut Context, _: &Operand) -> Result<()> {
    let result = equality(ctx)?;
    ctx.push(Value::Bool(!result));
    Ok(())
}

pub(crate) fn less_than(ctx: &mut Context, _: &Operand) -> Result<()> {
    ordered(ctx, |o| o == Ordering::Less)
}

pub(crate) fn less_than_or_equal(ctx: &mut Context, _: &Operand) -> Result<()> {
    ordered(ctx, |o| o != Ordering::Greater)
}

pub(crate) fn greater_than(ctx: &mut Context, _: &Operand) -> Result<()> {
    ordered(ctx, |o| o == Ordering::Greater)
}

pub(crate) fn greater_than_or_equal(ctx: &mut Context, _: &Operand) -> Result<()> {
    ordered(ctx, |o| o != Ordering::Less)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> String {
        let (runtime, output) = Runtime::with_capture();
        runtime.run("test", source).unwrap();
        output.contents()
    }

    fn fail(source: &str) -> ErrorKind {
        let (runtime, _) = Runtime::with_capture();
        runtime.run("test", source).unwrap_err().kind
    }

    #[test]
    fn test_precedence_and_kinds() {
        assert_eq!(run("print 1+2*3"), "7\n");
        assert_eq!(run("print 7 / 2, 7.0 / 2, 7 % 3, 2 ^ 10"), "3 3.5 1 1024\n");
        assert_eq!(run("print -3 + 1, !true, 1 << 4, 256 >> 4"), "-2 false 16 16\n");
        assert_eq!(run("print 6 & 3, 6 | 3, true & false"), "2 7 false\n");
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(fail("print 1 / 0"), ErrorKind::DivisionByZero);
        assert_eq!(fail("print 1.5 / 0.0"), ErrorKind::DivisionByZero);
        assert_eq!(fail("print 5 % 0"), ErrorKind::DivisionByZero);
    }

    #[test]
    fn test_string_and_array_operators() {
        assert_eq!(run("print \"ab\" + \"cd\", \"banana\" - \"an\""), "abcd ba\n");
        assert_eq!(run("print [1, 2] + [3], [1, 2, 1] - 1"), "[1, 2, 3] [2]\n");
        assert_eq!(run("print \"abc\" < \"abd\", 2 >= 2.0, 1 != 2"), "true true true\n");
    }

    #[test]
    fn test_strictness_levels() {
        assert_eq!(run("print 1 + 2.5, true + 1"), "3.5 2\n");
        assert_eq!(fail("@type strict\nprint 1 + 2.5"), ErrorKind::TypeMismatch);
        assert_eq!(fail("@type strict\nprint true + 1"), ErrorKind::TypeMismatch);
        assert_eq!(run("@type dynamic\nprint 1 + \"x\""), "1x\n");
    }

    #[test]
    fn test_unify_dynamic_falls_back_to_strings() {
        let (a, b) = unify(Strictness::Dynamic, Value::Bool(true), Value::string("x")).unwrap();
        assert_eq!((a, b), (Value::string("true"), Value::string("x")));
    }

    #[test]
    fn test_void_result_in_operator() {
        assert_eq!(fail("func f() {}\nprint f() + 1"), ErrorKind::VoidReturn);
    }
}
