//! The `math` package.

use std::sync::Arc;

use rand::Rng;

use crate::builtins::{define, define_value, float_arg, int_arg, NativeContext, NativeFunction};
use crate::error::{Error, ErrorKind, Result};
use crate::symbols::SymbolTable;
use crate::value::{read, Value};

pub fn register_math_builtins(root: &Arc<SymbolTable>) {
    define_value(root, "math.Pi", Value::Float64(std::f64::consts::PI));
    define_value(root, "math.E", Value::Float64(std::f64::consts::E));

    define(
        root,
        NativeFunction::new("math.abs", 1, Some(1), |_, args| match &args[0] {
            Value::Float32(n) => Ok(Value::Float32(n.abs())),
            Value::Float64(n) => Ok(Value::Float64(n.abs())),
            v if v.kind().is_integer() => Ok(Value::Int(int_arg("math.abs", args, 0)?.abs())),
            other => Err(Error::new(ErrorKind::ArgumentType).context(other.type_name())),
        }),
    );
    define(root, NativeFunction::new("math.min", 1, None, |_, args| extreme(args, true)));
    define(root, NativeFunction::new("math.max", 1, None, |_, args| extreme(args, false)));
    define(
        root,
        NativeFunction::new("math.sqrt", 1, Some(1), |_, args| {
            Ok(Value::Float64(float_arg("math.sqrt", args, 0)?.sqrt()))
        }),
    );
    define(
        root,
        NativeFunction::new("math.pow", 2, Some(2), |_, args| {
            let base = float_arg("math.pow", args, 0)?;
            let exp = float_arg("math.pow", args, 1)?;
            Ok(Value::Float64(base.powf(exp)))
        }),
    );
    define(
        root,
        NativeFunction::new("math.floor", 1, Some(1), |_, args| {
            Ok(Value::Float64(float_arg("math.floor", args, 0)?.floor()))
        }),
    );
    define(
        root,
        NativeFunction::new("math.ceil", 1, Some(1), |_, args| {
            Ok(Value::Float64(float_arg("math.ceil", args, 0)?.ceil()))
        }),
    );
    define(
        root,
        NativeFunction::new("math.round", 1, Some(2), |_, args| {
            let n = float_arg("math.round", args, 0)?;
            let places = if args.len() > 1 {
                int_arg("math.round", args, 1)?
            } else {
                0
            };
            let scale = 10f64.powi(places as i32);
            Ok(Value::Float64((n * scale).round() / scale))
        }),
    );
    define(root, NativeFunction::new("math.sum", 0, None, builtin_sum));
    define(
        root,
        NativeFunction::new("math.random", 0, Some(1), |_, args| {
            let mut rng = rand::thread_rng();
            match args.first() {
                None => Ok(Value::Float64(rng.gen::<f64>())),
                Some(_) => {
                    let limit = int_arg("math.random", args, 0)?;
                    if limit <= 0 {
                        return Err(Error::new(ErrorKind::ArgumentType).context("math.random"));
                    }
                    Ok(Value::Int(rng.gen_range(0..limit)))
                }
            }
        }),
    );
    define(
        root,
        NativeFunction::new("math.log", 1, Some(1), |_, args| {
            Ok(Value::Float64(float_arg("math.log", args, 0)?.ln()))
        }),
    );
}

/// Arguments as a flat list; a single array argument is expanded.
fn numbers(args: &[Value]) -> Vec<Value> {
    match args {
        [Value::Array(a)] => read(a).items.clone(),
        _ => args.to_vec(),
    }
}

fn extreme(args: &[Value], smallest: bool) -> Result<Value> {
    let values = numbers(args);
    let mut best: Option<&Value> = None;
    for value in &values {
        let n = value
            .as_float()
            .filter(|_| value.kind().is_numeric())
            .ok_or_else(|| Error::new(ErrorKind::ArgumentType).context(value.type_name()))?;
        let replace = match best.and_then(Value::as_float) {
            None => true,
            Some(current) => (smallest && n < current) || (!smallest && n > current),
        };
        if replace {
            best = Some(value);
        }
    }
    best.cloned()
        .ok_or_else(|| Error::new(ErrorKind::ArgumentCount).context("math.min/max"))
}

fn builtin_sum(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let values = numbers(args);
    if values.iter().all(|v| v.kind().is_integer()) {
        let total = values.iter().filter_map(Value::as_int).fold(0i64, i64::wrapping_add);
        return Ok(Value::Int(total));
    }
    let mut total = 0.0;
    for value in &values {
        total += value
            .as_float()
            .filter(|_| value.kind().is_numeric())
            .ok_or_else(|| Error::new(ErrorKind::ArgumentType).context(value.type_name()))?;
    }
    Ok(Value::Float64(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extremes_keep_kind() {
        assert_eq!(extreme(&[Value::Int(3), Value::Int(1)], true).unwrap(), Value::Int(1));
        let arr = Value::array(vec![Value::Float64(1.5), Value::Int(4)]);
        assert!(matches!(extreme(&[arr], false).unwrap(), Value::Int(4)));
        assert!(extreme(&[Value::string("x")], true).is_err());
    }

    #[test]
    fn test_numbers_expand_single_array() {
        let arr = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(numbers(&[arr]).len(), 2);
        assert_eq!(numbers(&[Value::Int(1), Value::Int(2), Value::Int(3)]).len(), 3);
    }
}
