//! Root-level builtins: `len append delete new make typeof index close sort`
//! plus the internal helpers the compiler calls (`$go`, `$rangekeys`,
//! `$global`).

use std::cmp::Ordering;
use std::sync::Arc;

use crate::builtins::{define, int_arg, NativeContext, NativeFunction};
use crate::error::{Error, ErrorKind, Result};
use crate::symbols::SymbolTable;
use crate::value::coerce::coerce;
use crate::value::{read, write, Channel, Kind, MapValue, StructValue, Type, Value};

/// Type names bound at the root so that `int(x)` casts and `typeof(x) == int`
/// compares.
pub fn type_names() -> Vec<(&'static str, Type)> {
    [
        "bool", "byte", "int", "int32", "int64", "float32", "float64", "string", "error", "any",
    ]
    .into_iter()
    .filter_map(|name| Type::from_name(name).map(|t| (name, t)))
    .collect()
}

pub fn register_global_builtins(root: &Arc<SymbolTable>) {
    define(root, NativeFunction::new("len", 1, Some(1), builtin_len));
    define(root, NativeFunction::new("append", 1, None, builtin_append));
    define(root, NativeFunction::new("delete", 2, Some(2), builtin_delete));
    define(root, NativeFunction::new("new", 1, Some(1), builtin_new));
    define(root, NativeFunction::new("make", 1, Some(2), builtin_make));
    define(
        root,
        NativeFunction::new("typeof", 1, Some(1), |_, args| Ok(Value::Type(args[0].type_of()))),
    );
    define(root, NativeFunction::new("index", 2, Some(2), builtin_index));
    define(
        root,
        NativeFunction::new("close", 1, Some(1), |_, args| match &args[0] {
            Value::Channel(ch) => ch.close().map(|_| Value::Nil),
            other => Err(Error::new(ErrorKind::ArgumentType).context(other.type_name())),
        }),
    );
    define(root, NativeFunction::new("sort", 1, Some(2), builtin_sort));

    define(root, NativeFunction::new("$go", 1, None, builtin_go));
    define(root, NativeFunction::new("$rangekeys", 1, Some(1), builtin_range_keys));
    define(
        root,
        NativeFunction::new("$global", 2, Some(2), |ctx, args| {
            let name = args[0].to_string();
            let root = ctx.runtime.root();
            root.set_always(&name, args[1].clone());
            Ok(Value::Nil)
        }),
    );
}

fn builtin_len(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    args[0]
        .len()
        .map(|n| Value::Int(n as i64))
        .ok_or_else(|| Error::new(ErrorKind::ArgumentType).context(args[0].type_name()))
}

/// `append(a, items...)` returns a new array; the original is untouched.
fn builtin_append(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let (element, mut items) = match &args[0] {
        Value::Array(a) => {
            let a = read(a);
            (a.element.clone(), a.items.clone())
        }
        Value::Nil => (Type::interface(), Vec::new()),
        other => return Err(Error::new(ErrorKind::ArgumentType).context(other.type_name())),
    };
    for item in &args[1..] {
        items.push(coerce(item, &element)?);
    }
    Ok(Value::typed_array(element, items))
}

fn builtin_delete(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Map(m) => {
            write(m).delete(&args[1])?;
            Ok(Value::Nil)
        }
        Value::Struct(s) => {
            let mut s = write(s);
            if s.readonly {
                return Err(Error::new(ErrorKind::ReadOnly).context(&args[1]));
            }
            s.fields.shift_remove(&args[1].to_string());
            Ok(Value::Nil)
        }
        other => Err(Error::new(ErrorKind::ArgumentType).context(other.type_name())),
    }
}

/// `new(T)` yields the zero value of a type. For a struct type declared with
/// `type`, the result is a fresh instance whose parent is the type itself, so
/// its methods resolve through `->`.
fn builtin_new(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Type(t) => Ok(Value::zero(t)),
        Value::Struct(template) => {
            let source = read(template);
            let mut instance = StructValue::new();
            instance.type_name = source.type_name.clone();
            instance.field_types = source.field_types.clone();
            match &source.field_types {
                Some(types) => {
                    for (name, t) in types {
                        let value = match source.fields.get(name) {
                            Some(v) => v.deep_copy(),
                            None => Value::zero(t),
                        };
                        instance.fields.insert(name.clone(), value);
                    }
                }
                None => {
                    for (name, value) in &source.fields {
                        if !value.is_callable() {
                            instance.fields.insert(name.clone(), value.deep_copy());
                        }
                    }
                }
            }
            instance.parent = Some(Arc::clone(template));
            Ok(Value::from_struct(instance))
        }
        other => Ok(other.deep_copy()),
    }
}

/// `make([]T, n)`, `make(map[K]V)`, `make(chan T, n)`.
fn builtin_make(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let Value::Type(t) = &args[0] else {
        return Err(Error::new(ErrorKind::ArgumentType).context(args[0].type_name()));
    };
    let size = if args.len() > 1 {
        int_arg("make", args, 1)?
    } else {
        0
    };
    if size < 0 {
        return Err(Error::new(ErrorKind::InvalidIndex).context(size));
    }
    match t.kind {
        Kind::Array => {
            let element = t.element_type();
            let items = (0..size).map(|_| Value::zero(&element)).collect();
            Ok(Value::typed_array(element, items))
        }
        Kind::Map => Ok(Value::from_map(MapValue::new(t.key_type(), t.element_type()))),
        Kind::Channel => Ok(Value::Channel(Arc::new(Channel::new(
            t.element_type(),
            size as usize,
        )))),
        _ => Ok(Value::zero(t)),
    }
}

/// Position of an element or substring, or -1.
fn builtin_index(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let position = match (&args[0], &args[1]) {
        (Value::String(s), needle) => {
            let needle = needle.to_string();
            s.find(&needle)
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1)
        }
        (Value::Array(a), needle) => read(a)
            .items
            .iter()
            .position(|item| item.deep_equal(needle))
            .map(|i| i as i64)
            .unwrap_or(-1),
        (Value::Map(m), key) => {
            if read(m).contains(key) {
                1
            } else {
                -1
            }
        }
        (other, _) => return Err(Error::new(ErrorKind::ArgumentType).context(other.type_name())),
    };
    Ok(Value::Int(position))
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (x, y) if x.kind().is_numeric() && y.kind().is_numeric() => x
            .as_float()
            .partial_cmp(&y.as_float())
            .unwrap_or(Ordering::Equal),
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

/// `sort(a)` or `sort(a, less)`; returns a sorted copy.
fn builtin_sort(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let Value::Array(a) = &args[0] else {
        return Err(Error::new(ErrorKind::ArgumentType).context(args[0].type_name()));
    };
    let (element, mut items) = {
        let a = read(a);
        (a.element.clone(), a.items.clone())
    };
    match args.get(1) {
        None => items.sort_by(compare),
        Some(less) => {
            // insertion sort so comparator failures propagate
            for i in 1..items.len() {
                let mut j = i;
                while j > 0 {
                    let ordered = ctx.runtime.call_function(
                        less,
                        vec![items[j].clone(), items[j - 1].clone()],
                        None,
                        &ctx.symbols,
                    )?;
                    if !ordered.is_truthy() {
                        break;
                    }
                    items.swap(j, j - 1);
                    j -= 1;
                }
            }
        }
    }
    Ok(Value::typed_array(element, items))
}

/// Launch a function on its own thread: `go f(a, b)` calls `$go(f, a, b)`.
fn builtin_go(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let func = args[0].clone();
    if !func.is_callable() {
        return Err(Error::new(ErrorKind::InvalidFunctionCall).context(func.type_name()));
    }
    ctx.runtime.spawn(func, args[1..].to_vec(), ctx.this.take());
    Ok(Value::Nil)
}

/// The keys a `for … range` loop walks: indices, sorted map keys or field
/// names, or `0..n` for an integer.
fn builtin_range_keys(_: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let indices = |n: usize| (0..n as i64).map(Value::Int).collect::<Vec<_>>();
    let keys = match &args[0] {
        Value::Array(a) => indices(read(a).items.len()),
        Value::String(s) => indices(s.chars().count()),
        Value::Map(m) => read(m).keys(),
        Value::Struct(s) => read(s).keys().into_iter().map(Value::String).collect(),
        Value::Nil => Vec::new(),
        v if v.kind().is_integer() => indices(v.as_int().unwrap_or(0).max(0) as usize),
        other => return Err(Error::new(ErrorKind::InvalidType).context(other.type_name())),
    };
    Ok(Value::array(keys))
}
