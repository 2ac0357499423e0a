//! Symbol, index, member and literal construction opcodes.

use crate::builtins;
use crate::bytecode::Operand;
use crate::error::{Error, ErrorKind, Result};
use crate::value::coerce::coerce;
use crate::value::{read, write, MapValue, StructValue, Type, Value};
use crate::vm::context::Context;

fn name(operand: &Operand) -> Result<&str> {
    operand
        .as_name()
        .ok_or_else(|| Error::new(ErrorKind::InvalidSymbolName).context(operand))
}

fn type_operand(operand: &Operand) -> Result<&Type> {
    match operand {
        Operand::Value(Value::Type(t)) => Ok(t),
        other => Err(Error::new(ErrorKind::InvalidTypeSpec).context(other)),
    }
}

fn index_of(value: &Value, len: usize) -> Result<usize> {
    let index = value
        .as_int()
        .filter(|_| value.kind().is_integer())
        .ok_or_else(|| Error::new(ErrorKind::InvalidIndex).context(value.type_name()))?;
    if index < 0 || index as usize >= len {
        return Err(Error::new(ErrorKind::InvalidIndex).context(index));
    }
    Ok(index as usize)
}

pub(crate) fn load(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let name = name(operand)?;
    let value = ctx
        .symbols
        .get(name)
        .ok_or_else(|| Error::new(ErrorKind::UnknownIdentifier).context(name))?;
    ctx.push(value);
    Ok(())
}

pub(crate) fn store(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let name = name(operand)?;
    let value = ctx.pop_value()?;
    ctx.symbols.set(name, value)
}

pub(crate) fn load_index(ctx: &mut Context, _: &Operand) -> Result<()> {
    let index = ctx.pop_value()?;
    let container = ctx.pop_value()?;
    let value = match &container {
        Value::Array(a) => {
            let a = read(a);
            let i = index_of(&index, a.items.len())?;
            a.items[i].clone()
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let c = chars[index_of(&index, chars.len())?];
            match u8::try_from(c as u32) {
                Ok(byte) => Value::Byte(byte),
                Err(_) => Value::Int32(c as i32),
            }
        }
        Value::Map(m) => read(m).get(&index)?,
        Value::Struct(s) => {
            let key = index.to_string();
            read(s)
                .get_inherited(&key)
                .ok_or_else(|| Error::new(ErrorKind::InvalidField).context(key))?
        }
        other => return Err(Error::new(ErrorKind::InvalidType).context(other.type_name())),
    };
    ctx.push(value);
    Ok(())
}

/// Pops value, index and container; pushes the container back.
pub(crate) fn store_index(ctx: &mut Context, _: &Operand) -> Result<()> {
    let value = ctx.pop_value()?;
    let index = ctx.pop_value()?;
    let container = ctx.pop_value()?;
    match &container {
        Value::Array(a) => {
            let mut a = write(a);
            if a.readonly {
                return Err(Error::new(ErrorKind::ReadOnly).context(index));
            }
            let i = index_of(&index, a.items.len())?;
            let value = coerce(&value, &a.element)?;
            a.items[i] = value;
        }
        Value::Map(m) => write(m).set(&index, value)?,
        Value::Struct(s) => write(s).set(&index.to_string(), value)?,
        other => return Err(Error::new(ErrorKind::InvalidType).context(other.type_name())),
    }
    ctx.push(container);
    Ok(())
}

/// `container[lo:hi]` with both bounds in `[0, len]` and `lo <= hi`.
pub(crate) fn load_slice(ctx: &mut Context, _: &Operand) -> Result<()> {
    let hi = ctx.pop_value()?;
    let lo = ctx.pop_value()?;
    let container = ctx.pop_value()?;
    let len = container
        .len()
        .ok_or_else(|| Error::new(ErrorKind::InvalidType).context(container.type_name()))?;
    let bound = |v: &Value| {
        v.as_int()
            .filter(|n| *n >= 0 && *n as usize <= len)
            .map(|n| n as usize)
    };
    let (lo, hi) = match (bound(&lo), bound(&hi)) {
        (Some(lo), Some(hi)) if lo <= hi => (lo, hi),
        _ => return Err(Error::new(ErrorKind::InvalidSlice).context(format!("[{}:{}]", lo, hi))),
    };
    let value = match &container {
        Value::Array(a) => {
            let a = read(a);
            Value::typed_array(a.element.clone(), a.items[lo..hi].to_vec())
        }
        Value::String(s) => Value::String(s.chars().skip(lo).take(hi - lo).collect()),
        other => return Err(Error::new(ErrorKind::InvalidType).context(other.type_name())),
    };
    ctx.push(value);
    Ok(())
}

fn member_of(value: &Value, name: &str, inherited: bool) -> Result<Value> {
    let found = match value {
        Value::Struct(s) => {
            let s = read(s);
            match s.get(name) {
                Some(v) => Some(v),
                None => s
                    .get_inherited(name)
                    .filter(|v| inherited || v.is_callable()),
            }
        }
        Value::Map(m) => Some(read(m).get(&Value::string(name))?),
        _ => None,
    };
    found
        .or_else(|| builtins::method(value, name))
        .ok_or_else(|| Error::new(ErrorKind::InvalidField).context(name))
}

/// `value.name`. Structs fall back to callables on their parent chain so
/// methods declared on a type resolve from its instances.
pub(crate) fn member(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let name = name(operand)?;
    let value = ctx.pop_value()?;
    let result = member_of(&value, name, false)?;
    ctx.push(result);
    Ok(())
}

/// `value->name`: any field on the parent chain.
pub(crate) fn class_member(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let name = name(operand)?;
    let value = ctx.pop_value()?;
    let result = member_of(&value, name, true)?;
    ctx.push(result);
    Ok(())
}

/// Pack `n` values into an array, optionally typed.
pub(crate) fn array(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let (count, element) = match operand {
        Operand::Tuple(items) => (
            items.first().and_then(Operand::as_int).unwrap_or(0),
            items.get(1).map(type_operand).transpose()?.cloned(),
        ),
        other => (other.as_int().unwrap_or(0), None),
    };
    let mut items = ctx.pop_n(count.max(0) as usize)?;
    if items.iter().any(Value::is_marker) {
        return Err(Error::new(ErrorKind::VoidReturn));
    }
    let value = match element {
        Some(element) => {
            for item in items.iter_mut() {
                *item = coerce(item, &element)?;
            }
            Value::typed_array(element, items)
        }
        None => Value::array(items),
    };
    ctx.push(value);
    Ok(())
}

/// `MakeArray 1` pops a size; `MakeArray 2` pops a fill value then a size.
pub(crate) fn make_array(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let fill = if operand.as_int() == Some(2) {
        ctx.pop_value()?
    } else {
        Value::Nil
    };
    let size = ctx.pop_value()?;
    let n = size
        .as_int()
        .filter(|n| *n >= 0 && size.kind().is_integer())
        .ok_or_else(|| Error::new(ErrorKind::InvalidIndex).context(&size))?;
    let items = (0..n).map(|_| fill.deep_copy()).collect();
    ctx.push(Value::array(items));
    Ok(())
}

/// Pack `n` key/value pairs into an anonymous struct, a typed map, or a
/// package struct.
pub(crate) fn make_struct(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let (count, target) = match operand {
        Operand::Tuple(items) => (
            items.first().and_then(Operand::as_int).unwrap_or(0),
            items.get(1),
        ),
        other => (other.as_int().unwrap_or(0), None),
    };
    let values = ctx.pop_n(count.max(0) as usize * 2)?;
    if values.iter().any(Value::is_marker) {
        return Err(Error::new(ErrorKind::VoidReturn));
    }
    let pairs = values.chunks(2).map(|pair| (&pair[0], &pair[1]));
    let value = match target {
        Some(Operand::Value(Value::Type(t))) => {
            let mut map = MapValue::new(t.key_type(), t.element_type());
            for (key, value) in pairs {
                map.set(key, value.clone())?;
            }
            Value::from_map(map)
        }
        Some(Operand::Name(package)) => {
            let mut s = StructValue::package(package);
            for (key, value) in pairs {
                s.fields.insert(key.to_string(), value.clone());
            }
            Value::from_struct(s)
        }
        _ => {
            let mut s = StructValue::new();
            for (key, value) in pairs {
                s.set(&key.to_string(), value.clone())?;
            }
            Value::from_struct(s)
        }
    };
    ctx.push(value);
    Ok(())
}

pub(crate) fn coerce_top(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let target = type_operand(operand)?;
    let value = ctx.pop_value()?;
    let value = coerce(&value, target)?;
    ctx.push(value);
    Ok(())
}

/// Bind every field of a struct in the current scope (`import . "pkg"`).
pub(crate) fn explode(ctx: &mut Context, _: &Operand) -> Result<()> {
    let value = ctx.pop_value()?;
    let Value::Struct(s) = &value else {
        return Err(Error::new(ErrorKind::InvalidType).context(value.type_name()));
    };
    let s = read(s);
    for key in s.keys() {
        if let Some(field) = s.fields.get(&key) {
            ctx.symbols.set_always(&key, field.clone());
        }
    }
    Ok(())
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

    fn fail(source: &str) -> ErrorKind {
        let (runtime, _) = Runtime::with_capture();
        runtime.run("test", source).unwrap_err().kind
    }

    #[test]
    fn test_index_bounds() {
        assert_eq!(run("a := [1, 2, 3]\nprint a[0], a[2]"), "1 3\n");
        assert_eq!(fail("a := [1, 2, 3]\nprint a[3]"), ErrorKind::InvalidIndex);
        assert_eq!(fail("a := [1]\nprint a[-1]"), ErrorKind::InvalidIndex);
    }

    #[test]
    fn test_slices() {
        assert_eq!(run("a := [1, 2, 3, 4]\nprint a[1:3], a[:2], a[2:]"), "[2, 3] [1, 2] [3, 4]\n");
        assert_eq!(run("s := \"hello\"\nprint s[1:4]"), "ell\n");
        assert_eq!(fail("a := [1, 2]\nprint a[2:1]"), ErrorKind::InvalidSlice);
        assert_eq!(fail("a := [1, 2]\nprint a[0:3]"), ErrorKind::InvalidSlice);
    }

    #[test]
    fn test_store_index_on_aggregates() {
        let source = "a := [1, 2]\na[1] = 5\nm := map[string]int{}\nm[\"k\"] = 3\ns := {x: 1}\ns.x = 2\nprint a, m[\"k\"], s.x";
        assert_eq!(run(source), "[1, 5] 3 2\n");
    }

    #[test]
    fn test_typed_array_coerces_elements() {
        assert_eq!(run("a := []int{1, \"2\", 3.0}\nprint a, typeof(a)"), "[1, 2, 3] []int\n");
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!(fail("s := {x: 1}\nprint s.y"), ErrorKind::InvalidField);
    }
}
