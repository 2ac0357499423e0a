//! Conversions between value kinds.

use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::value::{read, Kind, MapKey, MapValue, StructValue, Type, Value};

/// Promote two scalars to the wider of their kinds. Non-scalar operands
/// are returned unchanged.
pub fn normalize(a: &Value, b: &Value) -> Result<(Value, Value)> {
    let (ka, kb) = (a.kind(), b.kind());
    if ka == kb || !ka.is_scalar() || !kb.is_scalar() {
        return Ok((a.clone(), b.clone()));
    }
    let target = Type::of(ka.max(kb));
    Ok((coerce(a, &target)?, coerce(b, &target)?))
}

/// Convert a value to the given type, the way a cast does.
pub fn coerce(value: &Value, target: &Type) -> Result<Value> {
    if let Value::Marker(_) = value {
        return Err(Error::new(ErrorKind::VoidReturn));
    }
    if target.is_interface() || target.kind == Kind::Pointer {
        return Ok(value.clone());
    }
    if target.kind.is_scalar() {
        return coerce_scalar(value, target.kind);
    }

    match (target.kind, value) {
        (_, Value::Nil) => Ok(Value::zero(target)),
        (Kind::Array, Value::Array(a)) => {
            let element = target.element_type();
            if element.is_interface() || read(a).element == element {
                return Ok(value.clone());
            }
            let items = read(a)
                .items
                .iter()
                .map(|v| coerce(v, &element))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::typed_array(element, items))
        }
        (Kind::Array, Value::String(s)) if target.element_type().kind == Kind::Byte => Ok(
            Value::typed_array(Type::of(Kind::Byte), s.bytes().map(Value::Byte).collect()),
        ),
        (Kind::Map, Value::Map(m)) => {
            let source = read(m);
            if source.key_type == target.key_type() && source.value_type == target.element_type() {
                return Ok(value.clone());
            }
            let mut map = MapValue::new(target.key_type(), target.element_type());
            for (k, v) in &source.entries {
                map.set(&k.to_value(&source.key_type), v.clone())?;
            }
            Ok(Value::from_map(map))
        }
        (Kind::Map, Value::Struct(s)) => {
            let source = read(s);
            let mut map = MapValue::new(target.key_type(), target.element_type());
            for key in source.keys() {
                if let Some(v) = source.fields.get(&key) {
                    map.set(&Value::String(key.clone()), v.clone())?;
                }
            }
            Ok(Value::from_map(map))
        }
        (Kind::Struct, Value::Struct(_)) => Ok(value.clone()),
        (Kind::Struct, Value::Map(m)) => {
            let source = read(m);
            let mut s = StructValue::new();
            for (k, v) in &source.entries {
                if let MapKey::String(name) = k {
                    s.fields.insert(name.clone(), v.clone());
                }
            }
            Ok(Value::from_struct(s))
        }
        (Kind::Error, Value::Error(_)) => Ok(value.clone()),
        (Kind::Error, Value::String(s)) => Ok(Value::Error(Arc::new(Error::native(s.clone())))),
        (Kind::Function, v) if matches!(v, Value::Function(_) | Value::Native(_)) => {
            Ok(value.clone())
        }
        (kind, v) if v.kind() == kind => Ok(value.clone()),
        _ => Err(conversion_error(value, target)),
    }
}

fn conversion_error(value: &Value, target: &Type) -> Error {
    Error::new(ErrorKind::InvalidConversion).context(format!("{} to {}", value.type_name(), target))
}

fn coerce_scalar(value: &Value, kind: Kind) -> Result<Value> {
    if value.kind() == kind {
        return Ok(value.clone());
    }
    if value.is_nil() {
        return Ok(Value::zero(&Type::of(kind)));
    }

    let bad = || conversion_error(value, &Type::of(kind));

    if kind == Kind::String {
        return match value {
            v if v.kind().is_scalar() => Ok(Value::String(v.to_string())),
            Value::Error(e) => Ok(Value::String(e.message())),
            Value::Array(a) if read(a).element.kind == Kind::Byte => {
                let bytes: Vec<u8> = read(a)
                    .items
                    .iter()
                    .filter_map(|v| v.as_int().map(|n| n as u8))
                    .collect();
                Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            }
            other => Ok(Value::String(other.to_string())),
        };
    }

    if kind == Kind::Bool {
        return match value {
            Value::String(s) => match s.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(bad()),
            },
            v if v.kind().is_numeric() => Ok(Value::Bool(v.is_truthy())),
            _ => Err(bad()),
        };
    }

    if kind.is_float() {
        let f = match value {
            Value::String(s) => s.trim().parse::<f64>().map_err(|_| bad())?,
            v => v.as_float().ok_or_else(bad)?,
        };
        return Ok(if kind == Kind::Float32 {
            Value::Float32(f as f32)
        } else {
            Value::Float64(f)
        });
    }

    let n = match value {
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(n) => n,
                Err(_) => s.parse::<f64>().map_err(|_| bad())? as i64,
            }
        }
        v => v.as_int().ok_or_else(bad)?,
    };
    Ok(match kind {
        Kind::Byte => Value::Byte(n as u8),
        Kind::Int32 => Value::Int32(n as i32),
        Kind::Int64 => Value::Int64(n),
        _ => Value::Int(n),
    })
}
