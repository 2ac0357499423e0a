//! The `json` package. Both functions report failures as a second result.

use std::sync::Arc;

use serde_json::{Map, Number, Value as Json};

use crate::builtins::{define, string_arg, NativeFunction};
use crate::error::{Error, ErrorKind, Result};
use crate::symbols::SymbolTable;
use crate::value::coerce::coerce;
use crate::value::{read, StructValue, Value};

pub fn register_json_builtins(root: &Arc<SymbolTable>) {
    define(
        root,
        NativeFunction::new("json.marshal", 1, Some(2), |_, args| {
            let json = to_json(&args[0])?;
            let pretty = args.get(1).is_some_and(Value::is_truthy);
            let text = if pretty {
                serde_json::to_string_pretty(&json)?
            } else {
                serde_json::to_string(&json)?
            };
            Ok(Value::String(text))
        })
        .error_return(),
    );
    define(
        root,
        NativeFunction::new("json.unmarshal", 1, Some(2), |_, args| {
            let json: Json = serde_json::from_str(&string_arg(args, 0))?;
            let value = from_json(&json);
            match args.get(1) {
                Some(Value::Type(t)) => coerce(&value, t),
                Some(other) => Err(Error::new(ErrorKind::ArgumentType).context(other.type_name())),
                None => Ok(value),
            }
        })
        .error_return(),
    );
}

/// Convert a runtime value to JSON. Structs and maps become objects.
pub fn to_json(value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Nil => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Float32(_) | Value::Float64(_) => {
            let f = value.as_float().unwrap_or(0.0);
            Number::from_f64(f)
                .map(Json::Number)
                .ok_or_else(|| Error::new(ErrorKind::InvalidConversion).context(f))?
        }
        v if v.kind().is_integer() => Json::Number(Number::from(v.as_int().unwrap_or(0))),
        Value::String(s) => Json::String(s.clone()),
        Value::Array(a) => Json::Array(
            read(a)
                .items
                .iter()
                .map(to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Struct(s) => {
            let s = read(s);
            let mut object = Map::new();
            for key in s.keys() {
                if let Some(field) = s.fields.get(&key) {
                    object.insert(key, to_json(field)?);
                }
            }
            Json::Object(object)
        }
        Value::Map(m) => {
            let m = read(m);
            let mut object = Map::new();
            for (key, entry) in &m.entries {
                object.insert(key.to_string(), to_json(entry)?);
            }
            Json::Object(object)
        }
        Value::Error(e) => Json::String(e.message()),
        Value::Marker(_) => return Err(Error::new(ErrorKind::VoidReturn)),
        other => Json::String(other.to_string()),
    })
}

/// Convert parsed JSON to a runtime value. Objects become anonymous structs.
pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float64(n.as_f64().unwrap_or(0.0)),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::array(items.iter().map(from_json).collect()),
        Json::Object(object) => {
            let mut s = StructValue::new();
            for (key, item) in object {
                s.fields.insert(key.clone(), from_json(item));
            }
            Value::from_struct(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_struct_marshals_sorted() {
        let mut s = StructValue::new();
        s.fields.insert("b".into(), Value::array(vec![Value::Int(1), Value::Float64(2.5)]));
        s.fields.insert("a".into(), Value::string("x"));
        let text = serde_json::to_string(&to_json(&Value::from_struct(s)).unwrap()).unwrap();
        assert_eq!(text, r#"{"a":"x","b":[1,2.5]}"#);
    }

    #[test]
    fn test_unmarshal_builds_structs() {
        let json: Json = serde_json::from_str(r#"{"n": 3, "tags": ["x"], "ok": null}"#).unwrap();
        let value = from_json(&json);
        assert_eq!(value.to_string(), "{n: 3, ok: <nil>, tags: [\"x\"]}");
    }

    #[test]
    fn test_error_return_in_program() {
        let (runtime, output) = Runtime::with_capture();
        let source = r#"
v, err := json.unmarshal("{bad")
print v == nil, err != nil
s, err := json.marshal([1, 2])
print s, err
"#;
        runtime.run("test", source).unwrap();
        assert_eq!(output.contents(), "true true\n[1,2] <nil>\n");
    }
}
