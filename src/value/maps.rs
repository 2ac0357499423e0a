//! Typed maps.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result};
use crate::value::coerce::coerce;
use crate::value::{Kind, Type, Value};

/// A hashable map key. Floats and aggregates cannot be keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Nil,
    Bool(bool),
    Int(i64),
    String(String),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Option<MapKey> {
        match value {
            Value::Nil => Some(MapKey::Nil),
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::String(s) => Some(MapKey::String(s.clone())),
            v if v.kind().is_integer() => v.as_int().map(MapKey::Int),
            _ => None,
        }
    }

    pub fn to_value(&self, key_type: &Type) -> Value {
        match self {
            MapKey::Nil => Value::Nil,
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::String(s) => Value::String(s.clone()),
            MapKey::Int(n) => match key_type.kind {
                Kind::Byte => Value::Byte(*n as u8),
                Kind::Int32 => Value::Int32(*n as i32),
                Kind::Int64 => Value::Int64(*n),
                _ => Value::Int(*n),
            },
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Nil => f.write_str("<nil>"),
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::Int(n) => write!(f, "{}", n),
            MapKey::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapValue {
    pub key_type: Type,
    pub value_type: Type,
    pub entries: IndexMap<MapKey, Value>,
    pub readonly: bool,
}

impl MapValue {
    pub fn new(key_type: Type, value_type: Type) -> Self {
        Self {
            key_type,
            value_type,
            entries: IndexMap::new(),
            readonly: false,
        }
    }

    fn key(&self, key: &Value) -> Result<MapKey> {
        let key = coerce(key, &self.key_type)?;
        MapKey::from_value(&key).ok_or_else(|| Error::new(ErrorKind::InvalidType).context(key.type_name()))
    }

    /// Missing keys read as the zero value of the value type.
    pub fn get(&self, key: &Value) -> Result<Value> {
        let key = self.key(key)?;
        Ok(self
            .entries
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Value::zero(&self.value_type)))
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.key(key).is_ok_and(|k| self.entries.contains_key(&k))
    }

    pub fn set(&mut self, key: &Value, value: Value) -> Result<()> {
        if self.readonly {
            return Err(Error::new(ErrorKind::ReadOnly).context(key));
        }
        let key = self.key(key)?;
        let value = coerce(&value, &self.value_type)?;
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn delete(&mut self, key: &Value) -> Result<bool> {
        if self.readonly {
            return Err(Error::new(ErrorKind::ReadOnly).context(key));
        }
        let key = self.key(key)?;
        Ok(self.entries.shift_remove(&key).is_some())
    }

    /// Keys in sorted order, as values of the key type.
    pub fn keys(&self) -> Vec<Value> {
        let mut keys: Vec<&MapKey> = self.entries.keys().collect();
        keys.sort();
        keys.into_iter().map(|k| k.to_value(&self.key_type)).collect()
    }
}

impl fmt::Display for MapValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&MapKey> = self.entries.keys().collect();
        keys.sort();
        let parts: Vec<String> = keys
            .into_iter()
            .map(|k| {
                let value = self.entries.get(k).map(Value::format_nested).unwrap_or_default();
                format!("{}: {}", k, value)
            })
            .collect();
        write!(f, "map[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_int_map() -> MapValue {
        MapValue::new(Type::of(Kind::String), Type::of(Kind::Int))
    }

    #[test]
    fn test_missing_key_reads_zero() {
        let m = string_int_map();
        assert_eq!(m.get(&Value::string("nope")).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_values_are_coerced() {
        let mut m = string_int_map();
        m.set(&Value::string("a"), Value::string("12")).unwrap();
        assert_eq!(m.get(&Value::string("a")).unwrap(), Value::Int(12));
    }

    #[test]
    fn test_keys_sorted_and_display() {
        let mut m = string_int_map();
        m.set(&Value::string("b"), Value::Int(2)).unwrap();
        m.set(&Value::string("a"), Value::Int(1)).unwrap();
        assert_eq!(m.keys(), vec![Value::string("a"), Value::string("b")]);
        assert_eq!(m.to_string(), "map[a: 1, b: 2]");
    }

    #[test]
    fn test_delete() {
        let mut m = string_int_map();
        m.set(&Value::string("a"), Value::Int(1)).unwrap();
        assert!(m.delete(&Value::string("a")).unwrap());
        assert!(!m.contains(&Value::string("a")));
    }
}
