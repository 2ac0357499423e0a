//! Struct payloads.
//!
//! A struct keeps its user fields in an `IndexMap` and its metadata in
//! dedicated fields. The reserved keys `__type`, `__parent`, `__readonly`
//! and `__static` are synthesized from that metadata on read and mapped back
//! onto it on write, so programs see the classic key names.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result};
use crate::value::coerce::coerce;
use crate::value::{read, StructRef, Type, Value};

pub const TYPE_KEY: &str = "__type";
pub const PARENT_KEY: &str = "__parent";
pub const READONLY_KEY: &str = "__readonly";
pub const STATIC_KEY: &str = "__static";

#[derive(Debug, Clone, Default)]
pub struct StructValue {
    pub type_name: Option<String>,
    pub fields: IndexMap<String, Value>,
    /// Declared field types; a typed struct rejects unknown fields.
    pub field_types: Option<IndexMap<String, Type>>,
    pub parent: Option<StructRef>,
    pub readonly: bool,
    pub is_static: bool,
    /// Set for builtin and imported packages.
    pub package: Option<String>,
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero-valued instance of a struct type.
    pub fn from_type(t: &Type) -> Self {
        let mut s = Self::new();
        if let Some(fields) = &t.fields {
            let mut types = IndexMap::new();
            for (name, field_type) in fields {
                s.fields.insert(name.clone(), Value::zero(field_type));
                types.insert(name.clone(), field_type.clone());
            }
            s.field_types = Some(types);
        }
        s.type_name = t.name.clone();
        s
    }

    pub fn package(name: &str) -> Self {
        Self {
            package: Some(name.to_string()),
            readonly: true,
            ..Self::default()
        }
    }

    /// User-visible field count.
    pub fn len(&self) -> usize {
        self.fields.keys().filter(|k| !k.starts_with("__")).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field names in sorted order, reserved keys excluded.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .fields
            .keys()
            .filter(|k| !k.starts_with("__"))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn type_descriptor(&self) -> Type {
        let fields = self
            .field_types
            .as_ref()
            .map(|types| types.iter().map(|(k, t)| (k.clone(), t.clone())).collect())
            .unwrap_or_default();
        let t = Type::struct_of(fields);
        match &self.type_name {
            Some(name) => t.named(name.clone()),
            None => t,
        }
    }

    /// Read a field or a reserved key, without consulting the parent.
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            TYPE_KEY => Some(
                self.type_name
                    .clone()
                    .map(Value::String)
                    .unwrap_or_else(|| Value::string("struct")),
            ),
            PARENT_KEY => self.parent.clone().map(Value::Struct),
            READONLY_KEY => Some(Value::Bool(self.readonly)),
            STATIC_KEY => Some(Value::Bool(self.is_static)),
            _ => self.fields.get(name).cloned(),
        }
    }

    /// Read a field, falling through the `__parent` chain when missing.
    pub fn get_inherited(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.get(name) {
            return Some(value);
        }
        let mut next = self.parent.clone();
        while let Some(parent) = next {
            let guard = read(&parent);
            if let Some(value) = guard.fields.get(name) {
                return Some(value.clone());
            }
            next = guard.parent.clone();
        }
        None
    }

    /// Write a field. Reserved keys update metadata; typed structs coerce
    /// the value to the declared field type and reject unknown names.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        match name {
            READONLY_KEY => {
                self.readonly = value.is_truthy();
                return Ok(());
            }
            STATIC_KEY => {
                self.is_static = value.is_truthy();
                return Ok(());
            }
            _ => {}
        }

        if self.readonly {
            return Err(Error::new(ErrorKind::ReadOnly).context(name));
        }

        match name {
            TYPE_KEY => {
                self.type_name = Some(value.to_string());
                Ok(())
            }
            PARENT_KEY => match value {
                Value::Struct(parent) => {
                    self.parent = Some(parent);
                    Ok(())
                }
                Value::Nil => {
                    self.parent = None;
                    Ok(())
                }
                _ => Err(Error::new(ErrorKind::InvalidType).context(PARENT_KEY)),
            },
            _ => {
                let value = match self.field_types.as_ref() {
                    Some(types) => match types.get(name) {
                        Some(t) => coerce(&value, t)?,
                        None if self.is_static => value,
                        None => return Err(Error::new(ErrorKind::InvalidField).context(name)),
                    },
                    None => value,
                };
                self.fields.insert(name.to_string(), value);
                Ok(())
            }
        }
    }

    /// Copy with fields duplicated recursively. The parent link is shared.
    pub fn deep_copy(&self) -> Self {
        let mut copy = self.clone();
        for value in copy.fields.values_mut() {
            *value = value.deep_copy();
        }
        copy
    }

    /// Merge `other`'s fields over a copy of this struct.
    pub fn merge(&self, other: &StructValue) -> Self {
        let mut merged = self.clone();
        merged.readonly = false;
        for (k, v) in &other.fields {
            merged.fields.insert(k.clone(), v.clone());
        }
        merged
    }
}

impl fmt::Display for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(package) = &self.package {
            return write!(f, "package {}", package);
        }
        let parts: Vec<String> = self
            .keys()
            .into_iter()
            .map(|k| {
                let value = self.fields.get(&k).map(Value::format_nested).unwrap_or_default();
                format!("{}: {}", k, value)
            })
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
