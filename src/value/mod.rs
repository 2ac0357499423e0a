//! Runtime values.
//!
//! Scalars are held inline. Aggregates (arrays, structs, maps) live behind
//! `Arc<RwLock<..>>`, so copying a `Value` shares the payload; `deep_copy`
//! is the operation that duplicates it.

pub mod channel;
pub mod coerce;
pub mod maps;
pub mod structs;
pub mod sync;
pub mod types;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::builtins::NativeFunction;
use crate::bytecode::ByteCode;
use crate::error::Error;
use crate::symbols::SymbolTable;
use crate::template::Template;
use crate::vm::frame::CallFrame;

pub use channel::Channel;
pub use maps::{MapKey, MapValue};
pub use structs::StructValue;
pub use sync::{MutexValue, WaitGroup};
pub use types::{Kind, Type};

pub type ArrayRef = Arc<RwLock<ArrayValue>>;
pub type StructRef = Arc<RwLock<StructValue>>;
pub type MapRef = Arc<RwLock<MapValue>>;

/// Read-lock an aggregate, ignoring poisoning from a panicked thread.
pub fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// An ordered sequence with an element type (`interface{}` when untyped).
#[derive(Debug, Clone)]
pub struct ArrayValue {
    pub element: Type,
    pub items: Vec<Value>,
    pub readonly: bool,
}

impl ArrayValue {
    pub fn new(element: Type, items: Vec<Value>) -> Self {
        Self {
            element,
            items,
            readonly: false,
        }
    }
}

/// A compiled function plus the scope it closes over, if any.
#[derive(Clone)]
pub struct FunctionValue {
    pub code: Arc<ByteCode>,
    pub scope: Option<Arc<SymbolTable>>,
}

impl FunctionValue {
    pub fn new(code: Arc<ByteCode>) -> Self {
        Self { code, scope: None }
    }

    pub fn name(&self) -> &str {
        &self.code.name
    }
}

/// Stack sentinel bounding a group of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMarker {
    pub label: String,
    pub count: usize,
}

impl StackMarker {
    pub const VOID: &'static str = "void";
    pub const RESULTS: &'static str = "results";
    pub const CALL: &'static str = "call";
    pub const LET: &'static str = "let";

    pub fn new(label: impl Into<String>, count: usize) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Byte(u8),
    Int32(i32),
    Int(i64),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Native(Arc<NativeFunction>),
    Function(FunctionValue),
    Array(ArrayRef),
    Struct(StructRef),
    Map(MapRef),
    Channel(Arc<Channel>),
    Error(Arc<Error>),
    Type(Type),
    Marker(StackMarker),
    /// Multiple results from a native call; unpacked by `Call`, never stored.
    Tuple(Vec<Value>),
    Template(Arc<Template>),
    WaitGroup(Arc<WaitGroup>),
    Mutex(Arc<MutexValue>),
    /// A call frame record, only ever found on a context's stack.
    Frame(Box<CallFrame>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(ArrayValue::new(Type::interface(), items))))
    }

    pub fn typed_array(element: Type, items: Vec<Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(ArrayValue::new(element, items))))
    }

    pub fn from_struct(s: StructValue) -> Self {
        Value::Struct(Arc::new(RwLock::new(s)))
    }

    pub fn from_map(m: MapValue) -> Self {
        Value::Map(Arc::new(RwLock::new(m)))
    }

    pub fn error(err: Error) -> Self {
        Value::Error(Arc::new(err))
    }

    pub fn marker(label: &str) -> Self {
        Value::Marker(StackMarker::new(label, 0))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Nil,
            Value::Bool(_) => Kind::Bool,
            Value::Byte(_) => Kind::Byte,
            Value::Int32(_) => Kind::Int32,
            Value::Int(_) => Kind::Int,
            Value::Int64(_) => Kind::Int64,
            Value::Float32(_) => Kind::Float32,
            Value::Float64(_) => Kind::Float64,
            Value::String(_) => Kind::String,
            Value::Native(_) | Value::Function(_) => Kind::Function,
            Value::Array(_) => Kind::Array,
            Value::Struct(_) => Kind::Struct,
            Value::Map(_) => Kind::Map,
            Value::Channel(_) => Kind::Channel,
            Value::Error(_) => Kind::Error,
            Value::Type(_) => Kind::Type,
            Value::Marker(_) | Value::Tuple(_) | Value::Frame(_) => Kind::Marker,
            Value::Template(_) => Kind::Template,
            Value::WaitGroup(_) => Kind::WaitGroup,
            Value::Mutex(_) => Kind::Mutex,
        }
    }

    /// The full type descriptor of this value.
    pub fn type_of(&self) -> Type {
        match self {
            Value::Array(a) => Type::array_of(read(a).element.clone()),
            Value::Map(m) => {
                let m = read(m);
                Type::map_of(m.key_type.clone(), m.value_type.clone())
            }
            Value::Struct(s) => read(s).type_descriptor(),
            Value::Channel(c) => Type::channel_of(c.element.clone()),
            other => Type::of(other.kind()),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Function(f) => f
                .code
                .declaration
                .as_ref()
                .map(|d| d.signature())
                .unwrap_or_else(|| "func".to_string()),
            Value::Native(_) => "func".to_string(),
            other => other.type_of().to_string(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, Value::Marker(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Native(_) | Value::Function(_) | Value::Type(_))
    }

    /// Truthiness used by conditional branches.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Byte(n) => *n != 0,
            Value::Int32(n) => *n != 0,
            Value::Int(n) | Value::Int64(n) => *n != 0,
            Value::Float32(n) => *n != 0.0,
            Value::Float64(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Marker(_) | Value::Tuple(_) | Value::Frame(_) => false,
            _ => true,
        }
    }

    /// Integer view of a numeric or boolean value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Byte(n) => Some(*n as i64),
            Value::Int32(n) => Some(*n as i64),
            Value::Int(n) | Value::Int64(n) => Some(*n),
            Value::Float32(n) => Some(*n as i64),
            Value::Float64(n) => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float32(n) => Some(*n as f64),
            Value::Float64(n) => Some(*n),
            other => other.as_int().map(|n| n as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Number of elements: array items, string characters, struct fields
    /// (excluding `__` keys), map entries, or buffered channel messages.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(a) => Some(read(a).items.len()),
            Value::Struct(s) => Some(read(s).len()),
            Value::Map(m) => Some(read(m).entries.len()),
            Value::Channel(c) => Some(c.len()),
            Value::Nil => Some(0),
            _ => None,
        }
    }

    /// Structural equality. Numbers of different kinds compare by value.
    pub fn deep_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (a, b) if a.kind().is_numeric() && b.kind().is_numeric() => {
                if a.kind().is_integer() && b.kind().is_integer() {
                    a.as_int() == b.as_int()
                } else {
                    a.as_float() == b.as_float()
                }
            }
            (Value::Array(a), Value::Array(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (read(a), read(b));
                a.items.len() == b.items.len()
                    && a.items.iter().zip(&b.items).all(|(x, y)| x.deep_equal(y))
            }
            (Value::Struct(a), Value::Struct(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (read(a), read(b));
                a.fields.len() == b.fields.len()
                    && a.fields
                        .iter()
                        .all(|(k, v)| b.fields.get(k).is_some_and(|w| v.deep_equal(w)))
            }
            (Value::Map(a), Value::Map(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (read(a), read(b));
                a.entries.len() == b.entries.len()
                    && a.entries
                        .iter()
                        .all(|(k, v)| b.entries.get(k).is_some_and(|w| v.deep_equal(w)))
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(&a.code, &b.code),
            (Value::Native(a), Value::Native(b)) => a.name == b.name,
            (Value::Channel(a), Value::Channel(b)) => Arc::ptr_eq(a, b),
            (Value::WaitGroup(a), Value::WaitGroup(b)) => Arc::ptr_eq(a, b),
            (Value::Mutex(a), Value::Mutex(b)) => Arc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => a.message() == b.message(),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Marker(a), Value::Marker(b)) => a == b,
            _ => false,
        }
    }

    /// Duplicate aggregate payloads recursively. Channels and sync
    /// primitives are shared handles and stay shared.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Array(a) => {
                let a = read(a);
                let items = a.items.iter().map(Value::deep_copy).collect();
                Value::Array(Arc::new(RwLock::new(ArrayValue {
                    element: a.element.clone(),
                    items,
                    readonly: false,
                })))
            }
            Value::Struct(s) => Value::from_struct(read(s).deep_copy()),
            Value::Map(m) => {
                let m = read(m);
                let mut copy = MapValue::new(m.key_type.clone(), m.value_type.clone());
                for (k, v) in &m.entries {
                    copy.entries.insert(k.clone(), v.deep_copy());
                }
                Value::from_map(copy)
            }
            other => other.clone(),
        }
    }

    /// The zero value for a type.
    pub fn zero(t: &Type) -> Value {
        match t.kind {
            Kind::Bool => Value::Bool(false),
            Kind::Byte => Value::Byte(0),
            Kind::Int32 => Value::Int32(0),
            Kind::Int => Value::Int(0),
            Kind::Int64 => Value::Int64(0),
            Kind::Float32 => Value::Float32(0.0),
            Kind::Float64 => Value::Float64(0.0),
            Kind::String => Value::String(String::new()),
            Kind::Array => Value::typed_array(t.element_type(), Vec::new()),
            Kind::Map => Value::from_map(MapValue::new(t.key_type(), t.element_type())),
            Kind::Struct => Value::from_struct(StructValue::from_type(t)),
            Kind::WaitGroup => Value::WaitGroup(Arc::new(WaitGroup::new())),
            Kind::Mutex => Value::Mutex(Arc::new(MutexValue::new())),
            _ => Value::Nil,
        }
    }

    /// Format for display inside an aggregate, where strings are quoted.
    pub fn format_nested(&self) -> String {
        match self {
            Value::String(s) => format!("{:?}", s),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Byte(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int(n) | Value::Int64(n) => write!(f, "{}", n),
            Value::Float32(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Native(n) => write!(f, "builtin {}", n.name),
            Value::Function(func) => match &func.code.declaration {
                Some(decl) => write!(f, "{}", decl),
                None => write!(f, "func {}", func.name()),
            },
            Value::Array(a) => {
                let a = read(a);
                let parts: Vec<String> = a.items.iter().map(Value::format_nested).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Struct(s) => write!(f, "{}", read(s)),
            Value::Map(m) => write!(f, "{}", read(m)),
            Value::Channel(c) => write!(f, "{}", c),
            Value::Error(e) => f.write_str(&e.message()),
            Value::Type(t) => write!(f, "{}", t),
            Value::Marker(m) => write!(f, "<marker {}>", m.label),
            Value::Tuple(values) => {
                let parts: Vec<String> = values.iter().map(Value::format_nested).collect();
                write!(f, "({})", parts.join(", "))
            }
            Value::Template(t) => write!(f, "template {}", t.name),
            Value::WaitGroup(_) => f.write_str("sync.WaitGroup"),
            Value::Mutex(_) => f.write_str("sync.Mutex"),
            Value::Frame(frame) => write!(f, "<frame {}>", frame.bytecode.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind().name(), self.format_nested())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_equal(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float64(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Float64(2.5).to_string(), "2.5");
        assert_eq!(Value::Nil.to_string(), "<nil>");
        let arr = Value::array(vec![Value::Int(1), Value::string("a")]);
        assert_eq!(arr.to_string(), "[1, \"a\"]");
    }

    #[test]
    fn test_aggregates_share_storage() {
        let a = Value::array(vec![Value::Int(1)]);
        let b = a.clone();
        if let Value::Array(inner) = &b {
            write(inner).items.push(Value::Int(2));
        }
        assert_eq!(a.len(), Some(2));
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let inner = Value::array(vec![Value::Int(1)]);
        let mut s = StructValue::new();
        s.fields.insert("list".into(), inner);
        s.fields.insert("name".into(), Value::string("x"));
        let original = Value::from_struct(s);
        let copy = original.deep_copy();
        assert!(copy.deep_equal(&original));

        if let Value::Struct(c) = &copy {
            if let Some(Value::Array(list)) = read(c).fields.get("list") {
                write(list).items.push(Value::Int(9));
            }
        }
        assert!(!copy.deep_equal(&original));
        if let Value::Struct(o) = &original {
            assert_eq!(read(o).fields.get("list").and_then(Value::len), Some(1));
        }
    }

    #[test]
    fn test_numeric_equality_across_kinds() {
        assert!(Value::Int(3).deep_equal(&Value::Float64(3.0)));
        assert!(Value::Byte(3).deep_equal(&Value::Int64(3)));
        assert!(!Value::Int(3).deep_equal(&Value::string("3")));
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(Value::zero(&Type::of(Kind::Int)), Value::Int(0));
        assert_eq!(Value::zero(&Type::of(Kind::String)), Value::string(""));
        assert!(Value::zero(&Type::interface()).is_nil());
        assert_eq!(Value::zero(&Type::array_of(Type::of(Kind::Int))).len(), Some(0));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::marker(StackMarker::VOID).is_truthy());
    }
}
