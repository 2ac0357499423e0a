//! Type descriptors.

use std::fmt;

/// The kind of a value or type. Scalar kinds are ordered by width so that
/// normalization can promote to the larger of two kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Nil,
    Bool,
    Byte,
    Int32,
    Int,
    Int64,
    Float32,
    Float64,
    String,
    Array,
    Struct,
    Map,
    Pointer,
    Channel,
    Error,
    Function,
    Type,
    Interface,
    WaitGroup,
    Mutex,
    Template,
    Marker,
}

impl Kind {
    pub fn is_scalar(self) -> bool {
        self >= Kind::Bool && self <= Kind::String
    }

    pub fn is_numeric(self) -> bool {
        self >= Kind::Byte && self <= Kind::Float64
    }

    pub fn is_integer(self) -> bool {
        self >= Kind::Byte && self <= Kind::Int64
    }

    pub fn is_float(self) -> bool {
        matches!(self, Kind::Float32 | Kind::Float64)
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Nil => "nil",
            Kind::Bool => "bool",
            Kind::Byte => "byte",
            Kind::Int32 => "int32",
            Kind::Int => "int",
            Kind::Int64 => "int64",
            Kind::Float32 => "float32",
            Kind::Float64 => "float64",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Struct => "struct",
            Kind::Map => "map",
            Kind::Pointer => "pointer",
            Kind::Channel => "chan",
            Kind::Error => "error",
            Kind::Function => "func",
            Kind::Type => "type",
            Kind::Interface => "interface{}",
            Kind::WaitGroup => "sync.WaitGroup",
            Kind::Mutex => "sync.Mutex",
            Kind::Template => "template",
            Kind::Marker => "marker",
        }
    }
}

/// A type descriptor. Two descriptors are equal when kind, name and
/// structural parts match.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub kind: Kind,
    pub name: Option<String>,
    /// Element type of arrays, pointers and channels; value type of maps.
    pub element: Option<Box<Type>>,
    /// Key type of maps.
    pub key: Option<Box<Type>>,
    /// Declared fields of struct types, in declaration order.
    pub fields: Option<Vec<(String, Type)>>,
}

impl Type {
    pub const fn of(kind: Kind) -> Self {
        Self {
            kind,
            name: None,
            element: None,
            key: None,
            fields: None,
        }
    }

    pub fn interface() -> Self {
        Self::of(Kind::Interface)
    }

    pub fn array_of(element: Type) -> Self {
        Self {
            element: Some(Box::new(element)),
            ..Self::of(Kind::Array)
        }
    }

    pub fn map_of(key: Type, value: Type) -> Self {
        Self {
            key: Some(Box::new(key)),
            element: Some(Box::new(value)),
            ..Self::of(Kind::Map)
        }
    }

    pub fn pointer_to(target: Type) -> Self {
        Self {
            element: Some(Box::new(target)),
            ..Self::of(Kind::Pointer)
        }
    }

    pub fn channel_of(element: Type) -> Self {
        Self {
            element: Some(Box::new(element)),
            ..Self::of(Kind::Channel)
        }
    }

    pub fn struct_of(fields: Vec<(String, Type)>) -> Self {
        Self {
            fields: Some(fields),
            ..Self::of(Kind::Struct)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Look up a builtin scalar or wildcard type by its source name.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "bool" => Kind::Bool,
            "byte" => Kind::Byte,
            "int32" => Kind::Int32,
            "int" => Kind::Int,
            "int64" => Kind::Int64,
            "float32" => Kind::Float32,
            "float64" => Kind::Float64,
            "string" => Kind::String,
            "error" => Kind::Error,
            "interface{}" | "any" => Kind::Interface,
            _ => return None,
        };
        Some(Self::of(kind))
    }

    pub fn element_type(&self) -> Type {
        self.element
            .as_deref()
            .cloned()
            .unwrap_or_else(Type::interface)
    }

    pub fn key_type(&self) -> Type {
        self.key.as_deref().cloned().unwrap_or_else(Type::interface)
    }

    pub fn is_interface(&self) -> bool {
        self.kind == Kind::Interface
    }

    /// Wildcard-aware compatibility: `interface` matches anything.
    pub fn matches(&self, other: &Type) -> bool {
        if self.is_interface() || other.is_interface() {
            return true;
        }
        if self.kind != other.kind {
            return false;
        }
        match self.kind {
            Kind::Array | Kind::Pointer | Kind::Channel => {
                self.element_type().matches(&other.element_type())
            }
            Kind::Map => {
                self.key_type().matches(&other.key_type())
                    && self.element_type().matches(&other.element_type())
            }
            Kind::Struct => match (&self.name, &other.name) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            },
            _ => true,
        }
    }

    /// The declared type of a struct field, if this is a struct type.
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields
            .as_ref()?
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, t)| t)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            return f.write_str(name);
        }
        match self.kind {
            Kind::Array => write!(f, "[]{}", self.element_type()),
            Kind::Pointer => write!(f, "*{}", self.element_type()),
            Kind::Channel => write!(f, "chan {}", self.element_type()),
            Kind::Map => write!(f, "map[{}]{}", self.key_type(), self.element_type()),
            Kind::Struct => {
                f.write_str("struct{")?;
                if let Some(fields) = &self.fields {
                    for (i, (name, t)) in fields.iter().enumerate() {
                        if i > 0 {
                            f.write_str("; ")?;
                        }
                        write!(f, "{} {}", name, t)?;
                    }
                }
                f.write_str("}")
            }
            kind => f.write_str(kind.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Type::array_of(Type::of(Kind::Int)).to_string(), "[]int");
        assert_eq!(
            Type::map_of(Type::of(Kind::String), Type::interface()).to_string(),
            "map[string]interface{}"
        );
        let point = Type::struct_of(vec![
            ("x".into(), Type::of(Kind::Int)),
            ("y".into(), Type::of(Kind::Int)),
        ]);
        assert_eq!(point.to_string(), "struct{x int; y int}");
        assert_eq!(point.named("Point").to_string(), "Point");
    }

    #[test]
    fn test_interface_is_wildcard() {
        let ints = Type::array_of(Type::of(Kind::Int));
        assert!(Type::interface().matches(&ints));
        assert!(ints.matches(&Type::array_of(Type::interface())));
        assert!(!ints.matches(&Type::array_of(Type::of(Kind::String))));
    }

    #[test]
    fn test_equality_is_structural() {
        assert_eq!(Type::array_of(Type::of(Kind::Int)), Type::array_of(Type::of(Kind::Int)));
        assert_ne!(Type::of(Kind::Int), Type::of(Kind::Int64));
    }

    #[test]
    fn test_scalar_ordering() {
        assert!(Kind::Bool < Kind::Int && Kind::Int < Kind::Float64);
        assert!(Kind::String.is_scalar());
        assert!(!Kind::Array.is_scalar());
    }
}
