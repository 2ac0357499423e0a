//! Built-in functions for tern.
//!
//! Every builtin is a [`NativeFunction`]: a plain function pointer plus its
//! arity bounds and calling flags. Names containing a dot are bound into a
//! readonly package struct in the root table (`strings.upper` lives in the
//! `strings` package); other names are bound directly at the root.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;

use crate::bytecode::Declaration;
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::Runtime;
use crate::symbols::SymbolTable;
use crate::value::{write, Kind, StructValue, Value};

pub mod globals;
pub mod errors;
pub mod json;
pub mod math;
pub mod os;
pub mod profile;
pub mod strconv;
pub mod strings;
pub mod sync;
pub mod time;
pub mod util;

/// Package names a program may import without a source file.
pub const PACKAGES: &[&str] = &[
    "errors", "json", "math", "os", "profile", "strconv", "strings", "sync", "time", "util",
];

pub fn is_package(name: &str) -> bool {
    PACKAGES.contains(&name)
}

pub type NativeFn = fn(&mut NativeContext<'_>, &[Value]) -> Result<Value>;

/// What a native sees of the calling context.
pub struct NativeContext<'a> {
    pub runtime: &'a Arc<Runtime>,
    /// The caller's table for full-scope natives, otherwise a boundary
    /// table that only sees the root.
    pub symbols: Arc<SymbolTable>,
    /// Receiver for method calls.
    pub this: Option<Value>,
    /// True when the caller assigns more than one result.
    pub multiple: bool,
}

impl NativeContext<'_> {
    pub fn this(&self) -> Result<&Value> {
        self.this
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::InvalidFunctionCall).context("missing receiver"))
    }

    /// Return several results for a comma-ok style native; in a
    /// single-value context only the first one reaches the caller.
    pub fn results(&self, values: Vec<Value>) -> Value {
        if self.multiple {
            Value::Tuple(values)
        } else {
            values.into_iter().next().unwrap_or(Value::Nil)
        }
    }
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub min: usize,
    /// `None` for variadic functions.
    pub max: Option<usize>,
    /// Failures become a second `error` result instead of a runtime error.
    pub error_return: bool,
    /// Sees the caller's locals instead of a boundary table.
    pub full_scope: bool,
    pub func: NativeFn,
    pub declaration: Option<Declaration>,
}

impl NativeFunction {
    pub fn new(name: &str, min: usize, max: Option<usize>, func: NativeFn) -> Self {
        Self {
            name: name.to_string(),
            min,
            max,
            error_return: false,
            full_scope: false,
            func,
            declaration: None,
        }
    }

    pub fn error_return(mut self) -> Self {
        self.error_return = true;
        self
    }

    pub fn full_scope(mut self) -> Self {
        self.full_scope = true;
        self
    }

    pub fn declare(mut self, declaration: Declaration) -> Self {
        self.declaration = Some(declaration);
        self
    }

    pub fn check_arity(&self, argc: usize) -> Result<()> {
        let too_many = self.max.is_some_and(|max| argc > max);
        if argc < self.min || too_many {
            return Err(Error::new(ErrorKind::ArgumentCount).context(&self.name));
        }
        Ok(())
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("error_return", &self.error_return)
            .finish()
    }
}

/// Bind a native under its (possibly dotted) name.
pub fn define(root: &Arc<SymbolTable>, native: NativeFunction) {
    let name = native.name.clone();
    define_value(root, &name, Value::Native(Arc::new(native)));
}

/// Bind any value under a (possibly dotted) name.
pub fn define_value(root: &Arc<SymbolTable>, name: &str, value: Value) {
    match name.split_once('.') {
        Some((package, member)) => {
            let package_value = match root.get_local(package) {
                Some(v @ Value::Struct(_)) => v,
                _ => {
                    let v = Value::from_struct(StructValue::package(package));
                    root.set_always(package, v.clone());
                    // the name was just bound locally
                    let _ = root.set_readonly(package, true);
                    v
                }
            };
            if let Value::Struct(s) = package_value {
                write(&s).fields.insert(member.to_string(), value);
            }
        }
        None => {
            root.set_always(name, value);
            let _ = root.set_readonly(name, true);
        }
    }
}

/// Register all built-in functions and type names in the root table.
pub fn register_builtins(root: &Arc<SymbolTable>) {
    for (name, t) in globals::type_names() {
        define_value(root, name, Value::Type(t));
    }
    globals::register_global_builtins(root);
    strings::register_string_builtins(root);
    math::register_math_builtins(root);
    sync::register_sync_builtins(root);
    time::register_time_builtins(root);
    profile::register_profile_builtins(root);
    json::register_json_builtins(root);
    errors::register_error_builtins(root);
    strconv::register_strconv_builtins(root);
    os::register_os_builtins(root);
    util::register_util_builtins(root);
}

lazy_static! {
    /// Methods of builtin value kinds, keyed by kind and method name.
    static ref METHODS: HashMap<Kind, HashMap<&'static str, Arc<NativeFunction>>> = {
        let mut methods: HashMap<Kind, HashMap<&'static str, Arc<NativeFunction>>> = HashMap::new();
        for (kind, name, native) in sync::methods().into_iter().chain(errors::methods()) {
            methods.entry(kind).or_default().insert(name, Arc::new(native));
        }
        methods
    };
}

/// Look up a method of a builtin value kind (`wg.Add`, `ch.send`).
pub fn method(value: &Value, name: &str) -> Option<Value> {
    METHODS
        .get(&value.kind())
        .and_then(|methods| methods.get(name))
        .map(|native| Value::Native(Arc::clone(native)))
}

/// Fetch argument `index` as an integer.
pub fn int_arg(name: &str, args: &[Value], index: usize) -> Result<i64> {
    args.get(index)
        .filter(|v| v.kind().is_numeric() || matches!(v, Value::Bool(_)))
        .and_then(Value::as_int)
        .ok_or_else(|| Error::new(ErrorKind::ArgumentType).context(name))
}

pub fn float_arg(name: &str, args: &[Value], index: usize) -> Result<f64> {
    args.get(index)
        .filter(|v| v.kind().is_numeric())
        .and_then(Value::as_float)
        .ok_or_else(|| Error::new(ErrorKind::ArgumentType).context(name))
}

/// Fetch argument `index` as a string; non-strings use their display form.
pub fn string_arg(args: &[Value], index: usize) -> String {
    match args.get(index) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dotted_names_bind_into_packages() {
        let root = SymbolTable::new_root("root");
        define(
            &root,
            NativeFunction::new("demo.answer", 0, Some(0), |_, _| Ok(Value::Int(42))),
        );
        let Some(Value::Struct(package)) = root.get("demo") else {
            panic!("package not bound");
        };
        let package = crate::value::read(&package);
        assert_eq!(package.package.as_deref(), Some("demo"));
        assert!(package.fields.contains_key("answer"));
        assert!(root.is_readonly("demo"));
    }

    #[test]
    fn test_arity_check() {
        let native = NativeFunction::new("f", 1, Some(2), |_, _| Ok(Value::Nil));
        assert!(native.check_arity(0).is_err());
        assert!(native.check_arity(2).is_ok());
        assert!(native.check_arity(3).is_err());
        let variadic = NativeFunction::new("g", 0, None, |_, _| Ok(Value::Nil));
        assert!(variadic.check_arity(100).is_ok());
    }

    #[test]
    fn test_registry_has_every_package() {
        let root = SymbolTable::new_root("root");
        register_builtins(&root);
        for package in PACKAGES {
            assert!(root.get(package).is_some(), "missing package {}", package);
        }
        assert!(matches!(root.get("int"), Some(Value::Type(_))));
        assert!(matches!(root.get("len"), Some(Value::Native(_))));
    }
}
