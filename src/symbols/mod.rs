//! Symbol tables: lexically nested name to value bindings.
//!
//! Tables form a chain through `parent` links up to a single root that every
//! table in a program shares. A table marked as a scope boundary hides the
//! tables between it and the root unless the lookup asks for full scope.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;
use uuid::Uuid;

use crate::error::{Error, ErrorKind, Result};
use crate::value::Value;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    readonly: bool,
    constant: bool,
    /// False between `create` and the first `set`.
    bound: bool,
}

impl Binding {
    fn new(value: Value) -> Self {
        Self {
            value,
            readonly: false,
            constant: false,
            bound: true,
        }
    }

    fn locked(&self) -> bool {
        self.bound && (self.readonly || self.constant)
    }
}

pub struct SymbolTable {
    pub name: String,
    pub id: Uuid,
    parent: Option<Arc<SymbolTable>>,
    root: Option<Arc<SymbolTable>>,
    boundary: bool,
    bindings: RwLock<HashMap<String, Binding>>,
}

impl SymbolTable {
    pub fn new_root(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            id: Uuid::new_v4(),
            parent: None,
            root: None,
            boundary: false,
            bindings: RwLock::new(HashMap::new()),
        })
    }

    pub fn new_child(parent: &Arc<SymbolTable>, name: &str) -> Arc<Self> {
        Self::child(parent, name, false)
    }

    /// A child whose lookups skip from itself straight to the root.
    pub fn new_boundary(parent: &Arc<SymbolTable>, name: &str) -> Arc<Self> {
        Self::child(parent, name, true)
    }

    fn child(parent: &Arc<SymbolTable>, name: &str, boundary: bool) -> Arc<Self> {
        let root = parent.root.clone().unwrap_or_else(|| Arc::clone(parent));
        Arc::new(Self {
            name: name.to_string(),
            id: Uuid::new_v4(),
            parent: Some(Arc::clone(parent)),
            root: Some(root),
            boundary,
            bindings: RwLock::new(HashMap::new()),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Binding>> {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Binding>> {
        self.bindings.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_root(&self) -> bool {
        self.root.is_none()
    }

    pub fn is_boundary(&self) -> bool {
        self.boundary
    }

    pub fn parent(&self) -> Option<&Arc<SymbolTable>> {
        self.parent.as_ref()
    }

    /// The shared root table; the root returns `None`.
    pub fn root(&self) -> Option<&Arc<SymbolTable>> {
        self.root.as_ref()
    }

    /// Next table to search after this one.
    fn next_scope(&self, full_scope: bool) -> Option<&SymbolTable> {
        if self.boundary && !full_scope {
            self.root.as_deref()
        } else {
            self.parent.as_deref()
        }
    }

    /// Find the table that binds `name`.
    fn find(&self, name: &str, full_scope: bool) -> Option<&SymbolTable> {
        let mut table = Some(self);
        while let Some(current) = table {
            if current.read().contains_key(name) {
                return Some(current);
            }
            table = current.next_scope(full_scope);
        }
        None
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.get_scoped(name, false)
    }

    pub fn get_scoped(&self, name: &str, full_scope: bool) -> Option<Value> {
        self.find(name, full_scope)
            .and_then(|table| table.get_local(name))
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.read().get(name).map(|b| b.value.clone())
    }

    /// Overwrite the nearest existing binding.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        let table = self
            .find(name, false)
            .ok_or_else(|| Error::new(ErrorKind::UnknownIdentifier).context(name))?;
        let mut bindings = table.write();
        let binding = bindings
            .get_mut(name)
            .ok_or_else(|| Error::new(ErrorKind::UnknownIdentifier).context(name))?;
        if binding.locked() {
            return Err(Error::new(ErrorKind::ReadOnly).context(name));
        }
        binding.value = if name.starts_with('_') {
            value.deep_copy()
        } else {
            value
        };
        binding.bound = true;
        Ok(())
    }

    /// Create or overwrite locally, ignoring attributes.
    pub fn set_always(&self, name: &str, value: Value) {
        let mut bindings = self.write();
        match bindings.get_mut(name) {
            Some(binding) => {
                binding.value = value;
                binding.bound = true;
            }
            None => {
                bindings.insert(name.to_string(), Binding::new(value));
            }
        }
    }

    /// Declare a new local name bound to nil. Names starting with `_` become
    /// constant once their first value is stored.
    pub fn create(&self, name: &str) -> Result<()> {
        let mut bindings = self.write();
        if bindings.contains_key(name) {
            return Err(Error::new(ErrorKind::SymbolExists).context(name));
        }
        trace!(target: "tern::symbols", table = %self.name, name, "create");
        bindings.insert(
            name.to_string(),
            Binding {
                value: Value::Nil,
                readonly: false,
                constant: name.starts_with('_'),
                bound: false,
            },
        );
        Ok(())
    }

    pub fn set_constant(&self, name: &str, value: Value) -> Result<()> {
        let mut bindings = self.write();
        if bindings.get(name).is_some_and(|b| b.bound) {
            return Err(Error::new(ErrorKind::SymbolExists).context(name));
        }
        trace!(target: "tern::symbols", table = %self.name, name, "constant");
        bindings.insert(
            name.to_string(),
            Binding {
                value,
                readonly: true,
                constant: true,
                bound: true,
            },
        );
        Ok(())
    }

    pub fn set_readonly(&self, name: &str, readonly: bool) -> Result<()> {
        let mut bindings = self.write();
        let binding = bindings
            .get_mut(name)
            .ok_or_else(|| Error::new(ErrorKind::UnknownIdentifier).context(name))?;
        binding.readonly = readonly;
        Ok(())
    }

    /// Remove a local binding. Constant or readonly bindings need `force`.
    pub fn delete(&self, name: &str, force: bool) -> Result<()> {
        let mut bindings = self.write();
        let binding = bindings
            .get(name)
            .ok_or_else(|| Error::new(ErrorKind::UnknownIdentifier).context(name))?;
        if binding.locked() && !force {
            return Err(Error::new(ErrorKind::ReadOnly).context(name));
        }
        trace!(target: "tern::symbols", table = %self.name, name, "delete");
        bindings.remove(name);
        Ok(())
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.find(name, false)
            .is_some_and(|t| t.read().get(name).is_some_and(|b| b.constant))
    }

    pub fn is_readonly(&self, name: &str) -> bool {
        self.find(name, false)
            .is_some_and(|t| t.read().get(name).is_some_and(|b| b.readonly))
    }

    /// Local names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Every name reachable from this table.
    pub fn visible_names(&self, full_scope: bool) -> Vec<String> {
        let mut names = Vec::new();
        let mut table = Some(self);
        while let Some(current) = table {
            for name in current.names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            table = current.next_scope(full_scope);
        }
        names.sort();
        names
    }

    /// Number of tables between this one and the root, inclusive.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut table = self.parent.as_deref();
        while let Some(current) = table {
            depth += 1;
            table = current.parent.as_deref();
        }
        depth
    }
}

impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTable")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("boundary", &self.boundary)
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nearest_binding_wins() {
        let root = SymbolTable::new_root("root");
        root.set_always("x", Value::Int(1));
        let child = SymbolTable::new_child(&root, "child");
        child.create("x").unwrap();
        child.set("x", Value::Int(2)).unwrap();
        assert_eq!(child.get("x"), Some(Value::Int(2)));
        assert_eq!(root.get("x"), Some(Value::Int(1)));
    }

    #[test]
    fn test_create_fails_when_local_exists() {
        let root = SymbolTable::new_root("root");
        root.create("x").unwrap();
        assert_eq!(root.create("x").unwrap_err().kind, ErrorKind::SymbolExists);
    }

    #[test]
    fn test_set_walks_upward_and_fails_when_missing() {
        let root = SymbolTable::new_root("root");
        root.set_always("x", Value::Int(1));
        let child = SymbolTable::new_child(&root, "child");
        child.set("x", Value::Int(5)).unwrap();
        assert_eq!(root.get("x"), Some(Value::Int(5)));
        assert_eq!(
            child.set("nope", Value::Nil).unwrap_err().kind,
            ErrorKind::UnknownIdentifier
        );
    }

    #[test]
    fn test_constants_are_protected() {
        let root = SymbolTable::new_root("root");
        root.set_constant("pi", Value::Float64(3.14)).unwrap();
        assert!(root.is_constant("pi"));
        assert_eq!(root.set("pi", Value::Int(3)).unwrap_err().kind, ErrorKind::ReadOnly);
        assert_eq!(root.delete("pi", false).unwrap_err().kind, ErrorKind::ReadOnly);
        root.delete("pi", true).unwrap();
        assert_eq!(root.get("pi"), None);
    }

    #[test]
    fn test_underscore_names_bind_once_and_copy() {
        let root = SymbolTable::new_root("root");
        root.create("_v").unwrap();
        let original = Value::array(vec![Value::Int(1)]);
        root.set("_v", original.clone()).unwrap();
        assert!(root.is_constant("_v"));
        assert_eq!(root.set("_v", Value::Int(2)).unwrap_err().kind, ErrorKind::ReadOnly);
        if let Some(Value::Array(a)) = root.get("_v") {
            crate::value::write(&a).items.push(Value::Int(2));
        }
        assert_eq!(original.len(), Some(1));
    }

    #[test]
    fn test_boundary_hides_intermediate_tables() {
        let root = SymbolTable::new_root("root");
        root.set_always("len", Value::Int(0));
        let caller = SymbolTable::new_child(&root, "caller");
        caller.set_always("secret", Value::Int(1));
        let callee = SymbolTable::new_boundary(&caller, "callee");
        assert_eq!(callee.get("secret"), None);
        assert_eq!(callee.get("len"), Some(Value::Int(0)));
        assert_eq!(callee.get_scoped("secret", true), Some(Value::Int(1)));
    }

    #[test]
    fn test_popped_scope_names_disappear() {
        let root = SymbolTable::new_root("root");
        {
            let inner = SymbolTable::new_child(&root, "block");
            inner.create("x").unwrap();
            assert!(inner.get("x").is_some());
        }
        assert_eq!(root.get("x"), None);
    }

    #[test]
    fn test_root_is_shared() {
        let root = SymbolTable::new_root("root");
        let a = SymbolTable::new_child(&root, "a");
        let b = SymbolTable::new_child(&a, "b");
        assert!(Arc::ptr_eq(b.root().unwrap(), &root));
        assert_eq!(b.depth(), 3);
    }
}
