//! Persisted configuration profiles.
//!
//! Stores named profiles in `~/.tern/tern.json`:
//!
//! ```json
//! { "default": { "description": "...", "id": "<uuid>", "items": { "key": "value" } } }
//! ```
//!
//! The file is rewritten by [`ProfileStore::save`] only when something changed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub description: String,
    pub id: Uuid,
    #[serde(default)]
    pub items: BTreeMap<String, String>,
}

impl Profile {
    fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            id: Uuid::new_v4(),
            items: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct ProfileStore {
    /// `None` keeps the store in memory only.
    path: Option<PathBuf>,
    profiles: BTreeMap<String, Profile>,
    active: String,
    dirty: bool,
}

/// Path of the store file for an application (`~/.<app>/<app>.json`).
pub fn store_path(app: &str) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!(".{}", app))
        .join(format!("{}.json", app))
}

impl ProfileStore {
    /// Load the store for `app` from the home directory.
    pub fn load(app: &str) -> Result<Self> {
        Self::with_path(store_path(app))
    }

    /// Load a store from an explicit file; a missing file is an empty store.
    pub fn with_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let profiles = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(target: "tern::config", path = %path.display(), "loaded profile store");
        let mut store = Self {
            path: Some(path),
            profiles,
            active: DEFAULT_PROFILE.to_string(),
            dirty: false,
        };
        store.ensure_active();
        Ok(store)
    }

    pub fn in_memory() -> Self {
        let mut store = Self {
            path: None,
            profiles: BTreeMap::new(),
            active: DEFAULT_PROFILE.to_string(),
            dirty: false,
        };
        store.ensure_active();
        store
    }

    fn ensure_active(&mut self) {
        if !self.profiles.contains_key(&self.active) {
            let description = format!("{} profile", self.active);
            self.profiles.insert(self.active.clone(), Profile::new(description));
            self.dirty = true;
        }
    }

    /// Name of the active profile.
    pub fn active(&self) -> &str {
        &self.active
    }

    /// Switch profiles, creating the named one when missing.
    pub fn use_profile(&mut self, name: &str) {
        self.active = name.to_string();
        self.ensure_active();
    }

    fn current(&self) -> Option<&Profile> {
        self.profiles.get(&self.active)
    }

    fn current_mut(&mut self) -> &mut Profile {
        self.ensure_active();
        self.profiles
            .entry(self.active.clone())
            .or_insert_with(|| Profile::new(""))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.current().and_then(|p| p.items.get(key).cloned())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.current_mut()
            .items
            .insert(key.to_string(), value.to_string());
        self.dirty = true;
    }

    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.current_mut().items.remove(key).is_some();
        self.dirty |= removed;
        removed
    }

    pub fn exists(&self, key: &str) -> bool {
        self.current().is_some_and(|p| p.items.contains_key(key))
    }

    /// Keys of the active profile in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.current()
            .map(|p| p.items.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the store when it changed since it was loaded or last saved.
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            self.dirty = false;
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.profiles)?)?;
        debug!(target: "tern::config", path = %path.display(), "saved profile store");
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_store_path_shape() {
        let path = store_path("tern");
        assert!(path.to_string_lossy().contains(".tern/tern.json"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tern.json");

        let mut store = ProfileStore::with_path(&path).unwrap();
        store.set("tern.compiler.types", "strict");
        store.save().unwrap();
        assert!(!store.is_dirty());

        let reloaded = ProfileStore::with_path(&path).unwrap();
        assert_eq!(reloaded.get("tern.compiler.types").as_deref(), Some("strict"));
        assert_eq!(reloaded.keys(), vec!["tern.compiler.types".to_string()]);

        let text = fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(json["default"]["id"].is_string());
        assert_eq!(json["default"]["items"]["tern.compiler.types"], "strict");
    }

    #[test]
    fn test_clean_store_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tern.json");
        let mut store = ProfileStore::with_path(&path).unwrap();
        store.save().unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let mut again = ProfileStore::with_path(&path).unwrap();
        assert!(!again.is_dirty());
        again.save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_profiles_are_separate() {
        let mut store = ProfileStore::in_memory();
        store.set("k", "1");
        store.use_profile("work");
        assert!(!store.exists("k"));
        store.set("k", "2");
        store.use_profile(DEFAULT_PROFILE);
        assert_eq!(store.get("k").as_deref(), Some("1"));
        assert!(store.delete("k"));
        assert!(!store.delete("k"));
        assert_eq!(store.profile_names(), vec!["default".to_string(), "work".to_string()]);
    }
}
