use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::StoreError;

pub const USER_PREFERENCES: &str = "user_preferences";
pub const AUTH_TOKEN: &str = "auth_token";
const DRAFT_PREFIX: &str = "draft_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub theme: Theme,
    pub default_view: ViewMode,
    pub auto_save: bool,
    pub email_notifications: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            default_view: ViewMode::Grid,
            auto_save: true,
            email_notifications: true,
        }
    }
}

impl Preferences {
    /// Sets one preference from its CLI spelling, e.g. `("theme", "dark")`.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), String> {
        let parse_bool = |v: &str| match v {
            "true" | "on" | "yes" => Ok(true),
            "false" | "off" | "no" => Ok(false),
            _ => Err(format!("Expected true or false for '{}', got '{}'", key, v)),
        };
        match key {
            "theme" => {
                self.theme = serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
                    .map_err(|_| format!("Unknown theme '{}'. Expected light, dark or system", value))?;
            }
            "defaultView" | "default_view" | "view" => {
                self.default_view =
                    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
                        .map_err(|_| format!("Unknown view '{}'. Expected grid or list", value))?;
            }
            "autoSave" | "auto_save" => self.auto_save = parse_bool(value)?,
            "emailNotifications" | "email_notifications" => {
                self.email_notifications = parse_bool(value)?
            }
            _ => {
                return Err(format!(
                    "Unknown preference '{}'. Expected theme, defaultView, autoSave or emailNotifications",
                    key
                ));
            }
        }
        Ok(())
    }
}

/// Local key-value store persisted as one JSON object. Every write goes to disk.
pub struct PrefsStore {
    path: Option<PathBuf>,
    values: BTreeMap<String, serde_json::Value>,
}

impl PrefsStore {
    pub fn load(path: &Path) -> Self {
        let values = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring unreadable preferences file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path: Some(path.to_path_buf()),
            values,
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: BTreeMap::new(),
        }
    }

    /// Stored value for `key`, or `None` when absent or not the expected shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "error reading stored value");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), serde_json::to_value(value)?);
        self.persist()
    }

    pub fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|v| !v.is_null())
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else { return Ok(()) };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.values)?)?;
        Ok(())
    }

    // --- Typed helpers ---

    pub fn preferences(&self) -> Preferences {
        self.get(USER_PREFERENCES).unwrap_or_default()
    }

    pub fn set_preferences(&mut self, prefs: &Preferences) -> Result<(), StoreError> {
        self.set(USER_PREFERENCES, prefs)
    }

    pub fn save_draft<T: Serialize>(&mut self, key: &str, draft: &T) -> Result<(), StoreError> {
        self.set(&format!("{DRAFT_PREFIX}{key}"), draft)
    }

    pub fn load_draft<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(&format!("{DRAFT_PREFIX}{key}"))
    }

    pub fn has_draft(&self, key: &str) -> bool {
        self.contains(&format!("{DRAFT_PREFIX}{key}"))
    }

    pub fn clear_draft(&mut self, key: &str) -> Result<(), StoreError> {
        self.remove(&format!("{DRAFT_PREFIX}{key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplicationDraft;
    use crate::testutil::date;

    #[test]
    fn defaults_when_nothing_stored() {
        let store = PrefsStore::in_memory();
        assert_eq!(store.preferences(), Preferences::default());
        assert!(store.preferences().auto_save);
    }

    #[test]
    fn preferences_persist_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut store = PrefsStore::load(&path);
        let mut prefs = store.preferences();
        prefs.set_field("theme", "dark").unwrap();
        prefs.set_field("defaultView", "list").unwrap();
        store.set_preferences(&prefs).unwrap();

        let reloaded = PrefsStore::load(&path);
        assert_eq!(reloaded.preferences().theme, Theme::Dark);
        assert_eq!(reloaded.preferences().default_view, ViewMode::List);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{not json").unwrap();
        let store = PrefsStore::load(&path);
        assert_eq!(store.preferences(), Preferences::default());
    }

    #[test]
    fn mistyped_value_reads_as_absent() {
        let mut store = PrefsStore::in_memory();
        store.set(USER_PREFERENCES, &"oops").unwrap();
        assert_eq!(store.preferences(), Preferences::default());
    }

    #[test]
    fn drafts_round_trip_and_clear() {
        let mut store = PrefsStore::in_memory();
        assert!(!store.has_draft("application"));
        let draft = ApplicationDraft::new("Engineer", "Acme", date("2024-04-01"));
        store.save_draft("application", &draft).unwrap();
        assert!(store.has_draft("application"));
        assert_eq!(store.load_draft::<ApplicationDraft>("application"), Some(draft));
        store.clear_draft("application").unwrap();
        assert!(!store.has_draft("application"));
    }

    #[test]
    fn unknown_preference_is_rejected() {
        let mut prefs = Preferences::default();
        assert!(prefs.set_field("fontSize", "12").is_err());
        assert!(prefs.set_field("theme", "neon").is_err());
        assert!(prefs.set_field("autoSave", "maybe").is_err());
        prefs.set_field("autoSave", "off").unwrap();
        assert!(!prefs.auto_save);
    }
}
