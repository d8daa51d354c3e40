//! # Settings Store
//!
//! Typed user preferences for the keyboard widget.
//!
//! ## Philosophy
//!
//! - **Typed settings**: All settings have explicit types, not stringly-typed
//! - **Layered**: Read-only defaults + stored overrides
//! - **Deterministic**: Settings are serializable and reproducible
//! - **Collaborator, not core**: The widget only sees the [`SettingsStore`] trait
//!
//! ## Example
//!
//! ```
//! use services_settings::{create_default_registry, keys, SettingKey, SettingValue, SettingsStore};
//!
//! let mut registry = create_default_registry();
//! registry
//!     .set(vec![(SettingKey::new(keys::LAYOUT), SettingValue::String("fr".into()))])
//!     .unwrap();
//!
//! let values = registry.get(&[SettingKey::new(keys::LAYOUT)]);
//! assert_eq!(values[0].1.as_string(), Some("fr"));
//! ```

pub mod config;
pub mod persistence;

pub use config::KeyboardConfig;
pub use persistence::{PersistenceError, PersistenceResult};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Setting key (path-like identifier)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SettingKey(String);

impl SettingKey {
    /// Creates a new setting key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks if this key starts with the given prefix
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SettingKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Setting value (strongly typed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
}

impl SettingValue {
    /// Returns the name of this value's type
    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Boolean(_) => "boolean",
            SettingValue::Integer(_) => "integer",
            SettingValue::Float(_) => "float",
            SettingValue::String(_) => "string",
            SettingValue::StringList(_) => "string list",
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Floats, accepting integers too (stored zoom levels are often whole)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingValue::Float(v) => Some(*v),
            SettingValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            SettingValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            SettingValue::StringList(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Boolean(v) => write!(f, "{}", v),
            SettingValue::Integer(v) => write!(f, "{}", v),
            SettingValue::Float(v) => write!(f, "{}", v),
            SettingValue::String(v) => write!(f, "{}", v),
            SettingValue::StringList(v) => write!(f, "{:?}", v),
        }
    }
}

/// Settings store error types
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("Unknown setting: {0}")]
    UnknownKey(SettingKey),

    #[error("Type mismatch for {key}: expected {expected}, got {actual}")]
    TypeMismatch {
        key: SettingKey,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistent key→value store consumed by the widget
///
/// No transactional guarantees: callers read a value back only after the
/// `set` that wrote it has returned.
pub trait SettingsStore {
    /// Effective values for the requested keys; unknown keys are omitted
    fn get(&self, keys: &[SettingKey]) -> Vec<(SettingKey, SettingValue)>;

    /// Stores values
    fn set(&mut self, values: Vec<(SettingKey, SettingValue)>) -> Result<(), SettingsError>;
}

/// Settings registry: baked defaults plus stored overrides
#[derive(Debug, Clone, Default)]
pub struct SettingsRegistry {
    defaults: BTreeMap<SettingKey, SettingValue>,
    overrides: BTreeMap<SettingKey, SettingValue>,
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a default setting
    pub fn register_default(&mut self, key: impl Into<SettingKey>, value: SettingValue) {
        self.defaults.insert(key.into(), value);
    }

    /// Effective value (override or default)
    pub fn value(&self, key: &SettingKey) -> Option<&SettingValue> {
        self.overrides.get(key).or_else(|| self.defaults.get(key))
    }

    pub fn get_default(&self, key: &SettingKey) -> Option<&SettingValue> {
        self.defaults.get(key)
    }

    pub fn get_override(&self, key: &SettingKey) -> Option<&SettingValue> {
        self.overrides.get(key)
    }

    /// Stores an override after checking it against the default's type
    pub fn set_override(
        &mut self,
        key: impl Into<SettingKey>,
        value: SettingValue,
    ) -> Result<(), SettingsError> {
        let key = key.into();
        let default = self
            .defaults
            .get(&key)
            .ok_or_else(|| SettingsError::UnknownKey(key.clone()))?;
        let compatible = std::mem::discriminant(default) == std::mem::discriminant(&value)
            || matches!((default, &value), (SettingValue::Float(_), SettingValue::Integer(_)));
        if !compatible {
            return Err(SettingsError::TypeMismatch {
                key,
                expected: default.type_name(),
                actual: value.type_name(),
            });
        }
        self.overrides.insert(key, value);
        Ok(())
    }

    /// Resets a setting to its default value
    pub fn reset_to_default(&mut self, key: &SettingKey) -> bool {
        self.overrides.remove(key).is_some()
    }

    /// Returns all settings with a given prefix
    pub fn list_with_prefix(&self, prefix: &str) -> Vec<(SettingKey, SettingValue)> {
        self.defaults
            .keys()
            .chain(self.overrides.keys())
            .filter(|key| key.starts_with(prefix))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .filter_map(|key| self.value(key).map(|v| (key.clone(), v.clone())))
            .collect()
    }

    /// Exports all overrides for persistence
    pub fn export_overrides(&self) -> BTreeMap<SettingKey, SettingValue> {
        self.overrides.clone()
    }

    /// Imports overrides, skipping keys that are unknown or mistyped
    pub fn import_overrides(&mut self, overrides: BTreeMap<SettingKey, SettingValue>) {
        for (key, value) in overrides {
            if let Err(err) = self.set_override(key, value) {
                tracing::warn!(target: "settings", error = %err, "ignoring stored setting");
            }
        }
    }
}

impl SettingsStore for SettingsRegistry {
    fn get(&self, keys: &[SettingKey]) -> Vec<(SettingKey, SettingValue)> {
        keys.iter()
            .filter_map(|key| self.value(key).map(|v| (key.clone(), v.clone())))
            .collect()
    }

    fn set(&mut self, values: Vec<(SettingKey, SettingValue)>) -> Result<(), SettingsError> {
        for (key, value) in values {
            self.set_override(key, value)?;
        }
        Ok(())
    }
}

/// Keyboard setting keys
pub mod keys {
    pub const LAYOUT: &str = "keyboard.layout";
    pub const LAYOUTS: &str = "keyboard.layouts";
    pub const ENABLED: &str = "keyboard.enabled";
    pub const ZOOM: &str = "keyboard.zoom";
    pub const HEIGHT_PX: &str = "keyboard.height_px";
    pub const INTELLIGENT_SCROLL: &str = "keyboard.intelligent_scroll";
    pub const REVEAL_PASSWORD: &str = "keyboard.reveal_password";
    pub const SHOW_OPEN_BUTTON: &str = "keyboard.show_open_button";
    pub const URL_BUTTON: &str = "keyboard.url_button";
    pub const BLUR_GRACE_MS: &str = "keyboard.blur_grace_ms";
    pub const OVERLAY_CLOSE_MS: &str = "keyboard.overlay_close_ms";
}

/// Creates a settings registry with default settings
pub fn create_default_registry() -> SettingsRegistry {
    let mut registry = SettingsRegistry::new();

    // Layout
    registry.register_default(keys::LAYOUT, SettingValue::String("en".to_string()));
    registry.register_default(
        keys::LAYOUTS,
        SettingValue::StringList(vec!["en".to_string()]),
    );

    // Behaviour
    registry.register_default(keys::ENABLED, SettingValue::Boolean(true));
    registry.register_default(keys::INTELLIGENT_SCROLL, SettingValue::Boolean(true));
    registry.register_default(keys::REVEAL_PASSWORD, SettingValue::Boolean(false));
    registry.register_default(keys::BLUR_GRACE_MS, SettingValue::Integer(500));
    registry.register_default(keys::OVERLAY_CLOSE_MS, SettingValue::Integer(500));

    // Chrome
    registry.register_default(keys::ZOOM, SettingValue::Float(1.0));
    registry.register_default(keys::HEIGHT_PX, SettingValue::Integer(260));
    registry.register_default(keys::SHOW_OPEN_BUTTON, SettingValue::Boolean(true));
    registry.register_default(keys::URL_BUTTON, SettingValue::Boolean(true));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_key_starts_with() {
        let key = SettingKey::new("keyboard.zoom");
        assert!(key.starts_with("keyboard"));
        assert!(!key.starts_with("theme"));
    }

    #[test]
    fn test_setting_value_accessors() {
        assert_eq!(SettingValue::Boolean(true).as_boolean(), Some(true));
        assert_eq!(SettingValue::Integer(42).as_boolean(), None);
        assert_eq!(SettingValue::Integer(2).as_float(), Some(2.0));
        assert_eq!(SettingValue::String("en".into()).as_string(), Some("en"));
    }

    #[test]
    fn test_override_wins_over_default() {
        let mut registry = create_default_registry();
        let key = SettingKey::new(keys::LAYOUT);
        assert_eq!(registry.value(&key).and_then(|v| v.as_string()), Some("en"));

        registry
            .set_override(keys::LAYOUT, SettingValue::String("de".into()))
            .unwrap();
        assert_eq!(registry.value(&key).and_then(|v| v.as_string()), Some("de"));

        assert!(registry.reset_to_default(&key));
        assert_eq!(registry.value(&key).and_then(|v| v.as_string()), Some("en"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut registry = create_default_registry();
        let result = registry.set_override("keyboard.bogus", SettingValue::Boolean(true));
        assert_eq!(
            result,
            Err(SettingsError::UnknownKey(SettingKey::new("keyboard.bogus")))
        );
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut registry = create_default_registry();
        let result = registry.set_override(keys::ENABLED, SettingValue::Integer(1));
        assert!(matches!(result, Err(SettingsError::TypeMismatch { .. })));
    }

    #[test]
    fn test_integer_accepted_for_float() {
        let mut registry = create_default_registry();
        registry
            .set_override(keys::ZOOM, SettingValue::Integer(2))
            .unwrap();
        let zoom = registry.value(&SettingKey::new(keys::ZOOM)).unwrap();
        assert_eq!(zoom.as_float(), Some(2.0));
    }

    #[test]
    fn test_store_get_omits_unknown_keys() {
        let registry = create_default_registry();
        let values = registry.get(&[SettingKey::new(keys::ZOOM), SettingKey::new("nope")]);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].0.as_str(), keys::ZOOM);
    }

    #[test]
    fn test_list_with_prefix_is_sorted_and_merged() {
        let mut registry = create_default_registry();
        registry
            .set_override(keys::ZOOM, SettingValue::Float(1.5))
            .unwrap();
        let all = registry.list_with_prefix("keyboard.");
        assert_eq!(all.len(), 11);
        let zoom = all.iter().find(|(k, _)| k.as_str() == keys::ZOOM).unwrap();
        assert_eq!(zoom.1, SettingValue::Float(1.5));
        assert!(all.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_import_skips_invalid_entries() {
        let mut registry = create_default_registry();
        let mut stored = BTreeMap::new();
        stored.insert(SettingKey::new(keys::LAYOUT), SettingValue::String("fr".into()));
        stored.insert(SettingKey::new("legacy.key"), SettingValue::Boolean(true));
        registry.import_overrides(stored);
        assert_eq!(registry.export_overrides().len(), 1);
    }
}
