//! Settings persistence layer
//!
//! Overrides are stored as versioned JSON. Loading is safe against
//! corruption: a broken or foreign file falls back to empty overrides.

use crate::{SettingKey, SettingValue, SettingsRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Serializable container for settings overrides
/// Uses BTreeMap for stable ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsOverridesData {
    /// Version of the settings format
    pub version: u32,
    pub overrides: BTreeMap<String, SettingValue>,
}

impl SettingsOverridesData {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            overrides: BTreeMap::new(),
        }
    }

    pub fn from_overrides(overrides: &BTreeMap<SettingKey, SettingValue>) -> Self {
        let mut data = Self::new();
        for (key, value) in overrides {
            data.overrides.insert(key.as_str().to_string(), value.clone());
        }
        data
    }

    pub fn to_overrides(&self) -> BTreeMap<SettingKey, SettingValue> {
        self.overrides
            .iter()
            .map(|(key, value)| (SettingKey::new(key.as_str()), value.clone()))
            .collect()
    }
}

impl Default for SettingsOverridesData {
    fn default() -> Self {
        Self::new()
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors that can occur during persistence operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to serialize settings: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize settings: {0}")]
    DeserializationFailed(String),

    #[error("Unsupported settings version: {0}")]
    UnsupportedVersion(u32),

    #[error("Settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializes settings overrides to JSON bytes
pub fn serialize_overrides(data: &SettingsOverridesData) -> PersistenceResult<Vec<u8>> {
    serde_json::to_vec_pretty(data)
        .map_err(|e| PersistenceError::SerializationFailed(e.to_string()))
}

/// Deserializes settings overrides from JSON bytes
pub fn deserialize_overrides(bytes: &[u8]) -> PersistenceResult<SettingsOverridesData> {
    let data: SettingsOverridesData = serde_json::from_slice(bytes)
        .map_err(|e| PersistenceError::DeserializationFailed(e.to_string()))?;

    if data.version != SettingsOverridesData::CURRENT_VERSION {
        return Err(PersistenceError::UnsupportedVersion(data.version));
    }

    Ok(data)
}

/// Attempts to load settings from bytes, falling back to empty overrides on error
pub fn load_overrides_safe(bytes: &[u8]) -> SettingsOverridesData {
    match deserialize_overrides(bytes) {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!(target: "settings", error = %err, "discarding stored settings");
            SettingsOverridesData::new()
        }
    }
}

impl SettingsRegistry {
    /// Applies overrides stored at `path` on top of this registry
    ///
    /// A missing file is not an error; a corrupt one is discarded.
    pub fn load_from_path(&mut self, path: &Path) -> PersistenceResult<()> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        self.import_overrides(load_overrides_safe(&bytes).to_overrides());
        Ok(())
    }

    /// Writes the current overrides to `path`
    pub fn save_to_path(&self, path: &Path) -> PersistenceResult<()> {
        let data = SettingsOverridesData::from_overrides(&self.export_overrides());
        std::fs::write(path, serialize_overrides(&data)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_default_registry, keys};

    #[test]
    fn test_roundtrip_conversion() {
        let mut overrides = BTreeMap::new();
        overrides.insert(SettingKey::new(keys::ZOOM), SettingValue::Float(1.25));
        overrides.insert(SettingKey::new(keys::ENABLED), SettingValue::Boolean(false));

        let data = SettingsOverridesData::from_overrides(&overrides);
        assert_eq!(data.to_overrides(), overrides);
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut data = SettingsOverridesData::new();
        data.overrides
            .insert(keys::LAYOUT.to_string(), SettingValue::String("fr".into()));

        let bytes = serialize_overrides(&data).unwrap();
        assert_eq!(deserialize_overrides(&bytes).unwrap(), data);
    }

    #[test]
    fn test_deserialize_unsupported_version() {
        let json = r#"{ "version": 999, "overrides": {} }"#;
        assert!(matches!(
            deserialize_overrides(json.as_bytes()),
            Err(PersistenceError::UnsupportedVersion(999))
        ));
    }

    #[test]
    fn test_load_overrides_safe_with_invalid_data() {
        assert_eq!(
            load_overrides_safe(b"{ invalid json }"),
            SettingsOverridesData::new()
        );
    }

    #[test]
    fn test_stable_key_ordering_in_json() {
        let mut data = SettingsOverridesData::new();
        data.overrides
            .insert(keys::ZOOM.to_string(), SettingValue::Float(2.0));
        data.overrides
            .insert(keys::BLUR_GRACE_MS.to_string(), SettingValue::Integer(100));

        let bytes = serialize_overrides(&data).unwrap();
        let json = std::str::from_utf8(&bytes).unwrap();
        assert!(json.find(keys::BLUR_GRACE_MS).unwrap() < json.find(keys::ZOOM).unwrap());
    }

    #[test]
    fn test_registry_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut registry = create_default_registry();
        registry
            .set_override(keys::LAYOUT, SettingValue::String("de".into()))
            .unwrap();
        registry.save_to_path(&path).unwrap();

        let mut restored = create_default_registry();
        restored.load_from_path(&path).unwrap();
        assert_eq!(
            restored.get_override(&SettingKey::new(keys::LAYOUT)),
            Some(&SettingValue::String("de".into()))
        );
    }

    #[test]
    fn test_missing_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = create_default_registry();
        registry
            .load_from_path(&dir.path().join("absent.json"))
            .unwrap();
        assert!(registry.export_overrides().is_empty());
    }
}
