//! Typed view of the keyboard settings

use crate::{keys, SettingKey, SettingValue, SettingsError, SettingsStore};

/// Keyboard preferences read from a [`SettingsStore`]
///
/// Missing or mistyped values fall back to the baked defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardConfig {
    pub layout: String,
    pub layouts: Vec<String>,
    pub enabled: bool,
    pub zoom: f64,
    pub height_px: u32,
    pub intelligent_scroll: bool,
    pub reveal_password: bool,
    pub show_open_button: bool,
    pub url_button: bool,
    pub blur_grace_ms: u64,
    pub overlay_close_ms: u64,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            layout: "en".to_string(),
            layouts: vec!["en".to_string()],
            enabled: true,
            zoom: 1.0,
            height_px: 260,
            intelligent_scroll: true,
            reveal_password: false,
            show_open_button: true,
            url_button: true,
            blur_grace_ms: 500,
            overlay_close_ms: 500,
        }
    }
}

impl KeyboardConfig {
    const KEYS: [&'static str; 11] = [
        keys::LAYOUT,
        keys::LAYOUTS,
        keys::ENABLED,
        keys::ZOOM,
        keys::HEIGHT_PX,
        keys::INTELLIGENT_SCROLL,
        keys::REVEAL_PASSWORD,
        keys::SHOW_OPEN_BUTTON,
        keys::URL_BUTTON,
        keys::BLUR_GRACE_MS,
        keys::OVERLAY_CLOSE_MS,
    ];

    /// Reads every keyboard setting in one `get`
    pub fn load(store: &impl SettingsStore) -> Self {
        let requested: Vec<SettingKey> = Self::KEYS.iter().map(|k| SettingKey::new(*k)).collect();
        let mut config = Self::default();

        for (key, value) in store.get(&requested) {
            let applied = config.apply(key.as_str(), &value);
            if !applied {
                tracing::warn!(
                    target: "settings",
                    key = %key,
                    value = %value,
                    "ignoring mistyped setting"
                );
            }
        }
        config
    }

    fn apply(&mut self, key: &str, value: &SettingValue) -> bool {
        match key {
            keys::LAYOUT => value.as_string().map(|v| self.layout = v.to_string()),
            keys::LAYOUTS => value.as_string_list().map(|v| self.layouts = v.to_vec()),
            keys::ENABLED => value.as_boolean().map(|v| self.enabled = v),
            keys::ZOOM => value
                .as_float()
                .filter(|v| *v > 0.0)
                .map(|v| self.zoom = v),
            keys::HEIGHT_PX => value
                .as_integer()
                .and_then(|v| u32::try_from(v).ok())
                .map(|v| self.height_px = v),
            keys::INTELLIGENT_SCROLL => value.as_boolean().map(|v| self.intelligent_scroll = v),
            keys::REVEAL_PASSWORD => value.as_boolean().map(|v| self.reveal_password = v),
            keys::SHOW_OPEN_BUTTON => value.as_boolean().map(|v| self.show_open_button = v),
            keys::URL_BUTTON => value.as_boolean().map(|v| self.url_button = v),
            keys::BLUR_GRACE_MS => value
                .as_integer()
                .and_then(|v| u64::try_from(v).ok())
                .map(|v| self.blur_grace_ms = v),
            keys::OVERLAY_CLOSE_MS => value
                .as_integer()
                .and_then(|v| u64::try_from(v).ok())
                .map(|v| self.overlay_close_ms = v),
            _ => None,
        }
        .is_some()
    }

    /// Keyboard height on screen, after zoom
    pub fn effective_height(&self) -> f64 {
        f64::from(self.height_px) * self.zoom
    }

    /// Persists the chosen layout
    pub fn store_layout(
        store: &mut impl SettingsStore,
        layout: &str,
    ) -> Result<(), SettingsError> {
        store.set(vec![(
            SettingKey::new(keys::LAYOUT),
            SettingValue::String(layout.to_string()),
        )])
    }
}
