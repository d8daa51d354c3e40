//! # Keyboard Controller
//!
//! UI state machine of the on-screen keyboard: open/closed, one-shot
//! shift, letters vs. numbers, overlays and per-target chrome.
//!
//! ## Philosophy
//!
//! - **Owned state**: [`KeyboardState`] is only changed through controller
//!   transitions
//! - **Keys resolve, they don't act**: a pressed [`VirtualKey`] becomes a
//!   [`KeyResolution`]; the runtime hands edits to the event synthesizer
//! - **Layouts are external**: a [`LayoutProvider`] renders them; a failed
//!   load keeps the previous layout
//!
//! ## States
//!
//! ```text
//! Closed ──focus──▶ Open(letters) ◀──&123──▶ Open(numbers)
//!   ▲                    │                        │
//!   └──── close / blur ──┴────────────────────────┘
//! ```
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A renderer (rows are data, styling is elsewhere)
//! - The focus tracker (that's the focus coordinator)

pub mod layout;

pub use layout::{LayoutError, LayoutFragment, LayoutProvider, StaticLayouts};

use input_types::{KeyAction, PadKind, VirtualKey};
use serde::{Deserialize, Serialize};
use services_binder::{EditableTarget, TargetKind};
use services_settings::{KeyboardConfig, SettingsStore};

const SYMBOL_ROWS: &str = "
1 2 3 4 5 6 7 8 9 0
- / : ; ( ) $ & \" +
. , ? ! ' # % *
";

const NUMERIC_ROWS: &str = "
1 2 3
4 5 6
7 8 9
- 0 .
";

/// Persistent keyboard state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardState {
    pub open: bool,
    /// One-shot: cleared by the next insertion
    pub shift: bool,
    pub numbers_mode: bool,
    pub loaded_layout_id: Option<String>,
}

/// Visible mode, derived from [`KeyboardState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyboardMode {
    Closed,
    Letters,
    Numbers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Overlay {
    LayoutPicker,
    Settings,
}

/// Extra keys and pad chosen for the focused target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chrome {
    pub pad: PadKind,
    /// `@` and `.com` affordances
    pub email_keys: bool,
    pub rich_text: bool,
}

impl Default for Chrome {
    fn default() -> Self {
        Self {
            pad: PadKind::Letters,
            email_keys: false,
            rich_text: false,
        }
    }
}

impl Chrome {
    /// Chrome for a target's kind and original type
    pub fn for_target(target: &EditableTarget) -> Self {
        let original = target.original_type.as_str();
        Self {
            pad: match original {
                "number" | "tel" => PadKind::Numeric,
                _ => PadKind::Letters,
            },
            email_keys: original == "email",
            rich_text: target.kind == TargetKind::RichText,
        }
    }
}

/// What a key press means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResolution {
    /// Hand to the event synthesizer
    Edit(KeyAction),
    /// The keyboard closed; the focused target should blur
    Closed,
    ModeChanged(KeyboardMode),
    OverlayOpened(Overlay),
    OverlayClosed,
    OpenUrlBar,
    /// Nothing to do
    Ignored,
}

/// Keyboard controller
pub struct KeyboardController {
    config: KeyboardConfig,
    state: KeyboardState,
    chrome: Chrome,
    fragment: Option<LayoutFragment>,
    overlay: Option<Overlay>,
    overlay_dismissed: bool,
}

impl KeyboardController {
    pub fn new(config: KeyboardConfig) -> Self {
        Self {
            config,
            state: KeyboardState::default(),
            chrome: Chrome::default(),
            fragment: None,
            overlay: None,
            overlay_dismissed: false,
        }
    }

    pub fn config(&self) -> &KeyboardConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: KeyboardConfig) {
        self.config = config;
    }

    pub fn state(&self) -> &KeyboardState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.open
    }

    pub fn mode(&self) -> KeyboardMode {
        match (self.state.open, self.state.numbers_mode) {
            (false, _) => KeyboardMode::Closed,
            (true, false) => KeyboardMode::Letters,
            (true, true) => KeyboardMode::Numbers,
        }
    }

    pub fn chrome(&self) -> Chrome {
        self.chrome
    }

    pub fn overlay(&self) -> Option<Overlay> {
        self.overlay
    }

    pub fn fragment(&self) -> Option<&LayoutFragment> {
        self.fragment.as_ref()
    }

    /// On-screen height after zoom; zero while closed
    pub fn height(&self) -> f64 {
        if self.state.open {
            self.config.effective_height()
        } else {
            0.0
        }
    }

    /// A target got focus: open if closed, reset to letters and re-derive
    /// chrome; returns whether the keyboard was closed before
    pub fn open_for(&mut self, target: &EditableTarget, provider: &impl LayoutProvider) -> bool {
        let opened = !self.state.open;
        self.state.open = true;
        self.state.numbers_mode = false;
        self.chrome = Chrome::for_target(target);

        if self.state.loaded_layout_id.is_none() {
            let layout = self.config.layout.clone();
            if let Err(err) = self.load_layout(&layout, provider) {
                tracing::debug!(target: "keyboard", error = %err, "keys bar renders without a layout");
            }
        }
        tracing::debug!(
            target: "keyboard",
            opened,
            pad = %self.chrome.pad,
            email = self.chrome.email_keys,
            rich = self.chrome.rich_text,
            "chrome rendered"
        );
        opened
    }

    /// Closes the keyboard and any overlay; returns whether it was open
    pub fn close(&mut self) -> bool {
        let was_open = self.state.open;
        self.state.open = false;
        self.state.shift = false;
        self.state.numbers_mode = false;
        self.overlay = None;
        self.overlay_dismissed = false;
        if was_open {
            tracing::debug!(target: "keyboard", "keyboard closed");
        }
        was_open
    }

    /// Loads `id` through `provider`; on failure the previous layout stays
    pub fn load_layout(
        &mut self,
        id: &str,
        provider: &impl LayoutProvider,
    ) -> Result<(), LayoutError> {
        match provider.render_layout(id) {
            Ok(fragment) => {
                tracing::info!(target: "keyboard", layout = id, "layout loaded");
                self.state.loaded_layout_id = Some(fragment.id.clone());
                self.fragment = Some(fragment);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    target: "keyboard",
                    layout = id,
                    kept = ?self.state.loaded_layout_id,
                    error = %err,
                    "layout load failed"
                );
                Err(err)
            }
        }
    }

    /// Resolves a pressed key, applying its UI transition
    pub fn press(&mut self, key: &VirtualKey) -> KeyResolution {
        if !self.state.open {
            return KeyResolution::Ignored;
        }
        match key {
            VirtualKey::Char(c) => KeyResolution::Edit(KeyAction::InsertChar(*c)),
            VirtualKey::Space => KeyResolution::Edit(KeyAction::InsertChar(' ')),
            VirtualKey::Backspace => KeyResolution::Edit(KeyAction::Backspace),
            VirtualKey::Enter => KeyResolution::Edit(KeyAction::Enter),
            VirtualKey::EmailAt => KeyResolution::Edit(KeyAction::InsertChar('@')),
            VirtualKey::DotCom => KeyResolution::Edit(KeyAction::InsertText(".com".into())),
            VirtualKey::Shift => {
                self.state.shift = !self.state.shift;
                KeyResolution::Edit(KeyAction::SetShift(self.state.shift))
            }
            VirtualKey::NumbersToggle => {
                self.state.numbers_mode = !self.state.numbers_mode;
                KeyResolution::ModeChanged(self.mode())
            }
            VirtualKey::Close => {
                self.close();
                KeyResolution::Closed
            }
            VirtualKey::LayoutPicker => self.toggle_overlay(Overlay::LayoutPicker),
            VirtualKey::Settings => self.toggle_overlay(Overlay::Settings),
            VirtualKey::UrlBar if self.config.url_button => KeyResolution::OpenUrlBar,
            VirtualKey::UrlBar => KeyResolution::Ignored,
        }
    }

    /// An insertion used the one-shot shift
    pub fn consume_shift(&mut self) {
        self.state.shift = false;
    }

    fn toggle_overlay(&mut self, overlay: Overlay) -> KeyResolution {
        self.overlay_dismissed = false;
        if self.overlay == Some(overlay) {
            self.overlay = None;
            return KeyResolution::OverlayClosed;
        }
        self.overlay = Some(overlay);
        KeyResolution::OverlayOpened(overlay)
    }

    /// Layouts the picker offers
    pub fn layout_choices(&self) -> &[String] {
        &self.config.layouts
    }

    /// Picks a layout from the picker: loads it and stores it back to
    /// settings; the picker closes either way
    pub fn choose_layout(
        &mut self,
        id: &str,
        provider: &impl LayoutProvider,
        store: &mut impl SettingsStore,
    ) -> Result<(), LayoutError> {
        if self.overlay == Some(Overlay::LayoutPicker) {
            self.overlay = None;
        }
        self.load_layout(id, provider)?;
        self.config.layout = id.to_string();
        if let Err(err) = KeyboardConfig::store_layout(store, id) {
            tracing::warn!(target: "keyboard", layout = id, error = %err, "layout choice not stored");
        }
        Ok(())
    }

    /// A click landed outside the keyboard's own subtree
    pub fn click_outside(&mut self) -> bool {
        self.overlay_dismissed = false;
        self.overlay.take().is_some()
    }

    /// The overlay was dismissed; it closes when the auto-close delay fires
    pub fn dismiss_overlay(&mut self) -> bool {
        if self.overlay.is_none() {
            return false;
        }
        self.overlay_dismissed = true;
        true
    }

    /// Auto-close delay fired
    pub fn overlay_timeout(&mut self) -> bool {
        if !self.overlay_dismissed {
            return false;
        }
        self.overlay_dismissed = false;
        self.overlay.take().is_some()
    }

    /// Key rows currently on screen, bottom bar included
    pub fn visible_rows(&self) -> Vec<Vec<VirtualKey>> {
        if !self.state.open {
            return Vec::new();
        }
        let mut rows = if self.chrome.pad == PadKind::Numeric {
            fixed_rows("numeric", NUMERIC_ROWS)
        } else if self.state.numbers_mode {
            fixed_rows("symbols", SYMBOL_ROWS)
        } else {
            self.fragment
                .as_ref()
                .map(|f| f.rows.clone())
                .unwrap_or_default()
        };

        let mut bar = Vec::new();
        if self.chrome.pad == PadKind::Letters {
            bar.push(VirtualKey::Shift);
            bar.push(VirtualKey::NumbersToggle);
        }
        if self.chrome.email_keys {
            bar.push(VirtualKey::EmailAt);
            bar.push(VirtualKey::DotCom);
        }
        bar.extend([VirtualKey::Space, VirtualKey::Backspace, VirtualKey::Enter]);
        if self.config.layouts.len() > 1 {
            bar.push(VirtualKey::LayoutPicker);
        }
        bar.push(VirtualKey::Settings);
        if self.config.url_button {
            bar.push(VirtualKey::UrlBar);
        }
        bar.push(VirtualKey::Close);
        rows.push(bar);
        rows
    }
}

fn fixed_rows(id: &str, source: &str) -> Vec<Vec<VirtualKey>> {
    LayoutFragment::parse(id, source)
        .map(|f| f.rows)
        .unwrap_or_default()
}
