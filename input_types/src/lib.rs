//! # Input Types
//!
//! This crate defines the key vocabulary shared by the keyboard UI, the
//! relay and the event synthesizer.
//!
//! ## Philosophy
//!
//! - **Intents, not bytes**: A key press is a closed [`KeyAction`], never an ad hoc string
//! - **Serializable**: Actions cross context boundaries inside relay messages
//! - **Unicode-aware**: Shift maps through full Unicode case tables, not ASCII
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A layout description (layouts come from the layout provider)
//! - Hardware scan codes
//! - Text prediction of any kind

use serde::{Deserialize, Serialize};
use std::fmt;

/// Legacy `keyCode` of the Backspace key
pub const KEY_CODE_BACKSPACE: u32 = 8;
/// Legacy `keyCode` of the Enter key
pub const KEY_CODE_ENTER: u32 = 13;
/// Legacy `keyCode` of the Shift key
pub const KEY_CODE_SHIFT: u32 = 16;

/// An edit the synthesizer performs on the focused target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAction {
    /// Insert one character (subject to one-shot shift)
    InsertChar(char),
    /// Insert a whole string in one edit (voice input, relayed text)
    InsertText(String),
    Backspace,
    Enter,
    SetShift(bool),
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::InsertChar(c) => write!(f, "insert({:?})", c),
            KeyAction::InsertText(s) => write!(f, "insert({:?})", s),
            KeyAction::Backspace => write!(f, "backspace"),
            KeyAction::Enter => write!(f, "enter"),
            KeyAction::SetShift(on) => write!(f, "shift({})", on),
        }
    }
}

/// A key on the rendered keyboard
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VirtualKey {
    /// Character key; the value comes from the loaded layout
    Char(char),
    Space,
    Backspace,
    Enter,
    Shift,
    /// `&123` toggle between letters and numbers/symbols
    NumbersToggle,
    /// `@` affordance shown for email targets
    EmailAt,
    /// `.com` affordance shown for email targets
    DotCom,
    Close,
    LayoutPicker,
    Settings,
    UrlBar,
}

impl VirtualKey {
    /// Parses the names used by scripts and layout fragments
    pub fn from_name(name: &str) -> Option<Self> {
        let key = match name.to_ascii_lowercase().as_str() {
            "space" => VirtualKey::Space,
            "backspace" | "back" => VirtualKey::Backspace,
            "enter" | "return" => VirtualKey::Enter,
            "shift" => VirtualKey::Shift,
            "&123" | "numbers" => VirtualKey::NumbersToggle,
            "@" | "at" => VirtualKey::EmailAt,
            ".com" | "dotcom" => VirtualKey::DotCom,
            "close" => VirtualKey::Close,
            "layouts" => VirtualKey::LayoutPicker,
            "settings" => VirtualKey::Settings,
            "url" => VirtualKey::UrlBar,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => VirtualKey::Char(c),
                    _ => return None,
                }
            }
        };
        Some(key)
    }
}

/// Applies the shift transform to a character
///
/// Returns the upper-case mapping when `shift` is on. Some characters map
/// to more than one (`ß` → `SS`), hence the `String`.
pub fn shift_transform(c: char, shift: bool) -> String {
    if shift {
        c.to_uppercase().collect()
    } else {
        c.to_string()
    }
}

/// Legacy `keyCode` reported in keydown/keyup for a character
///
/// ASCII letters report their upper-case code, everything else its code
/// point, which is what pages sniffing `keyCode` expect.
pub fn key_code_for_char(c: char) -> u32 {
    if c.is_ascii_lowercase() {
        c.to_ascii_uppercase() as u32
    } else {
        c as u32
    }
}

/// Numeric pad vs. letter chrome, derived from the focused target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadKind {
    Letters,
    Numeric,
}

impl fmt::Display for PadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PadKind::Letters => write!(f, "letters"),
            PadKind::Numeric => write!(f, "numeric"),
        }
    }
}
