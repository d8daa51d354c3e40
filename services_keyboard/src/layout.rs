//! Key layouts and the provider that renders them

use input_types::VirtualKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Layout errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Layout not found: {0}")]
    NotFound(String),

    #[error("Layout {id} line {line}: unknown key {token:?}")]
    UnknownKey {
        id: String,
        line: usize,
        token: String,
    },

    #[error("Layout {0} has no keys")]
    Empty(String),
}

/// Rendered key rows of one layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutFragment {
    pub id: String,
    pub rows: Vec<Vec<VirtualKey>>,
}

impl LayoutFragment {
    /// Parses a fragment: one row per non-blank line, keys separated by
    /// whitespace, named as [`VirtualKey::from_name`] accepts
    pub fn parse(id: &str, source: &str) -> Result<Self, LayoutError> {
        let mut rows = Vec::new();
        for (index, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|token| {
                    VirtualKey::from_name(token).ok_or_else(|| LayoutError::UnknownKey {
                        id: id.to_string(),
                        line: index + 1,
                        token: token.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        if rows.is_empty() {
            return Err(LayoutError::Empty(id.to_string()));
        }
        Ok(Self {
            id: id.to_string(),
            rows,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &VirtualKey> {
        self.rows.iter().flatten()
    }
}

/// Renders layouts by id
pub trait LayoutProvider {
    fn render_layout(&self, id: &str) -> Result<LayoutFragment, LayoutError>;
}

/// In-memory provider over layout sources
#[derive(Debug, Clone, Default)]
pub struct StaticLayouts {
    sources: BTreeMap<String, String>,
}

const EN: &str = "
q w e r t y u i o p
a s d f g h j k l
z x c v b n m
";

const DE: &str = "
q w e r t z u i o p ü
a s d f g h j k l ö ä
y x c v b n m ß
";

const FR: &str = "
a z e r t y u i o p
q s d f g h j k l m
w x c v b n é è à
";

impl StaticLayouts {
    pub fn new() -> Self {
        Self::default()
    }

    /// English, German and French letter layouts
    pub fn builtin() -> Self {
        let mut layouts = Self::new();
        layouts.insert("en", EN);
        layouts.insert("de", DE);
        layouts.insert("fr", FR);
        layouts
    }

    pub fn insert(&mut self, id: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(id.into(), source.into());
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}

impl LayoutProvider for StaticLayouts {
    fn render_layout(&self, id: &str) -> Result<LayoutFragment, LayoutError> {
        let source = self
            .sources
            .get(id)
            .ok_or_else(|| LayoutError::NotFound(id.to_string()))?;
        LayoutFragment::parse(id, source)
    }
}
