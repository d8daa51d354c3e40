//! Editable-target classification
//!
//! Pure: reads the tree, never writes to it.

use core_types::{NodeId, NodeRef};
use host_dom::Document;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute holding a control's real type while it is temporarily swapped
pub const SWAP_MARKER_ATTR: &str = "data-vk-original-type";

/// Input types that accept keyboard text
pub const VALUE_INPUT_TYPES: [&str; 7] =
    ["text", "password", "search", "email", "number", "tel", "url"];

/// Structural kind of an editable target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// Single-line control with a value and selection range
    ValueInput,
    /// Multi-line control
    Textarea,
    /// Editable content region or ARIA text box, edited through the document selection
    RichText,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::ValueInput => write!(f, "value-input"),
            TargetKind::Textarea => write!(f, "textarea"),
            TargetKind::RichText => write!(f, "rich-text"),
        }
    }
}

/// Result of classifying an editable node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: TargetKind,
    /// Input type for value inputs, `textarea` or `richtext` otherwise
    pub original_type: String,
    pub max_length: Option<usize>,
    /// Disabled and read-only targets are classified but never bound
    pub bindable: bool,
}

/// Classifies `node`, returning `None` when it cannot take keyboard input
pub fn classify(doc: &Document, node: NodeId) -> Option<Classification> {
    let el = doc.element(node)?;

    let rich = el.attribute("role") == Some("textbox")
        || el
            .attribute("contenteditable")
            .is_some_and(|v| !v.eq_ignore_ascii_case("false"));

    let (kind, original_type) = if rich {
        (TargetKind::RichText, "richtext".to_string())
    } else {
        match el.tag() {
            "textarea" => (TargetKind::Textarea, "textarea".to_string()),
            "input" => {
                let original = match el.attribute(SWAP_MARKER_ATTR) {
                    Some(t) => t.to_ascii_lowercase(),
                    None => el.input_type(),
                };
                if !VALUE_INPUT_TYPES.contains(&original.as_str()) {
                    return None;
                }
                (TargetKind::ValueInput, original)
            }
            _ => return None,
        }
    };

    let max_length = match kind {
        TargetKind::RichText => None,
        _ => el
            .attribute("maxlength")
            .and_then(|v| v.trim().parse::<usize>().ok()),
    };

    Some(Classification {
        kind,
        original_type,
        max_length,
        bindable: !(el.has_attribute("disabled") || el.has_attribute("readonly")),
    })
}

/// Non-owning reference to a classified node, held while it has focus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditableTarget {
    pub node: NodeRef,
    pub kind: TargetKind,
    pub original_type: String,
    pub max_length: Option<usize>,
}

impl EditableTarget {
    pub fn new(node: NodeRef, classification: &Classification) -> Self {
        Self {
            node,
            kind: classification.kind,
            original_type: classification.original_type.clone(),
            max_length: classification.max_length,
        }
    }

    pub fn is_rich_text(&self) -> bool {
        self.kind == TargetKind::RichText
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::DocumentId;

    fn doc() -> Document {
        Document::new(DocumentId::from_raw(1))
    }

    #[test]
    fn test_input_types() {
        let mut doc = doc();
        let body = doc.body();
        let plain = doc.append_element(body, "input", &[]).unwrap();
        let email = doc.append_element(body, "input", &[("type", "EMAIL")]).unwrap();
        let checkbox = doc
            .append_element(body, "input", &[("type", "checkbox")])
            .unwrap();

        let c = classify(&doc, plain).unwrap();
        assert_eq!(c.kind, TargetKind::ValueInput);
        assert_eq!(c.original_type, "text");
        assert_eq!(classify(&doc, email).unwrap().original_type, "email");
        assert!(classify(&doc, checkbox).is_none());
    }

    #[test]
    fn test_textarea_and_max_length() {
        let mut doc = doc();
        let body = doc.body();
        let area = doc
            .append_element(body, "textarea", &[("maxlength", "12")])
            .unwrap();
        let c = classify(&doc, area).unwrap();
        assert_eq!(c.kind, TargetKind::Textarea);
        assert_eq!(c.max_length, Some(12));

        let bad = doc
            .append_element(body, "input", &[("maxlength", "-1")])
            .unwrap();
        assert_eq!(classify(&doc, bad).unwrap().max_length, None);
    }

    #[test]
    fn test_rich_text_takes_precedence() {
        let mut doc = doc();
        let body = doc.body();
        let div = doc
            .append_element(body, "div", &[("contenteditable", "")])
            .unwrap();
        let aria = doc
            .append_element(body, "span", &[("role", "textbox")])
            .unwrap();
        let input = doc
            .append_element(body, "input", &[("type", "checkbox"), ("role", "textbox")])
            .unwrap();
        let off = doc
            .append_element(body, "div", &[("contenteditable", "FALSE")])
            .unwrap();

        assert_eq!(classify(&doc, div).unwrap().kind, TargetKind::RichText);
        assert_eq!(classify(&doc, aria).unwrap().kind, TargetKind::RichText);
        assert_eq!(classify(&doc, input).unwrap().kind, TargetKind::RichText);
        assert!(classify(&doc, off).is_none());
    }

    #[test]
    fn test_disabled_is_not_bindable() {
        let mut doc = doc();
        let body = doc.body();
        let input = doc
            .append_element(body, "input", &[("readonly", "")])
            .unwrap();
        let c = classify(&doc, input).unwrap();
        assert!(!c.bindable);
    }

    #[test]
    fn test_swapped_password_keeps_original_type() {
        let mut doc = doc();
        let body = doc.body();
        let input = doc
            .append_element(
                body,
                "input",
                &[("type", "text"), (SWAP_MARKER_ATTR, "password")],
            )
            .unwrap();
        assert_eq!(classify(&doc, input).unwrap().original_type, "password");
    }

    #[test]
    fn test_text_nodes_are_not_editable() {
        let mut doc = doc();
        let body = doc.body();
        let text = doc.append_text(body, "hi").unwrap();
        assert!(classify(&doc, text).is_none());
    }
}
