//! Node storage

use core_types::{DocumentId, NodeId};
use std::collections::{BTreeMap, BTreeSet};

/// Input types whose controls expose `selectionStart`/`selectionEnd`
const SELECTABLE_INPUT_TYPES: [&str; 5] = ["text", "search", "url", "tel", "password"];

/// Payload of a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Element(Element),
    Text(String),
    /// Root of an isolated rendering subtree; has no parent, only a host
    ShadowRoot { host: NodeId },
}

/// Element state
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: String,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) value: String,
    pub(crate) selection: (usize, usize),
    pub(crate) shadow_root: Option<NodeId>,
    pub(crate) content_document: Option<DocumentId>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            value: String::new(),
            selection: (0, 0),
            shadow_root: None,
            content_document: None,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn shadow_root(&self) -> Option<NodeId> {
        self.shadow_root
    }

    pub fn content_document(&self) -> Option<DocumentId> {
        self.content_document
    }

    /// Exposed control type, lower-cased; `text` for an input without one
    pub fn input_type(&self) -> String {
        match self.attribute("type") {
            Some(t) if !t.is_empty() => t.to_ascii_lowercase(),
            _ if self.tag == "input" => "text".to_string(),
            _ => String::new(),
        }
    }

    /// Whether the control lets scripts read and write its selection
    pub fn supports_selection(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => SELECTABLE_INPUT_TYPES.contains(&self.input_type().as_str()),
            _ => false,
        }
    }

    /// Whether this element submits its form when clicked
    pub fn is_submit_button(&self) -> bool {
        match self.tag.as_str() {
            "button" => matches!(self.attribute("type"), None | Some("submit")),
            "input" => matches!(self.input_type().as_str(), "submit" | "image"),
            _ => false,
        }
    }
}

/// Arena slot
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
    pub(crate) markers: BTreeSet<String>,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
            markers: BTreeSet::new(),
        }
    }

    pub(crate) fn element(&self) -> Option<&Element> {
        match &self.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self) -> Option<&mut Element> {
        match &mut self.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        match &self.data {
            NodeData::Text(_) => true,
            NodeData::Element(_) => self.children.is_empty(),
            NodeData::ShadowRoot { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_type_defaults_to_text() {
        let el = Element::new("INPUT");
        assert_eq!(el.tag(), "input");
        assert_eq!(el.input_type(), "text");
    }

    #[test]
    fn test_selection_support_by_type() {
        let mut el = Element::new("input");
        assert!(el.supports_selection());
        el.attributes.insert("type".into(), "email".into());
        assert!(!el.supports_selection());
        el.attributes.insert("type".into(), "Number".into());
        assert!(!el.supports_selection());
        assert!(Element::new("textarea").supports_selection());
    }

    #[test]
    fn test_submit_button_detection() {
        assert!(Element::new("button").is_submit_button());
        let mut reset = Element::new("button");
        reset.attributes.insert("type".into(), "reset".into());
        assert!(!reset.is_submit_button());
        let mut input = Element::new("input");
        input.attributes.insert("type".into(), "submit".into());
        assert!(input.is_submit_button());
    }
}
