//! Unique identifiers for host documents, nodes and cross-context handles

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a document (the top document or a nested one)
///
/// Allocated by the host; never reused while the host lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Creates a document ID from a raw value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Doc({})", self.0)
    }
}

/// Identifier for a node, unique within its owning document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Creates a node ID from a raw value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Non-owning reference to a node somewhere in the host
///
/// Holding a `NodeRef` does not keep the node alive; callers must check
/// that it is still connected before acting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub document: DocumentId,
    pub node: NodeId,
}

impl NodeRef {
    pub const fn new(document: DocumentId, node: NodeId) -> Self {
        Self { document, node }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.document, self.node)
    }
}

/// Identifier of a nested document, stored on its frame element
///
/// Unique among the top document's nested documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameId(String);

impl FrameId {
    /// Generates a fresh frame ID
    pub fn generate() -> Self {
        Self(format!("vk-frame-{}", Uuid::new_v4().simple()))
    }

    /// Wraps an existing attribute value
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an element, unique within its owning document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(String);

impl ElementId {
    /// Generates a fresh element ID
    pub fn generate() -> Self {
        Self(format!("vk-el-{}", Uuid::new_v4().simple()))
    }

    /// Wraps an existing attribute value
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable cross-context address of a target inside a nested document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameHandle {
    pub frame_id: FrameId,
    pub element_id: ElementId,
}

impl FrameHandle {
    pub fn new(frame_id: FrameId, element_id: ElementId) -> Self {
        Self {
            frame_id,
            element_id,
        }
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.frame_id, self.element_id)
    }
}

/// Script context a component lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContextId {
    /// The top document, which hosts the keyboard UI
    Top,
    /// A same-origin nested document
    Nested(DocumentId),
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextId::Top => write!(f, "top"),
            ContextId::Nested(doc) => write!(f, "nested({})", doc),
        }
    }
}
