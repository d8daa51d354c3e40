//! # Host DOM
//!
//! A deterministic, in-memory stand-in for the host page the keyboard is
//! injected into.
//!
//! ## Philosophy
//!
//! - **Determinism enables thorough testing**: nothing happens unless a caller does it
//! - **Observable side effects**: every synthetic event lands in a per-document journal
//! - **Non-owning references**: removed nodes stay in the arena so stale
//!   [`NodeRef`](core_types::NodeRef)s can be detected instead of dangling
//!
//! ## What is modelled
//!
//! - Elements, text nodes and shadow roots (isolated rendering subtrees)
//! - Nested same-origin documents behind frame elements
//! - Form control values and selection ranges, including the control types
//!   that refuse selection introspection
//! - A document selection for rich-text editing
//! - Listener tables, mutation observers and a viewport
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A layout engine (no geometry beyond the viewport)
//! - A script engine (listeners are recorded, not executed)
//! - A parser

pub mod document;
pub mod event;
pub mod host;
pub mod node;
pub mod range;

pub use document::{Document, MutationRecord, ObserverId, Viewport};
pub use event::{DispatchedEvent, DomEvent, InputType, ListenerKind};
pub use host::Host;
pub use node::{Element, NodeData};
pub use range::{Boundary, Range};

use core_types::{DocumentId, NodeId};
use thiserror::Error;

/// Host DOM error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("Node is not an element: {0}")]
    NotAnElement(NodeId),

    #[error("Node is not a text node: {0}")]
    NotText(NodeId),

    #[error("Selection is not supported on input type '{input_type}'")]
    SelectionUnsupported { input_type: String },

    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(String),

    #[error("Element already hosts a shadow root: {0}")]
    ShadowRootExists(NodeId),

    #[error("Node is not a frame element: {0}")]
    NotAFrame(NodeId),

    #[error("Offset {offset} out of range for {node}")]
    OffsetOutOfRange { node: NodeId, offset: usize },
}

/// Returns the byte index of the `idx`-th character of `s`, or `s.len()`
pub(crate) fn char_to_byte(s: &str, idx: usize) -> usize {
    s.char_indices().nth(idx).map(|(b, _)| b).unwrap_or(s.len())
}
