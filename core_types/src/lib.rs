//! # Core Types
//!
//! This crate defines the identifiers shared by every vkbd component.
//!
//! ## Philosophy
//!
//! Core types are designed with these principles:
//! - **Explicit over implicit**: A node is always addressed together with its document.
//! - **Type safety first**: Frame ids and element ids cannot be confused.
//! - **Stable across contexts**: Cross-context addresses are plain strings.
//!
//! ## Key Types
//!
//! - [`DocumentId`] / [`NodeId`] / [`NodeRef`]: addresses inside the host tree
//! - [`FrameId`] / [`ElementId`] / [`FrameHandle`]: cross-context addresses
//! - [`ContextId`]: which script context a component runs in

pub mod ids;

pub use ids::{ContextId, DocumentId, ElementId, FrameHandle, FrameId, NodeId, NodeRef};
