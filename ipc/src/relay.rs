//! Typed relay messages between script contexts.
//!
//! This module provides the closed message set that lets a nested
//! same-origin document borrow the keyboard living in the top document.

use crate::{Endpoint, MessageEnvelope, MessagePayload, SchemaVersion, VersionPolicy};
use core_types::{ContextId, FrameHandle, FrameId};
use input_types::KeyAction;
use serde::{Deserialize, Serialize};

/// Relay schema version (v1.0).
pub const RELAY_SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(1, 0);

/// Versions accepted on receipt.
pub const RELAY_VERSION_POLICY: VersionPolicy = VersionPolicy::current(1, 0);

/// Envelope action for relay messages.
pub const RELAY_ACTION: &str = "vkbd.relay";

/// Relay message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Nested → top: a target in my document got focus; open/move the keyboard
    OpenFromNested {
        frame_handle: FrameHandle,
        pos_x: f64,
        pos_y: f64,
        /// Open even if the keyboard is already open (focus rather than click)
        force: bool,
    },
    /// Nested → top: apply a key to the target previously opened from this frame
    KeyFromNested {
        frame_id: FrameId,
        key: KeyAction,
        skip_refocus: bool,
    },
    /// Nested → top: the nested target lost focus
    BlurFromNested { frame_id: FrameId },
    /// Top → all nested: keyboard visibility, for each context's open affordance
    StateBroadcast { is_open: bool },
    /// Popup → top: focus the address-style input
    OpenUrlBarRequest,
}

impl RelayMessage {
    /// Where this message is addressed by protocol
    pub fn destination(&self) -> Endpoint {
        match self {
            RelayMessage::StateBroadcast { .. } => Endpoint::AllNested,
            RelayMessage::OpenFromNested { .. }
            | RelayMessage::KeyFromNested { .. }
            | RelayMessage::BlurFromNested { .. }
            | RelayMessage::OpenUrlBarRequest => Endpoint::Top,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            RelayMessage::OpenFromNested { .. } => "open_from_nested",
            RelayMessage::KeyFromNested { .. } => "key_from_nested",
            RelayMessage::BlurFromNested { .. } => "blur_from_nested",
            RelayMessage::StateBroadcast { .. } => "state_broadcast",
            RelayMessage::OpenUrlBarRequest => "open_url_bar_request",
        }
    }

    /// Wraps this message in an envelope addressed per protocol
    pub fn into_envelope(
        self,
        source: Option<ContextId>,
    ) -> Result<MessageEnvelope, serde_json::Error> {
        let payload = MessagePayload::new(&self)?;
        let envelope = MessageEnvelope::new(
            self.destination(),
            RELAY_ACTION.to_string(),
            RELAY_SCHEMA_VERSION,
            payload,
        );
        Ok(match source {
            Some(source) => envelope.with_source(source),
            None => envelope,
        })
    }

    /// Decodes the payload of a relay envelope
    pub fn from_envelope(envelope: &MessageEnvelope) -> Result<Self, serde_json::Error> {
        envelope.payload.deserialize()
    }
}
