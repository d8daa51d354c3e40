//! # Cross-Context Relay
//!
//! Lets a target inside a nested same-origin document borrow the keyboard
//! that lives in the top document.
//!
//! ## Philosophy
//!
//! - **Fire-and-forget**: nothing is acknowledged, nothing is retried
//! - **Idempotent receivers**: the transport is at-least-once and unordered,
//!   so duplicate envelopes are recognised and skipped
//! - **Open before key**: a key for a frame is applied only after an open
//!   from that frame resolved its handle
//! - **Drop, don't fail**: every resolution failure is logged and dropped
//!
//! ## Endpoints
//!
//! - [`NestedRelay`] runs in each nested context and posts open, key and
//!   blur messages
//! - [`TopRelay`] runs in the top context, resolves frame handles and turns
//!   messages into [`TopCommand`]s
//! - [`request_url_bar`] is what the toolbar popup sends

pub mod nested;
pub mod top;

pub use nested::NestedRelay;
pub use top::{TopCommand, TopRelay};

use core_types::{ElementId, FrameId};
use host_dom::DomError;
use ipc::{Endpoint, RelayMessage, RelayTransport, SchemaMismatchError};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

/// Attribute carrying a frame element's id in the document that holds it
pub const FRAME_ID_ATTR: &str = "data-vk-frame-id";

/// Attribute carrying a target's id inside its nested document
pub const ELEMENT_ID_ATTR: &str = "data-vk-element-id";

/// How many recent message ids each receiver remembers
const SEEN_WINDOW: usize = 256;

/// Relay error types
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaMismatchError),

    #[error("Unexpected action: {0}")]
    UnexpectedAction(String),

    #[error("Message not addressed to {0}")]
    NotAddressed(Endpoint),

    #[error("Message {0} is not valid at this endpoint")]
    WrongDirection(&'static str),

    #[error("Key for frame {0} arrived before any open")]
    UnknownFrame(FrameId),

    #[error("No frame element carries id {0}")]
    FrameNotFound(FrameId),

    #[error("Frame {0} has no same-origin document")]
    NoContentDocument(FrameId),

    #[error("No element {element_id} in frame {frame_id}")]
    ElementNotFound {
        frame_id: FrameId,
        element_id: ElementId,
    },

    #[error("Frame {0} does not host the sending document")]
    SourceMismatch(FrameId),

    #[error("Document is not nested")]
    NotNested,

    #[error("Host DOM error: {0}")]
    Dom(#[from] DomError),
}

/// Sends a toolbar popup request to focus the address-style input
pub fn request_url_bar(transport: &mut impl RelayTransport) -> Result<(), RelayError> {
    transport.post(RelayMessage::OpenUrlBarRequest.into_envelope(None)?);
    Ok(())
}

/// Recently seen message ids, oldest evicted first
#[derive(Debug, Clone, Default)]
struct SeenWindow {
    order: VecDeque<ipc::MessageId>,
    ids: HashSet<ipc::MessageId>,
}

impl SeenWindow {
    /// Returns `false` if `id` was already seen
    fn insert(&mut self, id: ipc::MessageId) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > SEEN_WINDOW {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
        true
    }
}
