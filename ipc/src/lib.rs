//! # Inter-Context Communication
//!
//! This crate defines the messages exchanged between the top document's
//! script context, nested same-origin contexts and the toolbar popup.
//!
//! ## Philosophy
//!
//! - **Messages, not shared state**: contexts only talk through envelopes
//! - **Typed, not stringly-typed**: every payload is a closed [`RelayMessage`]
//! - **Fire-and-forget**: there is no response channel and no acknowledgement
//! - **Versionable**: envelopes carry a schema version checked on receipt
//!
//! ## Architecture
//!
//! An envelope holds:
//! - Routing information (destination endpoint, optional source context)
//! - The action name and schema version
//! - A JSON payload
//!
//! The [`MessageBus`] is the in-process transport: at-least-once,
//! unordered, and able to duplicate or reorder pending envelopes on
//! request so receivers can be tested against the real bus guarantees.

pub mod bus;
pub mod message;
pub mod relay;

pub use bus::{MessageBus, RelayTransport};
pub use message::{
    Compatibility, Endpoint, MessageEnvelope, MessageId, MessagePayload, SchemaMismatchError,
    SchemaVersion, VersionPolicy,
};
pub use relay::{RelayMessage, RELAY_ACTION, RELAY_SCHEMA_VERSION, RELAY_VERSION_POLICY};
