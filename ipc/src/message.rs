//! Message types and envelope structure

use core_types::{ContextId, DocumentId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Msg({})", self.0)
    }
}

/// Where an envelope is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// The top document's context
    Top,
    /// One nested context
    Nested(DocumentId),
    /// Every nested context
    AllNested,
}

impl Endpoint {
    /// Whether a context receives envelopes addressed here
    pub fn accepts(&self, context: ContextId) -> bool {
        match (self, context) {
            (Endpoint::Top, ContextId::Top) => true,
            (Endpoint::Nested(doc), ContextId::Nested(other)) => *doc == other,
            (Endpoint::AllNested, ContextId::Nested(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Top => write!(f, "top"),
            Endpoint::Nested(doc) => write!(f, "nested({})", doc),
            Endpoint::AllNested => write!(f, "all-nested"),
        }
    }
}

/// Schema version for message payload
///
/// This enables backward-compatible evolution of message formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version (breaking changes)
    pub major: u32,
    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Same major version = compatible
    pub fn is_compatible_with(&self, other: &SchemaVersion) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

/// Compatibility result for version checking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    /// Sender version is too old, upgrade required
    UpgradeRequired,
    /// Newer than anything this receiver understands
    Unsupported,
}

/// Which schema versions a receiver accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionPolicy {
    current: SchemaVersion,
    min_major: u32,
}

impl VersionPolicy {
    pub const fn current(major: u32, minor: u32) -> Self {
        Self {
            current: SchemaVersion::new(major, minor),
            min_major: major,
        }
    }

    /// Sets the minimum supported major version
    pub const fn with_min_major(mut self, min_major: u32) -> Self {
        self.min_major = min_major;
        self
    }

    pub fn check_compatibility(&self, incoming: &SchemaVersion) -> Compatibility {
        if incoming.major > self.current.major {
            return Compatibility::Unsupported;
        }
        if incoming.major < self.min_major {
            return Compatibility::UpgradeRequired;
        }
        Compatibility::Compatible
    }

    pub fn current_version(&self) -> SchemaVersion {
        self.current
    }

    pub fn min_version(&self) -> SchemaVersion {
        SchemaVersion::new(self.min_major, 0)
    }

    /// Checks an envelope, describing the mismatch if it is rejected
    pub fn verify(&self, envelope: &MessageEnvelope) -> Result<(), SchemaMismatchError> {
        match self.check_compatibility(&envelope.schema_version) {
            Compatibility::Compatible => Ok(()),
            Compatibility::UpgradeRequired => Err(SchemaMismatchError::UpgradeRequired {
                endpoint: envelope.destination,
                expected_min: self.min_version(),
                received: envelope.schema_version,
            }),
            Compatibility::Unsupported => Err(SchemaMismatchError::Unsupported {
                endpoint: envelope.destination,
                supported_range: (self.min_version(), self.current),
                received: envelope.schema_version,
            }),
        }
    }
}

/// Error when schema versions don't match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaMismatchError {
    UpgradeRequired {
        endpoint: Endpoint,
        expected_min: SchemaVersion,
        received: SchemaVersion,
    },
    Unsupported {
        endpoint: Endpoint,
        supported_range: (SchemaVersion, SchemaVersion),
        received: SchemaVersion,
    },
}

impl fmt::Display for SchemaMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaMismatchError::UpgradeRequired {
                endpoint,
                expected_min,
                received,
            } => write!(
                f,
                "Schema version too old for {}: received {}, expected at least {}",
                endpoint, received, expected_min
            ),
            SchemaMismatchError::Unsupported {
                endpoint,
                supported_range,
                received,
            } => write!(
                f,
                "Schema version not supported by {}: received {}, supported range {}-{}",
                endpoint, received, supported_range.0, supported_range.1
            ),
        }
    }
}

impl std::error::Error for SchemaMismatchError {}

/// Message envelope containing routing and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub id: MessageId,
    pub destination: Endpoint,
    /// Sending context; `None` for the toolbar popup
    pub source: Option<ContextId>,
    pub action: String,
    pub schema_version: SchemaVersion,
    pub payload: MessagePayload,
}

impl MessageEnvelope {
    pub fn new(
        destination: Endpoint,
        action: String,
        schema_version: SchemaVersion,
        payload: MessagePayload,
    ) -> Self {
        Self {
            id: MessageId::new(),
            destination,
            source: None,
            action,
            schema_version,
            payload,
        }
    }

    /// Sets the sending context
    pub fn with_source(mut self, source: ContextId) -> Self {
        self.source = Some(source);
        self
    }
}

/// Type-erased message payload (JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    data: Vec<u8>,
}

impl MessagePayload {
    /// Creates a new payload from serializable data
    pub fn new<T: Serialize>(data: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(data)?;
        Ok(Self { data: json })
    }

    /// Wraps raw bytes received from a transport
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Deserializes the payload into a specific type
    pub fn deserialize<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
