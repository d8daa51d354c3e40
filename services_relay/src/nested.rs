//! Nested-context endpoint

use crate::{RelayError, SeenWindow, ELEMENT_ID_ATTR, FRAME_ID_ATTR};
use core_types::{ContextId, DocumentId, ElementId, FrameHandle, FrameId, NodeId};
use host_dom::Host;
use input_types::KeyAction;
use ipc::{MessageEnvelope, RelayMessage, RelayTransport, RELAY_ACTION, RELAY_VERSION_POLICY};

/// Relay endpoint of one nested document
#[derive(Debug, Clone)]
pub struct NestedRelay {
    document: DocumentId,
    keyboard_open: bool,
    show_open_button: bool,
    seen: SeenWindow,
}

impl NestedRelay {
    pub fn new(document: DocumentId) -> Self {
        Self {
            document,
            keyboard_open: false,
            show_open_button: true,
            seen: SeenWindow::default(),
        }
    }

    pub fn document(&self) -> DocumentId {
        self.document
    }

    fn context(&self) -> ContextId {
        ContextId::Nested(self.document)
    }

    /// Keyboard visibility as last broadcast by the top context
    pub fn keyboard_open(&self) -> bool {
        self.keyboard_open
    }

    /// Enables the in-frame button that opens the keyboard
    pub fn set_show_open_button(&mut self, show: bool) {
        self.show_open_button = show;
    }

    /// Whether the in-frame open button is shown: enabled, and the
    /// keyboard is closed
    pub fn open_button_visible(&self) -> bool {
        self.show_open_button && !self.keyboard_open
    }

    /// Id of the frame element hosting this document, assigned on first use
    pub fn ensure_frame_id(&self, host: &mut Host) -> Result<FrameId, RelayError> {
        let frame = host
            .require(self.document)?
            .frame_element()
            .ok_or(RelayError::NotNested)?;
        let parent = host.require_mut(frame.document)?;
        if let Some(existing) = parent.attribute(frame.node, FRAME_ID_ATTR) {
            return Ok(FrameId::from_string(existing));
        }
        let id = FrameId::generate();
        parent.set_attribute(frame.node, FRAME_ID_ATTR, id.as_str())?;
        Ok(id)
    }

    /// Frame handle of `target`, assigning ids lazily
    pub fn ensure_handle(
        &self,
        host: &mut Host,
        target: NodeId,
    ) -> Result<FrameHandle, RelayError> {
        let frame_id = self.ensure_frame_id(host)?;
        let doc = host.require_mut(self.document)?;
        let element_id = match doc.attribute(target, ELEMENT_ID_ATTR) {
            Some(existing) => ElementId::from_string(existing),
            None => {
                let id = ElementId::generate();
                doc.set_attribute(target, ELEMENT_ID_ATTR, id.as_str())?;
                id
            }
        };
        Ok(FrameHandle::new(frame_id, element_id))
    }

    /// A target in this document got focus (`force`) or a click
    pub fn open(
        &self,
        host: &mut Host,
        transport: &mut impl RelayTransport,
        target: NodeId,
        pos: (f64, f64),
        force: bool,
    ) -> Result<FrameHandle, RelayError> {
        let frame_handle = self.ensure_handle(host, target)?;
        let message = RelayMessage::OpenFromNested {
            frame_handle: frame_handle.clone(),
            pos_x: pos.0,
            pos_y: pos.1,
            force,
        };
        self.post(transport, message)?;
        Ok(frame_handle)
    }

    /// Asks the top context to apply `key` to this frame's target
    pub fn key(
        &self,
        host: &mut Host,
        transport: &mut impl RelayTransport,
        key: KeyAction,
        skip_refocus: bool,
    ) -> Result<(), RelayError> {
        let frame_id = self.ensure_frame_id(host)?;
        self.post(
            transport,
            RelayMessage::KeyFromNested {
                frame_id,
                key,
                skip_refocus,
            },
        )
    }

    /// The focused target in this document lost focus
    pub fn blur(
        &self,
        host: &mut Host,
        transport: &mut impl RelayTransport,
    ) -> Result<(), RelayError> {
        let frame_id = self.ensure_frame_id(host)?;
        self.post(transport, RelayMessage::BlurFromNested { frame_id })
    }

    fn post(
        &self,
        transport: &mut impl RelayTransport,
        message: RelayMessage,
    ) -> Result<(), RelayError> {
        tracing::debug!(
            target: "relay",
            document = %self.document,
            message = message.name(),
            "posting to top"
        );
        transport.post(message.into_envelope(Some(self.context()))?);
        Ok(())
    }

    /// Handles an envelope delivered to this context
    ///
    /// Only state broadcasts are meaningful here; returns whether the
    /// visibility changed.
    pub fn receive(&mut self, envelope: &MessageEnvelope) -> Result<bool, RelayError> {
        if !envelope.destination.accepts(self.context()) {
            return Err(RelayError::NotAddressed(envelope.destination));
        }
        if envelope.action != RELAY_ACTION {
            return Err(RelayError::UnexpectedAction(envelope.action.clone()));
        }
        RELAY_VERSION_POLICY.verify(envelope)?;
        if !self.seen.insert(envelope.id) {
            return Ok(false);
        }

        match RelayMessage::from_envelope(envelope)? {
            RelayMessage::StateBroadcast { is_open } => {
                let changed = self.keyboard_open != is_open;
                self.keyboard_open = is_open;
                Ok(changed)
            }
            other => Err(RelayError::WrongDirection(other.name())),
        }
    }

    /// Like [`receive`](Self::receive), logging and dropping failures
    pub fn handle(&mut self, envelope: &MessageEnvelope) -> bool {
        match self.receive(envelope) {
            Ok(changed) => changed,
            Err(err) => {
                tracing::warn!(
                    target: "relay",
                    document = %self.document,
                    error = %err,
                    "dropped relay message"
                );
                false
            }
        }
    }
}
