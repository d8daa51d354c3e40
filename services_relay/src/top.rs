//! Top-context endpoint

use crate::{RelayError, SeenWindow, ELEMENT_ID_ATTR, FRAME_ID_ATTR};
use core_types::{ContextId, DocumentId, FrameHandle, FrameId, NodeRef};
use host_dom::Host;
use input_types::KeyAction;
use ipc::{MessageEnvelope, RelayMessage, RelayTransport, RELAY_ACTION, RELAY_VERSION_POLICY};
use std::collections::BTreeMap;

/// What the top context must do for a received message
#[derive(Debug, Clone, PartialEq)]
pub enum TopCommand {
    /// Focus a nested target and open the keyboard
    Open {
        target: NodeRef,
        handle: FrameHandle,
        pos_x: f64,
        pos_y: f64,
        force: bool,
    },
    /// Apply a key to the nested target last opened from this frame
    Key {
        target: NodeRef,
        handle: FrameHandle,
        key: KeyAction,
        skip_refocus: bool,
    },
    /// Start the blur grace delay for the frame's target
    Blur { frame_id: FrameId },
    /// Focus the address-style input
    OpenUrlBar,
}

/// A frame whose open has been resolved
#[derive(Debug, Clone)]
struct ResolvedFrame {
    handle: FrameHandle,
    /// Document the frame hosts
    document: DocumentId,
}

/// Relay endpoint of the top document
#[derive(Debug, Clone, Default)]
pub struct TopRelay {
    resolved: BTreeMap<FrameId, ResolvedFrame>,
    seen: SeenWindow,
}

impl TopRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle most recently resolved for `frame_id` by an open
    pub fn resolved(&self, frame_id: &FrameId) -> Option<&FrameHandle> {
        self.resolved.get(frame_id).map(|frame| &frame.handle)
    }

    /// Forgets every frame hosting `document`, once that document was
    /// unloaded; returns how many were dropped
    pub fn forget_document(&mut self, document: DocumentId) -> usize {
        let before = self.resolved.len();
        self.resolved.retain(|_, frame| frame.document != document);
        before - self.resolved.len()
    }

    /// Finds the element a handle names: the frame element, in the top
    /// document or any document nested below it, then the element inside
    /// its content document
    pub fn resolve(&self, host: &Host, handle: &FrameHandle) -> Result<NodeRef, RelayError> {
        let frame = find_frame(host, &handle.frame_id)
            .ok_or_else(|| RelayError::FrameNotFound(handle.frame_id.clone()))?;
        let content = host
            .content_document(frame)
            .ok_or_else(|| RelayError::NoContentDocument(handle.frame_id.clone()))?;
        let doc = host.require(content)?;
        let element = doc
            .find_by_attribute(ELEMENT_ID_ATTR, handle.element_id.as_str())
            .ok_or_else(|| RelayError::ElementNotFound {
                frame_id: handle.frame_id.clone(),
                element_id: handle.element_id.clone(),
            })?;
        Ok(doc.node_ref(element))
    }

    /// Decodes and resolves an envelope addressed to the top context
    ///
    /// Duplicates of an already handled envelope yield `Ok(None)`.
    pub fn receive(
        &mut self,
        host: &Host,
        envelope: &MessageEnvelope,
    ) -> Result<Option<TopCommand>, RelayError> {
        if !envelope.destination.accepts(ContextId::Top) {
            return Err(RelayError::NotAddressed(envelope.destination));
        }
        if envelope.action != RELAY_ACTION {
            return Err(RelayError::UnexpectedAction(envelope.action.clone()));
        }
        RELAY_VERSION_POLICY.verify(envelope)?;
        let message = RelayMessage::from_envelope(envelope)?;
        if !self.seen.insert(envelope.id) {
            tracing::trace!(target: "relay", message = message.name(), "duplicate envelope");
            return Ok(None);
        }

        let command = match message {
            RelayMessage::OpenFromNested {
                frame_handle,
                pos_x,
                pos_y,
                force,
            } => {
                let target = self.resolve(host, &frame_handle)?;
                check_source(envelope, &frame_handle.frame_id, target.document)?;
                self.resolved.insert(
                    frame_handle.frame_id.clone(),
                    ResolvedFrame {
                        handle: frame_handle.clone(),
                        document: target.document,
                    },
                );
                TopCommand::Open {
                    target,
                    handle: frame_handle,
                    pos_x,
                    pos_y,
                    force,
                }
            }
            RelayMessage::KeyFromNested {
                frame_id,
                key,
                skip_refocus,
            } => {
                let handle = self
                    .resolved
                    .get(&frame_id)
                    .map(|frame| frame.handle.clone())
                    .ok_or(RelayError::UnknownFrame(frame_id))?;
                let target = self.resolve(host, &handle)?;
                check_source(envelope, &handle.frame_id, target.document)?;
                TopCommand::Key {
                    target,
                    handle,
                    key,
                    skip_refocus,
                }
            }
            RelayMessage::BlurFromNested { frame_id } => TopCommand::Blur { frame_id },
            RelayMessage::OpenUrlBarRequest => TopCommand::OpenUrlBar,
            RelayMessage::StateBroadcast { .. } => {
                return Err(RelayError::WrongDirection("state_broadcast"))
            }
        };
        Ok(Some(command))
    }

    /// Like [`receive`](Self::receive), logging and dropping failures
    pub fn handle(&mut self, host: &Host, envelope: &MessageEnvelope) -> Option<TopCommand> {
        match self.receive(host, envelope) {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!(
                    target: "relay",
                    source = ?envelope.source,
                    error = %err,
                    "dropped relay message"
                );
                None
            }
        }
    }

    /// Tells every nested context whether the keyboard is open
    pub fn broadcast_state(
        &self,
        transport: &mut impl RelayTransport,
        is_open: bool,
    ) -> Result<(), RelayError> {
        tracing::debug!(target: "relay", is_open, "broadcasting keyboard state");
        transport.post(RelayMessage::StateBroadcast { is_open }.into_envelope(Some(ContextId::Top))?);
        Ok(())
    }
}

/// Connected frame element carrying `frame_id`, searched from the top
/// document down through every nested document
fn find_frame(host: &Host, frame_id: &FrameId) -> Option<NodeRef> {
    std::iter::once(host.top_id())
        .chain(host.nested_documents())
        .filter_map(|id| host.document(id))
        .find_map(|doc| {
            doc.find_by_attribute(FRAME_ID_ATTR, frame_id.as_str())
                .map(|frame| doc.node_ref(frame))
        })
        .filter(|frame| host.is_connected(*frame))
}

/// A message from a nested context must come from the frame's document
fn check_source(
    envelope: &MessageEnvelope,
    frame_id: &FrameId,
    document: DocumentId,
) -> Result<(), RelayError> {
    match envelope.source {
        Some(ContextId::Nested(source)) if source != document => {
            Err(RelayError::SourceMismatch(frame_id.clone()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NestedRelay;
    use core_types::{DocumentId, ElementId, NodeId};
    use ipc::{Endpoint, MessageBus};

    struct Page {
        host: Host,
        nested: NestedRelay,
        input: NodeId,
        doc_id: DocumentId,
    }

    fn page() -> Page {
        let mut host = Host::new();
        let body = host.top().body();
        let iframe = host.top_mut().append_element(body, "iframe", &[]).unwrap();
        let frame = host.top().node_ref(iframe);
        let doc_id = host.create_nested_document(frame).unwrap();
        let doc = host.document_mut(doc_id).unwrap();
        let nested_body = doc.body();
        let input = doc.append_element(nested_body, "input", &[]).unwrap();
        Page {
            host,
            nested: NestedRelay::new(doc_id),
            input,
            doc_id,
        }
    }

    #[test]
    fn test_open_then_key_resolves_target() {
        let mut p = page();
        let mut bus = MessageBus::new();
        let mut top = TopRelay::new();

        p.nested
            .open(&mut p.host, &mut bus, p.input, (1.0, 2.0), false)
            .unwrap();
        p.nested
            .key(&mut p.host, &mut bus, KeyAction::InsertChar('a'), false)
            .unwrap();

        let commands: Vec<TopCommand> = bus
            .drain()
            .iter()
            .filter_map(|e| top.handle(&p.host, e))
            .collect();
        assert_eq!(commands.len(), 2);
        let expected = NodeRef::new(p.doc_id, p.input);
        assert!(matches!(&commands[0], TopCommand::Open { target, force: false, .. } if *target == expected));
        assert!(matches!(&commands[1], TopCommand::Key { target, .. } if *target == expected));
    }

    #[test]
    fn test_key_before_open_is_dropped() {
        let mut p = page();
        let mut bus = MessageBus::new();
        let mut top = TopRelay::new();

        p.nested
            .key(&mut p.host, &mut bus, KeyAction::InsertChar('a'), false)
            .unwrap();
        let envelope = bus.drain().remove(0);
        assert!(matches!(
            top.receive(&p.host, &envelope),
            Err(RelayError::UnknownFrame(_))
        ));
    }

    #[test]
    fn test_reordered_key_is_dropped_then_open_applies() {
        let mut p = page();
        let mut bus = MessageBus::new();
        let mut top = TopRelay::new();

        p.nested
            .open(&mut p.host, &mut bus, p.input, (0.0, 0.0), true)
            .unwrap();
        p.nested
            .key(&mut p.host, &mut bus, KeyAction::Backspace, false)
            .unwrap();
        bus.reverse_pending();

        let commands: Vec<TopCommand> = bus
            .drain()
            .iter()
            .filter_map(|e| top.handle(&p.host, e))
            .collect();
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0], TopCommand::Open { .. }));
    }

    #[test]
    fn test_duplicates_are_skipped() {
        let mut p = page();
        let mut bus = MessageBus::new();
        let mut top = TopRelay::new();

        p.nested
            .open(&mut p.host, &mut bus, p.input, (0.0, 0.0), true)
            .unwrap();
        p.nested
            .key(&mut p.host, &mut bus, KeyAction::InsertChar('x'), false)
            .unwrap();
        bus.duplicate_pending();

        let commands: Vec<TopCommand> = bus
            .drain()
            .iter()
            .filter_map(|e| top.handle(&p.host, e))
            .collect();
        assert_eq!(commands.len(), 2);
    }

    #[test]
    fn test_unknown_element_fails_resolution() {
        let mut p = page();
        let mut top = TopRelay::new();
        let frame_id = p.nested.ensure_frame_id(&mut p.host).unwrap();
        let handle = FrameHandle::new(frame_id, ElementId::from_string("missing"));
        assert!(matches!(
            top.resolve(&p.host, &handle),
            Err(RelayError::ElementNotFound { .. })
        ));

        let envelope = RelayMessage::OpenFromNested {
            frame_handle: handle,
            pos_x: 0.0,
            pos_y: 0.0,
            force: true,
        }
        .into_envelope(Some(ContextId::Nested(p.doc_id)))
        .unwrap();
        assert!(top.handle(&p.host, &envelope).is_none());
    }

    #[test]
    fn test_removed_target_fails_resolution() {
        let mut p = page();
        let handle = p.nested.ensure_handle(&mut p.host, p.input).unwrap();
        p.host
            .document_mut(p.doc_id)
            .unwrap()
            .remove(p.input)
            .unwrap();
        let top = TopRelay::new();
        assert!(top.resolve(&p.host, &handle).is_err());
    }

    #[test]
    fn test_source_must_match_frame() {
        let mut p = page();
        let mut top = TopRelay::new();
        let handle = p.nested.ensure_handle(&mut p.host, p.input).unwrap();
        let envelope = RelayMessage::OpenFromNested {
            frame_handle: handle,
            pos_x: 0.0,
            pos_y: 0.0,
            force: true,
        }
        .into_envelope(Some(ContextId::Nested(DocumentId::from_raw(99))))
        .unwrap();
        assert!(matches!(
            top.receive(&p.host, &envelope),
            Err(RelayError::SourceMismatch(_))
        ));
    }

    #[test]
    fn test_frame_inside_nested_document_resolves() {
        let mut p = page();
        let middle_body = p.host.document(p.doc_id).unwrap().body();
        let inner_frame = p
            .host
            .document_mut(p.doc_id)
            .unwrap()
            .append_element(middle_body, "iframe", &[])
            .unwrap();
        let inner_doc = p
            .host
            .create_nested_document(NodeRef::new(p.doc_id, inner_frame))
            .unwrap();
        let inner_body = p.host.document(inner_doc).unwrap().body();
        let input = p
            .host
            .document_mut(inner_doc)
            .unwrap()
            .append_element(inner_body, "input", &[])
            .unwrap();

        let inner = NestedRelay::new(inner_doc);
        let mut bus = MessageBus::new();
        let mut top = TopRelay::new();
        inner
            .open(&mut p.host, &mut bus, input, (0.0, 0.0), true)
            .unwrap();
        inner
            .key(&mut p.host, &mut bus, KeyAction::InsertChar('z'), false)
            .unwrap();

        // the id lands on the frame element in the middle document
        let middle = p.host.document(p.doc_id).unwrap();
        assert!(middle.attribute(inner_frame, FRAME_ID_ATTR).is_some());

        let commands: Vec<TopCommand> = bus
            .drain()
            .iter()
            .filter_map(|e| top.handle(&p.host, e))
            .collect();
        let expected = NodeRef::new(inner_doc, input);
        assert_eq!(commands.len(), 2);
        assert!(matches!(&commands[0], TopCommand::Open { target, .. } if *target == expected));
        assert!(matches!(&commands[1], TopCommand::Key { target, .. } if *target == expected));
    }

    #[test]
    fn test_detached_frame_does_not_resolve() {
        let mut p = page();
        let handle = p.nested.ensure_handle(&mut p.host, p.input).unwrap();
        let frame = p.host.document(p.doc_id).unwrap().frame_element().unwrap();
        p.host.top_mut().remove(frame.node).unwrap();
        assert!(matches!(
            TopRelay::new().resolve(&p.host, &handle),
            Err(RelayError::FrameNotFound(_))
        ));
    }

    #[test]
    fn test_key_from_other_document_is_dropped() {
        let mut p = page();
        let mut bus = MessageBus::new();
        let mut top = TopRelay::new();
        p.nested
            .open(&mut p.host, &mut bus, p.input, (0.0, 0.0), true)
            .unwrap();
        let open = bus.drain().remove(0);
        assert!(top.handle(&p.host, &open).is_some());

        let frame_id = p.nested.ensure_frame_id(&mut p.host).unwrap();
        let envelope = RelayMessage::KeyFromNested {
            frame_id,
            key: KeyAction::InsertChar('a'),
            skip_refocus: false,
        }
        .into_envelope(Some(ContextId::Nested(DocumentId::from_raw(99))))
        .unwrap();
        assert!(matches!(
            top.receive(&p.host, &envelope),
            Err(RelayError::SourceMismatch(_))
        ));
    }

    #[test]
    fn test_forget_document_drops_resolved_frame() {
        let mut p = page();
        let mut bus = MessageBus::new();
        let mut top = TopRelay::new();
        let handle = p
            .nested
            .open(&mut p.host, &mut bus, p.input, (0.0, 0.0), true)
            .unwrap();
        for envelope in bus.drain() {
            top.handle(&p.host, &envelope);
        }
        assert_eq!(top.resolved(&handle.frame_id), Some(&handle));

        assert_eq!(top.forget_document(DocumentId::from_raw(99)), 0);
        assert_eq!(top.forget_document(p.doc_id), 1);
        assert_eq!(top.resolved(&handle.frame_id), None);
    }

    #[test]
    fn test_broadcast_reaches_nested_only() {
        let top = TopRelay::new();
        let mut bus = MessageBus::new();
        top.broadcast_state(&mut bus, true).unwrap();
        let envelope = bus.drain().remove(0);
        assert_eq!(envelope.destination, Endpoint::AllNested);

        let mut top = TopRelay::new();
        let p = page();
        assert!(matches!(
            top.receive(&p.host, &envelope),
            Err(RelayError::NotAddressed(_))
        ));
    }
}
