//! In-process message bus

use crate::MessageEnvelope;
use std::collections::VecDeque;

/// Transport a context posts envelopes into
pub trait RelayTransport {
    /// Posts an envelope; delivery happens later, at least once, unordered
    fn post(&mut self, envelope: MessageEnvelope);
}

/// Queue-backed bus shared by every context of one page
///
/// Envelopes are delivered when the owner drains the queue. Tests can
/// duplicate or reverse pending envelopes to exercise the at-least-once,
/// unordered guarantees receivers must tolerate.
#[derive(Debug, Default)]
pub struct MessageBus {
    pending: VecDeque<MessageEnvelope>,
    posted: u64,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every pending envelope, oldest first
    pub fn drain(&mut self) -> Vec<MessageEnvelope> {
        self.pending.drain(..).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total envelopes ever posted
    pub fn posted(&self) -> u64 {
        self.posted
    }

    /// Queues a second copy of every pending envelope
    pub fn duplicate_pending(&mut self) {
        let copies: Vec<MessageEnvelope> = self.pending.iter().cloned().collect();
        self.pending.extend(copies);
    }

    /// Reverses delivery order of pending envelopes
    pub fn reverse_pending(&mut self) {
        self.pending.make_contiguous().reverse();
    }
}

impl RelayTransport for MessageBus {
    fn post(&mut self, envelope: MessageEnvelope) {
        self.posted += 1;
        self.pending.push_back(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelayMessage;

    fn envelope(is_open: bool) -> MessageEnvelope {
        RelayMessage::StateBroadcast { is_open }
            .into_envelope(None)
            .unwrap()
    }

    #[test]
    fn test_post_and_drain() {
        let mut bus = MessageBus::new();
        bus.post(envelope(true));
        bus.post(envelope(false));
        assert_eq!(bus.pending_len(), 2);

        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert!(bus.is_idle());
        assert_eq!(bus.posted(), 2);
    }

    #[test]
    fn test_duplicate_and_reverse() {
        let mut bus = MessageBus::new();
        let first = envelope(true);
        let first_id = first.id;
        bus.post(first);
        bus.post(envelope(false));

        bus.duplicate_pending();
        assert_eq!(bus.pending_len(), 4);

        bus.reverse_pending();
        let drained = bus.drain();
        assert_eq!(drained.last().map(|e| e.id), Some(first_id));
    }
}
