//! # Cancellable Timers
//!
//! Deterministic millisecond timers for the coordinator's delayed actions.
//!
//! ## Philosophy
//!
//! **Determinism enables thorough testing.**
//!
//! Time only moves when the owner advances it. Each purpose has at most one
//! pending deadline: scheduling a purpose again cancels the earlier timer.
//!
//! # Examples
//!
//! ```
//! use services_focus_manager::timer::{TimerPurpose, TimerSet};
//!
//! let mut timers = TimerSet::new();
//! timers.schedule(TimerPurpose::BlurGrace, 500);
//! assert!(timers.advance(499).is_empty());
//! assert_eq!(timers.advance(1), vec![TimerPurpose::BlurGrace]);
//! assert_eq!(timers.now(), 500);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a pending timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimerPurpose {
    /// Completes a blur unless focus comes back first
    BlurGrace,
    /// Closes a dismissed keyboard overlay
    OverlayAutoClose,
}

/// Set of cancellable timers on a virtual clock
#[derive(Debug, Clone, Default)]
pub struct TimerSet {
    now_ms: u64,
    pending: BTreeMap<TimerPurpose, u64>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Schedules `purpose` to fire `delay_ms` from now, replacing any
    /// pending timer for the same purpose
    pub fn schedule(&mut self, purpose: TimerPurpose, delay_ms: u64) {
        let deadline = self.now_ms.saturating_add(delay_ms);
        if self.pending.insert(purpose, deadline).is_some() {
            tracing::trace!(target: "focus", ?purpose, "rescheduled timer");
        }
    }

    /// Cancels a pending timer; returns `false` if none was pending
    pub fn cancel(&mut self, purpose: TimerPurpose) -> bool {
        self.pending.remove(&purpose).is_some()
    }

    pub fn is_pending(&self, purpose: TimerPurpose) -> bool {
        self.pending.contains_key(&purpose)
    }

    pub fn deadline(&self, purpose: TimerPurpose) -> Option<u64> {
        self.pending.get(&purpose).copied()
    }

    /// Removes the earliest timer due at or before `until` and moves the
    /// clock to its deadline
    ///
    /// Callers loop on this so a fired timer can schedule another one that
    /// is still due inside the same window.
    pub fn pop_due(&mut self, until: u64) -> Option<TimerPurpose> {
        let (purpose, deadline) = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= until)
            .min_by_key(|(purpose, deadline)| (**deadline, **purpose))
            .map(|(p, d)| (*p, *d))?;
        self.pending.remove(&purpose);
        self.now_ms = self.now_ms.max(deadline);
        Some(purpose)
    }

    /// Moves the clock forward to `until` without firing anything
    pub fn settle(&mut self, until: u64) {
        self.now_ms = self.now_ms.max(until);
    }

    /// Advances by `delta_ms`, returning fired purposes in deadline order
    pub fn advance(&mut self, delta_ms: u64) -> Vec<TimerPurpose> {
        let until = self.now_ms.saturating_add(delta_ms);
        let mut fired = Vec::new();
        while let Some(purpose) = self.pop_due(until) {
            fired.push(purpose);
        }
        self.settle(until);
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reschedule_replaces_deadline() {
        let mut timers = TimerSet::new();
        timers.schedule(TimerPurpose::BlurGrace, 100);
        timers.advance(50);
        timers.schedule(TimerPurpose::BlurGrace, 100);
        assert_eq!(timers.deadline(TimerPurpose::BlurGrace), Some(150));
        assert!(timers.advance(99).is_empty());
        assert_eq!(timers.advance(1), vec![TimerPurpose::BlurGrace]);
    }

    #[test]
    fn test_cancel() {
        let mut timers = TimerSet::new();
        timers.schedule(TimerPurpose::OverlayAutoClose, 10);
        assert!(timers.cancel(TimerPurpose::OverlayAutoClose));
        assert!(!timers.cancel(TimerPurpose::OverlayAutoClose));
        assert!(timers.advance(100).is_empty());
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let mut timers = TimerSet::new();
        timers.schedule(TimerPurpose::BlurGrace, 300);
        timers.schedule(TimerPurpose::OverlayAutoClose, 200);
        assert_eq!(
            timers.advance(1000),
            vec![TimerPurpose::OverlayAutoClose, TimerPurpose::BlurGrace]
        );
        assert_eq!(timers.now(), 1000);
    }

    #[test]
    fn test_pop_due_moves_clock_to_deadline() {
        let mut timers = TimerSet::new();
        timers.schedule(TimerPurpose::BlurGrace, 40);
        assert_eq!(timers.pop_due(100), Some(TimerPurpose::BlurGrace));
        assert_eq!(timers.now(), 40);
        assert_eq!(timers.pop_due(100), None);
    }
}
