//! # Focus Coordinator
//!
//! Single source of truth for which editable target is focused, in which
//! document, and whether the keyboard should be open.
//!
//! ## Philosophy
//!
//! - **One focus**: at most one target is focused system-wide; focusing a
//!   new target completes the previous one's blur first
//! - **Grace, not flicker**: a blur only completes after a cancellable delay
//! - **Explicit transitions**: callers get a [`FocusEntry`] or
//!   [`TimerOutcome`] describing what the keyboard must do next
//! - **Auditable**: every focus change lands in an audit trail
//!
//! ## States
//!
//! ```text
//! Unfocused ──focus/click──▶ FocusedLocal | FocusedRemote
//!     ▲                              │
//!     └──── blur + grace delay ──────┘
//! ```
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A window manager (no z-order)
//! - The keyboard UI (that's the keyboard controller)

pub mod timer;

pub use timer::{TimerPurpose, TimerSet};

use core_types::{FrameHandle, FrameId, NodeRef};
use host_dom::{DomError, DomEvent, Host};
use serde::{Deserialize, Serialize};
use services_binder::{EditableTarget, SWAP_MARKER_ATTR};
use services_settings::KeyboardConfig;

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusPhase {
    Unfocused,
    /// Target lives in the top document
    FocusedLocal,
    /// Target lives in a nested document, reached through a frame handle
    FocusedRemote,
}

/// Where the focused target lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusLocation {
    Local,
    Remote(FrameHandle),
}

/// What the user did to a bound target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusIntent {
    /// Always opens the keyboard
    Focus,
    /// Opens the keyboard only if it is closed
    Click,
}

impl FocusIntent {
    /// Relay `force` flag equivalent
    pub fn from_force(force: bool) -> Self {
        if force {
            FocusIntent::Focus
        } else {
            FocusIntent::Click
        }
    }
}

/// The focused target and what happened to it since it got focus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusState {
    pub target: EditableTarget,
    pub location: FocusLocation,
    /// Whether any mutation happened since focus; decides the change event on blur
    pub changed: bool,
    pub pointer_down_x: f64,
    pub pointer_down_y: f64,
}

/// Instructions produced by entering a focused state
#[derive(Debug, Clone, PartialEq)]
pub struct FocusEntry {
    pub target: EditableTarget,
    pub location: FocusLocation,
    /// The keyboard was closed and must open
    pub open_keyboard: bool,
    /// Document scroll applied so the target stays above the keyboard
    pub scrolled_by: Option<f64>,
}

/// A fired timer the caller has to act on
#[derive(Debug, Clone, PartialEq)]
pub enum TimerOutcome {
    /// Blur completed; the keyboard should close
    Blurred(EditableTarget),
    OverlayAutoClose,
}

/// Focus event for the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FocusEvent {
    Entered {
        node: NodeRef,
        timestamp_ms: u64,
    },
    Switched {
        from: NodeRef,
        to: NodeRef,
        timestamp_ms: u64,
    },
    Blurred {
        node: NodeRef,
        changed: bool,
        timestamp_ms: u64,
    },
    /// Focused node left the tree
    Dropped {
        node: NodeRef,
        timestamp_ms: u64,
    },
}

/// Focus coordinator
pub struct FocusCoordinator {
    config: KeyboardConfig,
    state: Option<FocusState>,
    pointer_down: Option<(NodeRef, f64, f64)>,
    swapped: Option<NodeRef>,
    timers: TimerSet,
    audit_trail: Vec<FocusEvent>,
}

impl FocusCoordinator {
    pub fn new(config: KeyboardConfig) -> Self {
        Self {
            config,
            state: None,
            pointer_down: None,
            swapped: None,
            timers: TimerSet::new(),
            audit_trail: Vec::new(),
        }
    }

    pub fn config(&self) -> &KeyboardConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: KeyboardConfig) {
        self.config = config;
    }

    pub fn phase(&self) -> FocusPhase {
        match self.state.as_ref().map(|s| &s.location) {
            None => FocusPhase::Unfocused,
            Some(FocusLocation::Local) => FocusPhase::FocusedLocal,
            Some(FocusLocation::Remote(_)) => FocusPhase::FocusedRemote,
        }
    }

    pub fn state(&self) -> Option<&FocusState> {
        self.state.as_ref()
    }

    pub fn target(&self) -> Option<&EditableTarget> {
        self.state.as_ref().map(|s| &s.target)
    }

    /// Records pointer-down coordinates on a target, used on its next focus
    pub fn record_pointer_down(&mut self, node: NodeRef, x: f64, y: f64) {
        self.pointer_down = Some((node, x, y));
    }

    /// Handles a focus or click intent on `target`
    ///
    /// Returns `None` when the intent changes nothing: a click on the
    /// already focused target while the keyboard is open.
    pub fn focus(
        &mut self,
        host: &mut Host,
        target: EditableTarget,
        location: FocusLocation,
        intent: FocusIntent,
        keyboard_open: bool,
    ) -> Option<FocusEntry> {
        self.timers.cancel(TimerPurpose::BlurGrace);

        let previous = self.state.take();
        let same = previous
            .as_ref()
            .is_some_and(|s| s.target.node == target.node);
        if intent == FocusIntent::Click && keyboard_open && same {
            self.state = previous;
            return None;
        }

        let now = self.timers.now();
        let mut changed = false;
        let (mut x, mut y) = (0.0, 0.0);
        match previous {
            Some(prev) if same => {
                changed = prev.changed;
                x = prev.pointer_down_x;
                y = prev.pointer_down_y;
            }
            Some(prev) => {
                self.audit_trail.push(FocusEvent::Switched {
                    from: prev.target.node,
                    to: target.node,
                    timestamp_ms: now,
                });
                self.finish_blur(host, prev);
            }
            None => self.audit_trail.push(FocusEvent::Entered {
                node: target.node,
                timestamp_ms: now,
            }),
        }

        if let Some((node, px, py)) = self.pointer_down {
            if node == target.node {
                x = px;
                y = py;
                self.pointer_down = None;
            }
        }

        if !same && target.original_type == "password" && self.config.reveal_password {
            if let Err(err) = self.swap_type(host, target.node) {
                tracing::warn!(target: "focus", node = %target.node, error = %err, "type swap failed");
            }
        }

        tracing::info!(
            target: "focus",
            node = %target.node,
            kind = %target.kind,
            remote = matches!(location, FocusLocation::Remote(_)),
            ?intent,
            "target focused"
        );

        self.state = Some(FocusState {
            target: target.clone(),
            location: location.clone(),
            changed,
            pointer_down_x: x,
            pointer_down_y: y,
        });

        let scrolled_by = if !keyboard_open && self.config.intelligent_scroll {
            self.scroll_into_view(host)
        } else {
            None
        };

        Some(FocusEntry {
            target,
            location,
            open_keyboard: !keyboard_open,
            scrolled_by,
        })
    }

    /// Scrolls the focused target's document when the pointer-down point
    /// lies in the band the keyboard covers
    fn scroll_into_view(&mut self, host: &mut Host) -> Option<f64> {
        let state = self.state.as_ref()?;
        let doc = host.document_mut(state.target.node.document)?;
        let limit = doc.viewport().height - self.config.effective_height();
        if state.pointer_down_y <= limit {
            return None;
        }
        let overlap = state.pointer_down_y - limit;
        doc.scroll_by(overlap);
        tracing::debug!(target: "focus", overlap, "scrolled target into view");
        Some(overlap)
    }

    fn swap_type(&mut self, host: &mut Host, node: NodeRef) -> Result<(), DomError> {
        let doc = host.require_mut(node.document)?;
        let exposed = doc
            .attribute(node.node, "type")
            .unwrap_or("password")
            .to_string();
        doc.set_attribute(node.node, SWAP_MARKER_ATTR, &exposed)?;
        doc.set_attribute(node.node, "type", "text")?;
        self.swapped = Some(node);
        Ok(())
    }

    fn restore_type(&mut self, host: &mut Host) {
        let Some(node) = self.swapped.take() else {
            return;
        };
        let Some(doc) = host.document_mut(node.document) else {
            return;
        };
        let original = doc
            .attribute(node.node, SWAP_MARKER_ATTR)
            .unwrap_or("password")
            .to_string();
        let restored = doc
            .set_attribute(node.node, "type", &original)
            .and_then(|_| doc.remove_attribute(node.node, SWAP_MARKER_ATTR));
        if let Err(err) = restored {
            tracing::warn!(target: "focus", node = %node, error = %err, "type restore failed");
        }
    }

    /// Starts the grace delay if `node` is the focused target
    pub fn blur(&mut self, node: NodeRef) -> bool {
        if self.target().is_some_and(|t| t.node == node) {
            self.timers
                .schedule(TimerPurpose::BlurGrace, self.config.blur_grace_ms);
            return true;
        }
        false
    }

    /// Starts the grace delay if the focused target lives behind `frame_id`
    pub fn remote_blur(&mut self, frame_id: &FrameId) -> bool {
        let matches = matches!(
            self.state.as_ref().map(|s| &s.location),
            Some(FocusLocation::Remote(handle)) if handle.frame_id == *frame_id
        );
        if matches {
            self.timers
                .schedule(TimerPurpose::BlurGrace, self.config.blur_grace_ms);
        }
        matches
    }

    /// The user touched the keyboard: a pending blur is cancelled
    pub fn keyboard_interaction(&mut self) {
        if self.timers.cancel(TimerPurpose::BlurGrace) {
            tracing::debug!(target: "focus", "blur cancelled by keyboard interaction");
        }
    }

    /// Records that the focused target was mutated
    pub fn mark_changed(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.changed = true;
        }
    }

    /// The focused target, if it is still attached
    ///
    /// A detached target is dropped without a change notification.
    pub fn live_target(&mut self, host: &Host) -> Option<EditableTarget> {
        let node = self.target()?.node;
        if host.is_connected(node) {
            return self.target().cloned();
        }
        tracing::debug!(target: "focus", node = %node, "focused target went stale");
        self.state = None;
        self.swapped = None;
        self.timers.cancel(TimerPurpose::BlurGrace);
        self.audit_trail.push(FocusEvent::Dropped {
            node,
            timestamp_ms: self.timers.now(),
        });
        None
    }

    /// Completes a blur immediately
    pub fn complete_blur(&mut self, host: &mut Host) -> Option<EditableTarget> {
        self.timers.cancel(TimerPurpose::BlurGrace);
        let state = self.state.take()?;
        let target = state.target.clone();
        self.finish_blur(host, state);
        Some(target)
    }

    fn finish_blur(&mut self, host: &mut Host, state: FocusState) {
        let node = state.target.node;
        if state.changed && host.is_connected(node) {
            if let Some(doc) = host.document_mut(node.document) {
                if let Err(err) = doc.dispatch(node.node, DomEvent::Change) {
                    tracing::warn!(target: "focus", node = %node, error = %err, "change event failed");
                }
            }
        }
        if self.swapped == Some(node) {
            self.restore_type(host);
        }
        tracing::info!(target: "focus", node = %node, changed = state.changed, "target blurred");
        self.audit_trail.push(FocusEvent::Blurred {
            node,
            changed: state.changed,
            timestamp_ms: self.timers.now(),
        });
    }

    pub fn schedule_overlay_close(&mut self) {
        self.timers
            .schedule(TimerPurpose::OverlayAutoClose, self.config.overlay_close_ms);
    }

    pub fn cancel_overlay_close(&mut self) -> bool {
        self.timers.cancel(TimerPurpose::OverlayAutoClose)
    }

    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub fn now(&self) -> u64 {
        self.timers.now()
    }

    /// Next timer due at or before `until`; see [`TimerSet::pop_due`]
    pub fn pop_due(&mut self, until: u64) -> Option<TimerPurpose> {
        self.timers.pop_due(until)
    }

    pub fn settle(&mut self, until: u64) {
        self.timers.settle(until);
    }

    /// Acts on a fired timer
    pub fn fire(&mut self, purpose: TimerPurpose, host: &mut Host) -> Option<TimerOutcome> {
        match purpose {
            TimerPurpose::BlurGrace => self.complete_blur(host).map(TimerOutcome::Blurred),
            TimerPurpose::OverlayAutoClose => Some(TimerOutcome::OverlayAutoClose),
        }
    }

    /// Advances the clock, acting on every timer that fires
    pub fn advance(&mut self, host: &mut Host, delta_ms: u64) -> Vec<TimerOutcome> {
        let until = self.timers.now().saturating_add(delta_ms);
        let mut outcomes = Vec::new();
        while let Some(purpose) = self.timers.pop_due(until) {
            outcomes.extend(self.fire(purpose, host));
        }
        self.timers.settle(until);
        outcomes
    }

    pub fn audit_trail(&self) -> &[FocusEvent] {
        &self.audit_trail
    }
}

impl Default for FocusCoordinator {
    fn default() -> Self {
        Self::new(KeyboardConfig::default())
    }
}
