//! # Keyboard Engine
//!
//! One injected keyboard: the top context, a nested context per
//! same-origin nested document, the message bus between them, and the
//! services that turn host interactions into edits.
//!
//! Interactions post relay messages but never deliver them; call
//! [`VirtualKeyboard::pump`] to deliver pending mutations and messages.

use crate::runtime::RuntimeError;
use core_types::{ContextId, DocumentId, NodeId, NodeRef};
use host_dom::{Document, Host, ListenerKind};
use input_types::{KeyAction, VirtualKey};
use ipc::{Endpoint, MessageBus};
use serde::Serialize;
use services_binder::{Binder, EditableTarget};
use services_event_synth::{EventSynthesizer, SynthOutcome};
use services_focus_manager::{
    FocusCoordinator, FocusIntent, FocusLocation, FocusPhase, TimerOutcome,
};
use services_keyboard::{KeyResolution, KeyboardController, KeyboardMode, LayoutProvider, StaticLayouts};
use services_relay::{NestedRelay, TopCommand, TopRelay};
use services_settings::{KeyboardConfig, SettingsRegistry, SettingsStore};
use std::collections::BTreeMap;

/// `id` of the keyboard's shadow host in the top document
pub const WIDGET_ID: &str = "vk-widget";
/// `id` of the address-style input inside the keyboard
pub const URL_BAR_ID: &str = "vk-url-bar";
/// Attribute on the widget mirroring the keyboard mode
pub const MODE_ATTR: &str = "data-vk-mode";

/// Per nested document state
#[derive(Debug)]
pub struct NestedContext {
    pub binder: Binder,
    pub relay: NestedRelay,
    /// Last pointer-down on a bound target, sent along with the next open
    pointer: Option<(NodeId, f64, f64)>,
}

/// What the page looks like to an observer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub mode: KeyboardMode,
    pub phase: FocusPhase,
    pub focused: Option<NodeRef>,
    /// Value (or rendered text) of the focused target
    pub text: Option<String>,
    pub height: f64,
    pub scroll_y: f64,
}

/// Keyboard engine bound to one host page
pub struct VirtualKeyboard<S = SettingsRegistry, L = StaticLayouts> {
    host: Host,
    settings: S,
    layouts: L,
    config: KeyboardConfig,
    binder: Binder,
    relay: TopRelay,
    nested: BTreeMap<DocumentId, NestedContext>,
    bus: MessageBus,
    coordinator: FocusCoordinator,
    keyboard: KeyboardController,
    synth: EventSynthesizer,
    widget: NodeId,
    url_bar: NodeId,
}

impl<S: SettingsStore, L: LayoutProvider> VirtualKeyboard<S, L> {
    /// Injects the keyboard into `host` and binds every editable target
    /// already present
    pub fn new(mut host: Host, settings: S, layouts: L) -> Result<Self, RuntimeError> {
        let config = KeyboardConfig::load(&settings);
        let top = host.top_mut();
        let (widget, url_bar) = install_widget(top)?;

        let mut binder = Binder::new(top.id());
        let root = top.root();
        let report = binder.observe_mutations(top, root)?;
        tracing::info!(
            target: "runtime",
            bound = report.bound.len(),
            frames = report.frames.len(),
            enabled = config.enabled,
            "keyboard injected"
        );

        let mut engine = Self {
            host,
            settings,
            layouts,
            coordinator: FocusCoordinator::new(config.clone()),
            keyboard: KeyboardController::new(config.clone()),
            config,
            binder,
            relay: TopRelay::new(),
            nested: BTreeMap::new(),
            bus: MessageBus::new(),
            synth: EventSynthesizer::new(),
            widget,
            url_bar,
        };
        engine.start_nested(report.frames);
        engine.sync_widget();
        Ok(engine)
    }

    // ===== Accessors =====

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Host access for page scripts; call [`pump`](Self::pump) afterwards
    /// so mutations are observed
    pub fn host_mut(&mut self) -> &mut Host {
        &mut self.host
    }

    pub fn bus_mut(&mut self) -> &mut MessageBus {
        &mut self.bus
    }

    pub fn config(&self) -> &KeyboardConfig {
        &self.config
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut S {
        &mut self.settings
    }

    pub fn keyboard(&self) -> &KeyboardController {
        &self.keyboard
    }

    pub fn coordinator(&self) -> &FocusCoordinator {
        &self.coordinator
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    pub fn top_relay(&self) -> &TopRelay {
        &self.relay
    }

    pub fn nested(&self, document: DocumentId) -> Option<&NestedContext> {
        self.nested.get(&document)
    }

    pub fn nested_documents(&self) -> Vec<DocumentId> {
        self.nested.keys().copied().collect()
    }

    pub fn widget(&self) -> NodeRef {
        NodeRef::new(self.host.top_id(), self.widget)
    }

    pub fn url_bar(&self) -> NodeRef {
        NodeRef::new(self.host.top_id(), self.url_bar)
    }

    /// Target that takes keyboard edits right now
    pub fn focused(&self) -> Option<&EditableTarget> {
        self.coordinator.target()
    }

    pub fn snapshot(&self) -> Snapshot {
        let focused = self.coordinator.target();
        let text = focused.and_then(|t| {
            let doc = self.host.document(t.node.document)?;
            if t.is_rich_text() {
                Some(doc.rendered_text(t.node.node))
            } else {
                doc.value(t.node.node).ok().map(str::to_string)
            }
        });
        let scroll_y = focused
            .and_then(|t| self.host.document(t.node.document))
            .map_or(0.0, |doc| doc.viewport().scroll_y);
        Snapshot {
            mode: self.keyboard.mode(),
            phase: self.coordinator.phase(),
            focused: focused.map(|t| t.node),
            text,
            height: self.keyboard.height(),
            scroll_y,
        }
    }

    // ===== Settings =====

    /// Re-reads the settings store
    ///
    /// Disabling the keyboard closes it and blurs the focused target.
    pub fn reload_settings(&mut self) {
        self.config = KeyboardConfig::load(&self.settings);
        self.coordinator.set_config(self.config.clone());
        self.keyboard.set_config(self.config.clone());
        for ctx in self.nested.values_mut() {
            ctx.relay.set_show_open_button(self.config.show_open_button);
        }
        if !self.config.enabled {
            self.coordinator.complete_blur(&mut self.host);
            self.close_keyboard();
        }
        tracing::info!(target: "runtime", enabled = self.config.enabled, layout = %self.config.layout, "settings reloaded");
        self.sync_widget();
    }

    // ===== Host interactions =====

    /// Pointer went down on `node` at page coordinates `(x, y)`
    pub fn pointer_down(&mut self, node: NodeRef, x: f64, y: f64) {
        if node.document == self.host.top_id() {
            if self
                .binder
                .listener_target(self.host.top(), node.node, ListenerKind::PointerDown)
                .is_some()
            {
                self.coordinator.record_pointer_down(node, x, y);
            }
            return;
        }
        let (Some(ctx), Some(doc)) = (
            self.nested.get_mut(&node.document),
            self.host.document(node.document),
        ) else {
            return;
        };
        if ctx
            .binder
            .listener_target(doc, node.node, ListenerKind::PointerDown)
            .is_some()
        {
            ctx.pointer = Some((node.node, x, y));
        }
    }

    /// Moves host focus to `node`, blurring the element that had it
    pub fn focus(&mut self, node: NodeRef) -> Result<(), RuntimeError> {
        let previous = self
            .host
            .require(node.document)?
            .active_element()
            .filter(|active| *active != node.node);
        if let Some(previous) = previous {
            self.blur(NodeRef::new(node.document, previous))?;
        }
        self.host.require_mut(node.document)?.focus(node.node)?;
        self.intent(node, ListenerKind::Focus);
        Ok(())
    }

    /// Clicks `node`; a click outside the widget closes open overlays
    pub fn click(&mut self, node: NodeRef) -> Result<(), RuntimeError> {
        self.host.require_mut(node.document)?.click(node.node)?;
        if !self.in_widget(node) && self.keyboard.click_outside() {
            self.coordinator.cancel_overlay_close();
            tracing::debug!(target: "runtime", node = %node, "overlay closed by outside click");
            self.sync_widget();
        }
        self.intent(node, ListenerKind::Click);
        Ok(())
    }

    /// `node` lost host focus
    pub fn blur(&mut self, node: NodeRef) -> Result<(), RuntimeError> {
        let doc = self.host.require_mut(node.document)?;
        if doc.active_element() == Some(node.node) {
            doc.blur();
        }

        if node.document == self.host.top_id() {
            if self
                .binder
                .listener_target(self.host.top(), node.node, ListenerKind::Blur)
                .is_some()
            {
                self.coordinator.blur(node);
            }
            return Ok(());
        }

        let Some(ctx) = self.nested.get_mut(&node.document) else {
            return Ok(());
        };
        let bound = ctx
            .binder
            .listener_target(self.host.require(node.document)?, node.node, ListenerKind::Blur)
            .is_some();
        if bound {
            ctx.relay.blur(&mut self.host, &mut self.bus)?;
        }
        Ok(())
    }

    /// Re-runs classification after `node`'s attributes changed
    pub fn reclassify(&mut self, node: NodeRef) -> bool {
        let Some(doc) = self.host.document_mut(node.document) else {
            return false;
        };
        let binder = if doc.frame_element().is_none() {
            &mut self.binder
        } else {
            match self.nested.get_mut(&node.document) {
                Some(ctx) => &mut ctx.binder,
                None => return false,
            }
        };
        binder.reclassify(doc, node.node).is_some()
    }

    /// Attaches a shadow root to `node` and starts watching it
    ///
    /// Attaching queues no mutation record, so the host is rescanned here.
    pub fn attach_shadow(&mut self, node: NodeRef) -> Result<NodeId, RuntimeError> {
        let doc = self.host.require_mut(node.document)?;
        let shadow = doc.attach_shadow(node.node)?;
        let binder = if doc.frame_element().is_none() {
            &mut self.binder
        } else {
            match self.nested.get_mut(&node.document) {
                Some(ctx) => &mut ctx.binder,
                None => return Ok(shadow),
            }
        };
        binder.scan(doc, node.node);
        Ok(shadow)
    }

    fn in_widget(&self, node: NodeRef) -> bool {
        node.document == self.host.top_id()
            && self.host.top().composed_contains(self.widget, node.node)
    }

    /// A bound listener fired on `node`
    fn intent(&mut self, node: NodeRef, kind: ListenerKind) {
        let intent = match kind {
            ListenerKind::Focus => FocusIntent::Focus,
            ListenerKind::Click => FocusIntent::Click,
            _ => return,
        };
        if !self.config.enabled {
            tracing::debug!(target: "runtime", node = %node, "keyboard disabled, intent ignored");
            return;
        }

        if node.document == self.host.top_id() {
            let Some(target) = self
                .binder
                .listener_target(self.host.top(), node.node, kind)
                .cloned()
            else {
                return;
            };
            self.enter_focus(target, FocusLocation::Local, intent);
            return;
        }

        let Some(ctx) = self.nested.get_mut(&node.document) else {
            return;
        };
        let bound = self
            .host
            .document(node.document)
            .is_some_and(|doc| ctx.binder.listener_target(doc, node.node, kind).is_some());
        if !bound {
            return;
        }
        let pos = match ctx.pointer.take() {
            Some((pointed, x, y)) if pointed == node.node => (x, y),
            _ => (0.0, 0.0),
        };
        let force = intent == FocusIntent::Focus;
        if let Err(err) = ctx
            .relay
            .open(&mut self.host, &mut self.bus, node.node, pos, force)
        {
            tracing::warn!(target: "runtime", node = %node, error = %err, "open not relayed");
        }
    }

    fn enter_focus(&mut self, target: EditableTarget, location: FocusLocation, intent: FocusIntent) {
        if !self.config.enabled {
            return;
        }
        let keyboard_open = self.keyboard.is_open();
        let Some(entry) =
            self.coordinator
                .focus(&mut self.host, target, location, intent, keyboard_open)
        else {
            return;
        };
        if self.keyboard.open_for(&entry.target, &self.layouts) {
            self.broadcast(true);
        }
        self.sync_widget();
    }

    // ===== Keyboard =====

    /// A key on the keyboard was pressed
    pub fn press_key(&mut self, key: &VirtualKey) -> KeyResolution {
        self.coordinator.keyboard_interaction();
        let resolution = self.keyboard.press(key);
        match &resolution {
            KeyResolution::Edit(action) => {
                self.apply(action.clone(), false);
            }
            KeyResolution::Closed => {
                self.coordinator.complete_blur(&mut self.host);
                self.broadcast(false);
            }
            KeyResolution::OpenUrlBar => self.open_url_bar(),
            KeyResolution::OverlayOpened(_) | KeyResolution::OverlayClosed => {
                self.coordinator.cancel_overlay_close();
            }
            KeyResolution::ModeChanged(_) | KeyResolution::Ignored => {}
        }
        self.sync_widget();
        resolution
    }

    /// Inserts `text` at the current focus in one edit (voice input)
    pub fn insert_text(&mut self, text: &str) -> SynthOutcome {
        self.coordinator.keyboard_interaction();
        if text.is_empty() {
            return SynthOutcome::default();
        }
        self.apply(KeyAction::InsertText(text.to_string()), false)
    }

    /// Applies an edit to the focused target; a stale target is a no-op
    fn apply(&mut self, action: KeyAction, skip_refocus: bool) -> SynthOutcome {
        let Some(target) = self.coordinator.live_target(&self.host) else {
            tracing::debug!(target: "runtime", action = %action, "no live target, key dropped");
            return SynthOutcome::default();
        };

        let shift = self.keyboard.state().shift;
        let outcome = self.synth.apply(&mut self.host, &target, &action, shift);
        if outcome.changed {
            self.coordinator.mark_changed();
        }
        if outcome.consumed_shift {
            self.keyboard.consume_shift();
        }
        if outcome.close_keyboard {
            self.close_keyboard();
        } else if !skip_refocus {
            if let Some(doc) = self.host.document_mut(target.node.document) {
                if doc.active_element() != Some(target.node.node) {
                    if let Err(err) = doc.focus(target.node.node) {
                        tracing::debug!(target: "runtime", node = %target.node, error = %err, "target not refocused");
                    }
                }
            }
        }
        self.sync_widget();
        outcome
    }

    fn close_keyboard(&mut self) {
        self.coordinator.cancel_overlay_close();
        if self.keyboard.close() {
            self.broadcast(false);
        }
        self.sync_widget();
    }

    /// Picks a layout from the layout picker
    pub fn choose_layout(&mut self, id: &str) -> Result<(), RuntimeError> {
        self.keyboard
            .choose_layout(id, &self.layouts, &mut self.settings)?;
        self.config.layout = id.to_string();
        self.sync_widget();
        Ok(())
    }

    /// Overlay dismissed; it closes after the auto-close delay
    pub fn dismiss_overlay(&mut self) {
        if self.keyboard.dismiss_overlay() {
            self.coordinator.schedule_overlay_close();
        }
    }

    /// Focuses the keyboard's own address-style input
    pub fn open_url_bar(&mut self) {
        let url_bar = self.url_bar();
        if let Err(err) = self.focus(url_bar) {
            tracing::warn!(target: "runtime", error = %err, "url bar not focused");
        }
    }

    /// Posts an url-bar request as the toolbar popup does
    pub fn request_url_bar(&mut self) -> Result<(), RuntimeError> {
        services_relay::request_url_bar(&mut self.bus)?;
        Ok(())
    }

    // ===== Nested contexts =====

    /// Sends an edit from inside a nested document to the top context
    pub fn nested_key(&mut self, document: DocumentId, action: KeyAction) -> Result<(), RuntimeError> {
        let ctx = self
            .nested
            .get(&document)
            .ok_or(RuntimeError::NoNestedContext(document))?;
        ctx.relay.key(&mut self.host, &mut self.bus, action, false)?;
        Ok(())
    }

    fn start_nested(&mut self, frames: Vec<(NodeId, DocumentId)>) {
        let mut pending = frames;
        while let Some((frame, document)) = pending.pop() {
            if self.nested.contains_key(&document) {
                continue;
            }
            let Some(doc) = self.host.document_mut(document) else {
                continue;
            };
            let mut binder = Binder::new(document);
            let root = doc.root();
            match binder.observe_mutations(doc, root) {
                Ok(report) => pending.extend(report.frames),
                Err(err) => {
                    tracing::warn!(target: "runtime", document = %document, error = %err, "nested document not observed");
                    continue;
                }
            }
            tracing::info!(target: "runtime", frame = %frame, document = %document, "nested context started");
            let mut relay = NestedRelay::new(document);
            relay.set_show_open_button(self.config.show_open_button);
            self.nested.insert(
                document,
                NestedContext {
                    binder,
                    relay,
                    pointer: None,
                },
            );
        }
    }

    fn stop_nested(&mut self, documents: Vec<DocumentId>) {
        let mut pending = documents;
        while let Some(document) = pending.pop() {
            let Some(mut ctx) = self.nested.remove(&document) else {
                continue;
            };
            if let Some(doc) = self.host.document_mut(document) {
                pending.extend(ctx.binder.stop(doc));
            }
            let forgotten = self.relay.forget_document(document);
            tracing::info!(target: "runtime", document = %document, forgotten, "nested context stopped");
        }
    }

    // ===== Event loop =====

    /// Delivers pending mutations and relay messages until quiet
    ///
    /// Returns how many envelopes were delivered.
    pub fn pump(&mut self) -> usize {
        self.process_mutations();
        let mut delivered = 0;
        while !self.bus.is_idle() {
            for envelope in self.bus.drain() {
                self.deliver(&envelope);
                delivered += 1;
            }
        }
        delivered
    }

    fn process_mutations(&mut self) {
        let report = self.binder.process_mutations(self.host.top_mut());
        let mut frames = report.scan.frames;
        let mut stopped = report.stopped_documents;

        let documents: Vec<DocumentId> = self.nested.keys().copied().collect();
        for document in documents {
            let (Some(doc), Some(ctx)) = (
                self.host.document_mut(document),
                self.nested.get_mut(&document),
            ) else {
                stopped.push(document);
                continue;
            };
            let report = ctx.binder.process_mutations(doc);
            frames.extend(report.scan.frames);
            stopped.extend(report.stopped_documents);
        }

        self.stop_nested(stopped);
        self.start_nested(frames);
    }

    fn deliver(&mut self, envelope: &ipc::MessageEnvelope) {
        if envelope.destination == Endpoint::Top {
            if let Some(command) = self.relay.handle(&self.host, envelope) {
                self.execute(command);
            }
            return;
        }
        for (document, ctx) in self.nested.iter_mut() {
            if envelope.destination.accepts(ContextId::Nested(*document)) {
                ctx.relay.handle(envelope);
            }
        }
    }

    fn execute(&mut self, command: TopCommand) {
        match command {
            TopCommand::Open {
                target,
                handle,
                pos_x,
                pos_y,
                force,
            } => {
                let Some(editable) = self
                    .nested
                    .get(&target.document)
                    .and_then(|ctx| ctx.binder.target(target.node))
                    .cloned()
                else {
                    tracing::warn!(target: "runtime", node = %target, "open for an unbound nested target");
                    return;
                };
                self.coordinator.record_pointer_down(target, pos_x, pos_y);
                self.enter_focus(
                    editable,
                    FocusLocation::Remote(handle),
                    FocusIntent::from_force(force),
                );
            }
            TopCommand::Key {
                target,
                key,
                skip_refocus,
                ..
            } => {
                if self.coordinator.target().map(|t| t.node) != Some(target) {
                    tracing::debug!(target: "runtime", node = %target, "key for an unfocused target dropped");
                    return;
                }
                self.coordinator.keyboard_interaction();
                self.apply(key, skip_refocus);
            }
            TopCommand::Blur { frame_id } => {
                self.coordinator.remote_blur(&frame_id);
            }
            TopCommand::OpenUrlBar => {
                if !self.config.url_button {
                    tracing::debug!(target: "runtime", "url button disabled, url bar request ignored");
                    return;
                }
                self.open_url_bar();
            }
        }
    }

    fn broadcast(&mut self, is_open: bool) {
        if let Err(err) = self.relay.broadcast_state(&mut self.bus, is_open) {
            tracing::warn!(target: "runtime", error = %err, "state broadcast failed");
        }
    }

    /// Advances the virtual clock, acting on every timer that fires, then
    /// pumps
    pub fn advance(&mut self, delta_ms: u64) -> Vec<TimerOutcome> {
        let until = self.coordinator.now().saturating_add(delta_ms);
        let mut outcomes = Vec::new();
        while let Some(purpose) = self.coordinator.pop_due(until) {
            let Some(outcome) = self.coordinator.fire(purpose, &mut self.host) else {
                continue;
            };
            match &outcome {
                TimerOutcome::Blurred(target) => {
                    tracing::debug!(target: "runtime", node = %target.node, "blur completed");
                    self.close_keyboard();
                }
                TimerOutcome::OverlayAutoClose => {
                    self.keyboard.overlay_timeout();
                }
            }
            outcomes.push(outcome);
        }
        self.coordinator.settle(until);
        self.sync_widget();
        self.pump();
        outcomes
    }

    fn sync_widget(&mut self) {
        let mode = match self.keyboard.mode() {
            KeyboardMode::Closed => "closed",
            KeyboardMode::Letters => "letters",
            KeyboardMode::Numbers => "numbers",
        };
        let widget = self.widget;
        if let Err(err) = self.host.top_mut().set_attribute(widget, MODE_ATTR, mode) {
            tracing::warn!(target: "runtime", error = %err, "widget not updated");
        }
    }
}

impl VirtualKeyboard {
    /// Engine with the baked-in settings defaults and built-in layouts
    pub fn with_defaults(host: Host) -> Result<Self, RuntimeError> {
        Self::new(
            host,
            services_settings::create_default_registry(),
            StaticLayouts::builtin(),
        )
    }
}

/// Appends the keyboard's shadow host and its url bar to the body
fn install_widget(top: &mut Document) -> Result<(NodeId, NodeId), RuntimeError> {
    let body = top.body();
    let widget = top.append_element(body, "div", &[("id", WIDGET_ID), (MODE_ATTR, "closed")])?;
    let shadow = top.attach_shadow(widget)?;
    let url_bar = top.append_element(shadow, "input", &[("id", URL_BAR_ID), ("type", "url")])?;
    Ok((widget, url_bar))
}

/// Edit a key produces without the keyboard UI, for keys relayed from a
/// nested document
pub fn edit_action(key: &VirtualKey) -> Option<KeyAction> {
    match key {
        VirtualKey::Char(c) => Some(KeyAction::InsertChar(*c)),
        VirtualKey::Space => Some(KeyAction::InsertChar(' ')),
        VirtualKey::Backspace => Some(KeyAction::Backspace),
        VirtualKey::Enter => Some(KeyAction::Enter),
        VirtualKey::EmailAt => Some(KeyAction::InsertChar('@')),
        VirtualKey::DotCom => Some(KeyAction::InsertText(".com".into())),
        _ => None,
    }
}
