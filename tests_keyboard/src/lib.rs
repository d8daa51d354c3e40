//! Keyboard Test Utilities
//!
//! Fixture builder shared by the integration tests.
//!
//! ## Test Philosophy
//!
//! - **Observe what page scripts observe**: Assertions read values, the
//!   event journal and the selection, never engine internals where the
//!   page can tell the difference
//! - **Deterministic time**: Delays pass only through `advance`
//! - **Hostile transport**: Cross-context tests duplicate and reorder
//!   envelopes before delivering them

use core_types::{DocumentId, NodeRef};
use host_dom::{Document, Host};
use input_types::{KeyAction, VirtualKey};
use services_keyboard::{KeyResolution, StaticLayouts};
use services_settings::{create_default_registry, SettingValue, SettingsRegistry};
use std::collections::BTreeMap;
use vkbd::VirtualKeyboard;

/// Builds a host page element by element, then injects the keyboard
pub struct PageBuilder {
    host: Host,
    settings: SettingsRegistry,
    ids: BTreeMap<String, NodeRef>,
    frames: BTreeMap<String, DocumentId>,
}

impl Default for PageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PageBuilder {
    pub fn new() -> Self {
        Self {
            host: Host::new(),
            settings: create_default_registry(),
            ids: BTreeMap::new(),
            frames: BTreeMap::new(),
        }
    }

    /// Appends `<tag id=id ...>` under `parent`
    ///
    /// `parent` is `body`, a registered id, or the id of a frame (its
    /// content document's body).
    pub fn add(mut self, parent: &str, tag: &str, id: &str, attributes: &[(&str, &str)]) -> Self {
        let parent = self.parent(parent);
        let mut attrs = vec![("id", id)];
        attrs.extend_from_slice(attributes);
        let doc = require_mut(&mut self.host, parent.document);
        let node = doc
            .append_element(parent.node, tag, &attrs)
            .unwrap_or_else(|err| panic!("cannot add {}: {}", id, err));
        let node = doc.node_ref(node);
        self.ids.insert(id.to_string(), node);
        self
    }

    /// Appends a text node under `parent`
    pub fn text(mut self, parent: &str, text: &str) -> Self {
        let parent = self.parent(parent);
        require_mut(&mut self.host, parent.document)
            .append_text(parent.node, text)
            .unwrap_or_else(|err| panic!("cannot add text: {}", err));
        self
    }

    /// Appends an iframe with a same-origin content document
    pub fn frame(mut self, parent: &str, id: &str) -> Self {
        self = self.add(parent, "iframe", id, &[]);
        let frame = self.ids[id];
        let document = self
            .host
            .create_nested_document(frame)
            .unwrap_or_else(|err| panic!("cannot load frame {}: {}", id, err));
        self.frames.insert(id.to_string(), document);
        self
    }

    /// Attaches a shadow root to `host_id`, registered as `id`
    pub fn shadow(mut self, host_id: &str, id: &str) -> Self {
        let host = self.ids[host_id];
        let doc = require_mut(&mut self.host, host.document);
        let shadow = doc
            .attach_shadow(host.node)
            .unwrap_or_else(|err| panic!("cannot attach shadow to {}: {}", host_id, err));
        let shadow = doc.node_ref(shadow);
        self.ids.insert(id.to_string(), shadow);
        self
    }

    /// Sets a control's initial value
    pub fn value(mut self, id: &str, value: &str) -> Self {
        let node = self.ids[id];
        require_mut(&mut self.host, node.document)
            .set_value(node.node, value)
            .unwrap_or_else(|err| panic!("cannot set value of {}: {}", id, err));
        self
    }

    pub fn setting(mut self, key: &str, value: SettingValue) -> Self {
        self.settings
            .set_override(key, value)
            .unwrap_or_else(|err| panic!("bad setting {}: {}", key, err));
        self
    }

    fn parent(&self, parent: &str) -> NodeRef {
        if parent == "body" {
            let top = self.host.top();
            return top.node_ref(top.body());
        }
        if let Some(document) = self.frames.get(parent) {
            let doc = require(&self.host, *document);
            return doc.node_ref(doc.body());
        }
        *self
            .ids
            .get(parent)
            .unwrap_or_else(|| panic!("unknown parent {}", parent))
    }

    /// Injects the keyboard and delivers the initial messages
    pub fn build(self) -> Page {
        let mut vk = VirtualKeyboard::new(self.host, self.settings, StaticLayouts::builtin())
            .unwrap_or_else(|err| panic!("cannot inject keyboard: {}", err));
        vk.pump();
        Page {
            vk,
            ids: self.ids,
            frames: self.frames,
        }
    }
}

fn require(host: &Host, document: DocumentId) -> &Document {
    host.require(document)
        .unwrap_or_else(|err| panic!("missing document: {}", err))
}

fn require_mut(host: &mut Host, document: DocumentId) -> &mut Document {
    host.require_mut(document)
        .unwrap_or_else(|err| panic!("missing document: {}", err))
}

/// A page with the keyboard injected
///
/// Interactions pump after themselves unless noted.
pub struct Page {
    pub vk: VirtualKeyboard,
    ids: BTreeMap<String, NodeRef>,
    frames: BTreeMap<String, DocumentId>,
}

impl Page {
    pub fn node(&self, id: &str) -> NodeRef {
        *self
            .ids
            .get(id)
            .unwrap_or_else(|| panic!("unknown element {}", id))
    }

    pub fn frame_document(&self, frame: &str) -> DocumentId {
        self.frames[frame]
    }

    pub fn doc(&self, id: &str) -> &Document {
        require(self.vk.host(), self.node(id).document)
    }

    pub fn doc_mut(&mut self, id: &str) -> &mut Document {
        let node = self.node(id);
        require_mut(self.vk.host_mut(), node.document)
    }

    /// Value of a control
    pub fn value(&self, id: &str) -> String {
        let node = self.node(id);
        self.doc(id)
            .value(node.node)
            .unwrap_or_else(|err| panic!("{} has no value: {}", id, err))
            .to_string()
    }

    /// Rendered text of a rich-text region
    pub fn rendered(&self, id: &str) -> String {
        self.doc(id).rendered_text(self.node(id).node)
    }

    pub fn caret(&self, id: &str) -> (usize, usize) {
        let node = self.node(id);
        self.doc(id)
            .selection_range(node.node)
            .unwrap_or_else(|err| panic!("{} has no selection: {}", id, err))
    }

    pub fn select(&mut self, id: &str, start: usize, end: usize) {
        let node = self.node(id).node;
        self.doc_mut(id)
            .set_selection_range(node, start, end)
            .unwrap_or_else(|err| panic!("cannot select in {}: {}", id, err));
    }

    /// Names of the events dispatched on `id`, in order
    pub fn event_names(&self, id: &str) -> Vec<&'static str> {
        self.doc(id)
            .events_for(self.node(id).node)
            .into_iter()
            .map(|event| event.name())
            .collect()
    }

    pub fn clear_journal(&mut self, id: &str) {
        self.doc_mut(id).take_journal();
    }

    pub fn pointer(&mut self, id: &str, x: f64, y: f64) {
        let node = self.node(id);
        self.vk.pointer_down(node, x, y);
    }

    pub fn focus(&mut self, id: &str) {
        let node = self.node(id);
        self.vk
            .focus(node)
            .unwrap_or_else(|err| panic!("cannot focus {}: {}", id, err));
        self.vk.pump();
    }

    pub fn click(&mut self, id: &str) {
        let node = self.node(id);
        self.vk
            .click(node)
            .unwrap_or_else(|err| panic!("cannot click {}: {}", id, err));
        self.vk.pump();
    }

    pub fn blur(&mut self, id: &str) {
        let node = self.node(id);
        self.vk
            .blur(node)
            .unwrap_or_else(|err| panic!("cannot blur {}: {}", id, err));
        self.vk.pump();
    }

    pub fn press(&mut self, key: VirtualKey) -> KeyResolution {
        let resolution = self.vk.press_key(&key);
        self.vk.pump();
        resolution
    }

    /// One key press per character
    pub fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            let key = if c == ' ' {
                VirtualKey::Space
            } else {
                VirtualKey::Char(c)
            };
            self.press(key);
        }
    }

    /// Posts a key from inside `frame` without delivering it
    pub fn post_nested_key(&mut self, frame: &str, action: KeyAction) {
        let document = self.frame_document(frame);
        self.vk
            .nested_key(document, action)
            .unwrap_or_else(|err| panic!("cannot post key from {}: {}", frame, err));
    }

    pub fn advance(&mut self, ms: u64) {
        self.vk.advance(ms);
    }
}
