//! A single host document

use crate::char_to_byte;
use crate::event::{DispatchedEvent, DomEvent, ListenerKind};
use crate::node::{Element, Node, NodeData};
use crate::range::Range;
use crate::DomError;
use core_types::{DocumentId, NodeId, NodeRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a mutation observer installed on a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObserverId(u64);

/// A batch of child-list changes under one parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Observer {
    root: NodeId,
    records: Vec<MutationRecord>,
}

/// Visible area of a document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
            scroll_y: 0.0,
        }
    }
}

/// Host document
///
/// Nodes live in an arena keyed by [`NodeId`]. Removing a node detaches it
/// but keeps its slot, so callers holding an id can still ask whether it is
/// connected.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    nodes: BTreeMap<NodeId, Node>,
    next_node: u64,
    root: NodeId,
    body: NodeId,
    listeners: BTreeMap<NodeId, Vec<ListenerKind>>,
    observers: BTreeMap<ObserverId, Observer>,
    next_observer: u64,
    journal: Vec<DispatchedEvent>,
    active_element: Option<NodeId>,
    selection: Option<Range>,
    viewport: Viewport,
    pub(crate) frame_element: Option<NodeRef>,
}

impl Document {
    /// Creates a document containing `<html><body></body></html>`
    pub fn new(id: DocumentId) -> Self {
        let mut doc = Self {
            id,
            nodes: BTreeMap::new(),
            next_node: 1,
            root: NodeId::from_raw(0),
            body: NodeId::from_raw(0),
            listeners: BTreeMap::new(),
            observers: BTreeMap::new(),
            next_observer: 1,
            journal: Vec::new(),
            active_element: None,
            selection: None,
            viewport: Viewport::default(),
            frame_element: None,
        };
        let root = doc.alloc(NodeData::Element(Element::new("html")));
        let body = doc.alloc(NodeData::Element(Element::new("body")));
        if let Some(node) = doc.nodes.get_mut(&body) {
            node.parent = Some(root);
        }
        if let Some(node) = doc.nodes.get_mut(&root) {
            node.children.push(body);
        }
        doc.root = root;
        doc.body = body;
        doc
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Frame element hosting this document, if it is nested
    pub fn frame_element(&self) -> Option<NodeRef> {
        self.frame_element
    }

    pub fn node_ref(&self, node: NodeId) -> NodeRef {
        NodeRef::new(self.id, node)
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId::from_raw(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, Node::new(data));
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(&id).ok_or(DomError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(&id).ok_or(DomError::NodeNotFound(id))
    }

    // ===== Node creation =====

    /// Creates a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(Element::new(tag)))
    }

    /// Creates a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    /// Creates an element with attributes and appends it to `parent`
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> Result<NodeId, DomError> {
        let id = self.create_element(tag);
        for (name, value) in attributes {
            self.set_attribute(id, name, value)?;
        }
        self.append_child(parent, id)?;
        Ok(id)
    }

    /// Creates a text node and appends it to `parent`
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, DomError> {
        let id = self.create_text(text);
        self.append_child(parent, id)?;
        Ok(id)
    }

    /// Attaches an isolated rendering subtree to `host`
    pub fn attach_shadow(&mut self, host: NodeId) -> Result<NodeId, DomError> {
        let existing = self
            .node(host)?
            .element()
            .ok_or(DomError::NotAnElement(host))?
            .shadow_root;
        if existing.is_some() {
            return Err(DomError::ShadowRootExists(host));
        }
        let shadow = self.alloc(NodeData::ShadowRoot { host });
        if let Some(el) = self.node_mut(host)?.element_mut() {
            el.shadow_root = Some(shadow);
        }
        Ok(shadow)
    }

    // ===== Inspection =====

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(&id).map(|n| &n.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(&id).and_then(|n| n.element())
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            Some(NodeData::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.element(host).and_then(|el| el.shadow_root)
    }

    pub fn shadow_host(&self, shadow: NodeId) -> Option<NodeId> {
        match self.data(shadow) {
            Some(NodeData::ShadowRoot { host }) => Some(*host),
            _ => None,
        }
    }

    /// Number of characters in a text node or element value
    pub fn char_len(&self, id: NodeId) -> usize {
        match self.data(id) {
            Some(NodeData::Text(text)) => text.chars().count(),
            Some(NodeData::Element(_)) | Some(NodeData::ShadowRoot { .. }) => {
                self.children(id).len()
            }
            None => 0,
        }
    }

    /// Whether the node is reachable from the document root, crossing
    /// shadow boundaries through their hosts
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            let Some(node) = self.nodes.get(&current) else {
                return false;
            };
            match (node.parent, &node.data) {
                (Some(parent), _) => current = parent,
                (None, NodeData::ShadowRoot { host }) => current = *host,
                (None, _) => return false,
            }
        }
    }

    /// Whether `ancestor` is `node` or one of its ancestors, without
    /// crossing shadow boundaries
    pub fn light_contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Like [`light_contains`](Self::light_contains) but climbs out of
    /// shadow roots through their hosts
    pub fn composed_contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id).or_else(|| self.shadow_host(id));
        }
        false
    }

    /// Nearest inclusive light-tree ancestor with the given tag
    pub fn closest(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.tag(id) == Some(tag) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    /// `root` and its light-tree descendants in document order
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !self.nodes.contains_key(&id) {
                continue;
            }
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    /// Like [`subtree`](Self::subtree) but descends into shadow roots,
    /// visiting each shadow root right after its host
    pub fn composed_subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !self.nodes.contains_key(&id) {
                continue;
            }
            out.push(id);
            stack.extend(self.children(id).iter().rev());
            if let Some(shadow) = self.shadow_root(id) {
                stack.push(shadow);
            }
        }
        out
    }

    /// First connected element carrying `name="value"`, shadow trees included
    pub fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        self.composed_subtree(self.root)
            .into_iter()
            .find(|id| self.attribute(*id, name) == Some(value))
    }

    /// Text of the subtree, rendering `<br>` as a line break
    pub fn rendered_text(&self, root: NodeId) -> String {
        self.subtree(root)
            .into_iter()
            .filter_map(|id| match self.data(id) {
                Some(NodeData::Text(text)) => Some(text.clone()),
                Some(NodeData::Element(el)) if el.tag() == "br" => Some("\n".to_string()),
                _ => None,
            })
            .collect()
    }

    // ===== Tree mutation =====

    /// Appends `child` to `parent`, moving it if it is already attached
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` into `parent` before `reference` (or at the end)
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if matches!(self.node(parent)?.data, NodeData::Text(_)) {
            return Err(DomError::HierarchyRequest(format!(
                "text node {} cannot have children",
                parent
            )));
        }
        if matches!(self.node(child)?.data, NodeData::ShadowRoot { .. }) {
            return Err(DomError::HierarchyRequest(format!(
                "shadow root {} cannot be inserted",
                child
            )));
        }
        if self.composed_contains(child, parent) {
            return Err(DomError::HierarchyRequest(format!(
                "{} is an ancestor of {}",
                child, parent
            )));
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::HierarchyRequest(format!(
                    "{} is not a child of {}",
                    reference, parent
                )));
            }
        }

        if self.parent(child).is_some() {
            self.remove(child)?;
        }

        let index = match reference {
            Some(reference) => self
                .children(parent)
                .iter()
                .position(|c| *c == reference)
                .unwrap_or(self.children(parent).len()),
            None => self.children(parent).len(),
        };
        self.node_mut(parent)?.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.queue_record(MutationRecord {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Detaches `node` from its parent; the arena slot stays
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        let Some(parent) = self.node(node)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|c| *c != node);
        self.node_mut(node)?.parent = None;
        if self
            .active_element
            .is_some_and(|active| self.composed_contains(node, active))
        {
            self.active_element = None;
        }
        self.queue_record(MutationRecord {
            target: parent,
            added: Vec::new(),
            removed: vec![node],
        });
        Ok(())
    }

    /// Replaces the contents of a text node
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.node_mut(node)?.data {
            NodeData::Text(existing) => {
                *existing = text.to_string();
                Ok(())
            }
            _ => Err(DomError::NotText(node)),
        }
    }

    /// Removes `count` characters starting at `offset` from a text node
    pub fn delete_text(&mut self, node: NodeId, offset: usize, count: usize) -> Result<(), DomError> {
        match &mut self.node_mut(node)?.data {
            NodeData::Text(text) => {
                let start = char_to_byte(text, offset);
                let end = char_to_byte(text, offset + count);
                text.replace_range(start..end, "");
                Ok(())
            }
            _ => Err(DomError::NotText(node)),
        }
    }

    // ===== Attributes and markers =====

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|el| el.attribute(name))
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let el = self
            .node_mut(node)?
            .element_mut()
            .ok_or(DomError::NotAnElement(node))?;
        el.attributes.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        let el = self
            .node_mut(node)?
            .element_mut()
            .ok_or(DomError::NotAnElement(node))?;
        el.attributes.remove(name);
        Ok(())
    }

    /// Stores a script-private flag on a node; returns `true` if newly set
    pub fn set_marker(&mut self, node: NodeId, marker: &str) -> Result<bool, DomError> {
        Ok(self.node_mut(node)?.markers.insert(marker.to_string()))
    }

    pub fn has_marker(&self, node: NodeId, marker: &str) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|n| n.markers.contains(marker))
    }

    // ===== Form control values =====

    pub fn value(&self, node: NodeId) -> Result<&str, DomError> {
        Ok(self
            .node(node)?
            .element()
            .ok_or(DomError::NotAnElement(node))?
            .value())
    }

    /// Sets a control's value; the caret moves to the end as in browsers
    pub fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        let el = self
            .node_mut(node)?
            .element_mut()
            .ok_or(DomError::NotAnElement(node))?;
        el.value = value.to_string();
        let end = el.value.chars().count();
        el.selection = (end, end);
        Ok(())
    }

    /// Reads `(selectionStart, selectionEnd)` in characters
    pub fn selection_range(&self, node: NodeId) -> Result<(usize, usize), DomError> {
        let el = self
            .node(node)?
            .element()
            .ok_or(DomError::NotAnElement(node))?;
        if !el.supports_selection() {
            return Err(DomError::SelectionUnsupported {
                input_type: el.input_type(),
            });
        }
        Ok(el.selection)
    }

    /// Sets the selection, clamped to the value length
    pub fn set_selection_range(
        &mut self,
        node: NodeId,
        start: usize,
        end: usize,
    ) -> Result<(), DomError> {
        let el = self
            .node_mut(node)?
            .element_mut()
            .ok_or(DomError::NotAnElement(node))?;
        if !el.supports_selection() {
            return Err(DomError::SelectionUnsupported {
                input_type: el.input_type(),
            });
        }
        let len = el.value.chars().count();
        let end = end.min(len);
        el.selection = (start.min(end), end);
        Ok(())
    }

    // ===== Focus, selection and viewport =====

    pub fn active_element(&self) -> Option<NodeId> {
        self.active_element
    }

    pub fn focus(&mut self, node: NodeId) -> Result<(), DomError> {
        self.node(node)?;
        self.active_element = Some(node);
        Ok(())
    }

    pub fn blur(&mut self) {
        self.active_element = None;
    }

    pub fn selection(&self) -> Option<Range> {
        self.selection
    }

    pub fn set_selection(&mut self, range: Range) {
        self.selection = Some(range);
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn scroll_by(&mut self, dy: f64) {
        self.viewport.scroll_y = (self.viewport.scroll_y + dy).max(0.0);
    }

    // ===== Listeners =====

    pub fn add_listener(&mut self, node: NodeId, kind: ListenerKind) -> Result<(), DomError> {
        self.node(node)?;
        self.listeners.entry(node).or_default().push(kind);
        Ok(())
    }

    pub fn listeners(&self, node: NodeId) -> &[ListenerKind] {
        self.listeners
            .get(&node)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_listener(&self, node: NodeId, kind: ListenerKind) -> bool {
        self.listeners(node).contains(&kind)
    }

    // ===== Events =====

    /// Dispatches a synthetic event; host scripts see it in the journal
    pub fn dispatch(&mut self, node: NodeId, event: DomEvent) -> Result<(), DomError> {
        self.node(node)?;
        self.journal.push(DispatchedEvent {
            target: node,
            event,
        });
        Ok(())
    }

    /// Runs an element's click path, including the submit default action
    pub fn click(&mut self, node: NodeId) -> Result<(), DomError> {
        self.dispatch(node, DomEvent::Click)?;
        let submits = self.element(node).is_some_and(|el| el.is_submit_button());
        if submits {
            if let Some(form) = self.closest(node, "form") {
                self.dispatch(form, DomEvent::Submit)?;
            }
        }
        Ok(())
    }

    pub fn journal(&self) -> &[DispatchedEvent] {
        &self.journal
    }

    pub fn take_journal(&mut self) -> Vec<DispatchedEvent> {
        std::mem::take(&mut self.journal)
    }

    /// Events dispatched on `node`, oldest first
    pub fn events_for(&self, node: NodeId) -> Vec<&DomEvent> {
        self.journal
            .iter()
            .filter(|e| e.target == node)
            .map(|e| &e.event)
            .collect()
    }

    // ===== Mutation observers =====

    /// Starts observing child-list changes in the light subtree of `root`
    pub fn observe(&mut self, root: NodeId) -> Result<ObserverId, DomError> {
        self.node(root)?;
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.insert(
            id,
            Observer {
                root,
                records: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Stops an observer; returns `false` if it was not active
    pub fn disconnect(&mut self, id: ObserverId) -> bool {
        self.observers.remove(&id).is_some()
    }

    pub fn is_observing(&self, id: ObserverId) -> bool {
        self.observers.contains_key(&id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn take_records(&mut self, id: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .get_mut(&id)
            .map(|o| std::mem::take(&mut o.records))
            .unwrap_or_default()
    }

    fn queue_record(&mut self, record: MutationRecord) {
        let matching: Vec<ObserverId> = self
            .observers
            .iter()
            .filter(|(_, o)| self.light_contains(o.root, record.target))
            .map(|(id, _)| *id)
            .collect();
        for id in matching {
            if let Some(observer) = self.observers.get_mut(&id) {
                observer.records.push(record.clone());
            }
        }
    }

    pub(crate) fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| n.is_leaf())
    }

    pub(crate) fn text_mut(&mut self, id: NodeId) -> Result<&mut String, DomError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(text) => Ok(text),
            _ => Err(DomError::NotText(id)),
        }
    }

    pub(crate) fn set_content_document(
        &mut self,
        frame: NodeId,
        document: Option<DocumentId>,
    ) -> Result<(), DomError> {
        let el = self
            .node_mut(frame)?
            .element_mut()
            .ok_or(DomError::NotAnElement(frame))?;
        if !matches!(el.tag(), "iframe" | "frame") {
            return Err(DomError::NotAFrame(frame));
        }
        el.content_document = document;
        Ok(())
    }
}
