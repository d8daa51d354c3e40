//! # Binder Service
//!
//! Discovers editable targets in a document and attaches the keyboard's
//! listeners to each of them exactly once.
//!
//! ## Philosophy
//!
//! - **Idempotent**: a marker on every bound node makes re-scans harmless
//! - **Follows the page**: mutation watchers rescan added subtrees, including
//!   isolated shadow trees, and drop removed targets
//! - **Explicit ownership**: watchers live in a [`WatcherRegistry`] and are
//!   stopped when their host is removed
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A focus tracker (that's the focus manager)
//! - An event synthesizer (listeners only report intents)

pub mod classifier;
pub mod watcher;

pub use classifier::{
    classify, Classification, EditableTarget, TargetKind, SWAP_MARKER_ATTR, VALUE_INPUT_TYPES,
};
pub use watcher::{Watcher, WatcherKey, WatcherRegistry};

use core_types::{DocumentId, NodeId};
use host_dom::{Document, DomError, ListenerKind};
use std::collections::BTreeMap;

/// Idempotency marker written on bound nodes
pub const BOUND_MARKER: &str = "vk-bound";

/// Outcome of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Targets bound by this scan
    pub bound: Vec<NodeId>,
    /// Editable but disabled or read-only
    pub skipped: Vec<NodeId>,
    /// Frame elements whose content document was newly discovered
    pub frames: Vec<(NodeId, DocumentId)>,
}

impl ScanReport {
    fn merge(&mut self, other: ScanReport) {
        self.bound.extend(other.bound);
        self.skipped.extend(other.skipped);
        self.frames.extend(other.frames);
    }
}

/// Outcome of processing queued mutations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationReport {
    pub scan: ScanReport,
    /// Targets whose references were dropped
    pub dropped: Vec<NodeId>,
    /// Nested documents whose frame left the tree
    pub stopped_documents: Vec<DocumentId>,
}

/// Binder for one document
#[derive(Debug, Clone)]
pub struct Binder {
    document: DocumentId,
    targets: BTreeMap<NodeId, EditableTarget>,
    watchers: WatcherRegistry,
}

impl Binder {
    pub fn new(document: DocumentId) -> Self {
        Self {
            document,
            targets: BTreeMap::new(),
            watchers: WatcherRegistry::new(),
        }
    }

    pub fn document(&self) -> DocumentId {
        self.document
    }

    /// Classifies `root` and every descendant, shadow trees included, and
    /// binds the editable ones not bound yet
    pub fn scan(&mut self, doc: &mut Document, root: NodeId) -> ScanReport {
        let mut report = ScanReport::default();

        for node in doc.composed_subtree(root) {
            if let Some(host) = doc.shadow_host(node) {
                self.watch_shadow_root(doc, host, node);
                continue;
            }

            if let Some(content) = doc.element(node).and_then(|el| el.content_document()) {
                let key = WatcherKey::NestedDocument(node);
                if self.watchers.get(key) != Some(Watcher::Nested(content)) {
                    self.watchers.insert(key, Watcher::Nested(content));
                    tracing::info!(
                        target: "binder",
                        document = %self.document,
                        frame = %node,
                        nested = %content,
                        "discovered nested document"
                    );
                    report.frames.push((node, content));
                }
                continue;
            }

            let Some(classification) = classify(doc, node) else {
                continue;
            };
            if !classification.bindable {
                report.skipped.push(node);
                continue;
            }

            match self.bind(doc, node, &classification) {
                Ok(true) => report.bound.push(node),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(target: "binder", node = %node, error = %err, "bind failed")
                }
            }
        }

        report
    }

    fn bind(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        classification: &Classification,
    ) -> Result<bool, DomError> {
        self.targets
            .insert(node, EditableTarget::new(doc.node_ref(node), classification));

        if !doc.set_marker(node, BOUND_MARKER)? {
            return Ok(false);
        }
        for kind in ListenerKind::ALL {
            doc.add_listener(node, kind)?;
        }
        tracing::debug!(
            target: "binder",
            document = %self.document,
            node = %node,
            kind = %classification.kind,
            "bound target"
        );
        Ok(true)
    }

    fn watch_shadow_root(&mut self, doc: &mut Document, host: NodeId, shadow: NodeId) {
        let key = WatcherKey::ShadowHost(host);
        if self.watchers.contains(key) {
            return;
        }
        match doc.observe(shadow) {
            Ok(observer) => {
                self.watchers.insert(
                    key,
                    Watcher::Observer {
                        observer,
                        root: shadow,
                    },
                );
            }
            Err(err) => {
                tracing::warn!(target: "binder", host = %host, error = %err, "cannot watch shadow root")
            }
        }
    }

    /// Installs a watcher on `root` and scans it
    pub fn observe_mutations(
        &mut self,
        doc: &mut Document,
        root: NodeId,
    ) -> Result<ScanReport, DomError> {
        let key = WatcherKey::Tree(root);
        if !self.watchers.contains(key) {
            let observer = doc.observe(root)?;
            self.watchers
                .insert(key, Watcher::Observer { observer, root });
        }
        Ok(self.scan(doc, root))
    }

    /// Drains every watcher: drops removed targets, stops watchers of
    /// removed hosts, then scans added subtrees
    pub fn process_mutations(&mut self, doc: &mut Document) -> MutationReport {
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for observer in self.watchers.observers() {
            for record in doc.take_records(observer) {
                added.extend(record.added);
                removed.extend(record.removed);
            }
        }

        let mut report = MutationReport::default();
        for node in removed {
            if doc.is_connected(node) {
                continue;
            }
            report
                .stopped_documents
                .extend(self.watchers.stop_within(doc, node));
        }

        let before: Vec<NodeId> = self.targets.keys().copied().collect();
        self.targets.retain(|node, _| doc.is_connected(*node));
        report.dropped = before
            .into_iter()
            .filter(|node| !self.targets.contains_key(node))
            .collect();
        for node in &report.dropped {
            tracing::debug!(target: "binder", node = %node, "dropped removed target");
        }

        added.dedup();
        for node in added {
            if doc.is_connected(node) {
                let scanned = self.scan(doc, node);
                report.scan.merge(scanned);
            }
        }

        report
    }

    /// Re-runs classification for a node whose attributes changed
    ///
    /// Returns the target if it is still editable and bindable.
    pub fn reclassify(&mut self, doc: &mut Document, node: NodeId) -> Option<&EditableTarget> {
        match classify(doc, node).filter(|c| c.bindable) {
            Some(classification) => {
                if let Err(err) = self.bind(doc, node, &classification) {
                    tracing::warn!(target: "binder", node = %node, error = %err, "rebind failed");
                    return None;
                }
                self.targets.get(&node)
            }
            None => {
                if self.targets.remove(&node).is_some() {
                    tracing::debug!(target: "binder", node = %node, "target reclassified away");
                }
                None
            }
        }
    }

    pub fn target(&self, node: NodeId) -> Option<&EditableTarget> {
        self.targets.get(&node)
    }

    pub fn targets(&self) -> impl Iterator<Item = &EditableTarget> {
        self.targets.values()
    }

    /// The target a fired listener belongs to, if `node` is bound with it
    pub fn listener_target(
        &self,
        doc: &Document,
        node: NodeId,
        kind: ListenerKind,
    ) -> Option<&EditableTarget> {
        if !doc.has_listener(node, kind) {
            return None;
        }
        self.targets.get(&node)
    }

    pub fn watchers(&self) -> &WatcherRegistry {
        &self.watchers
    }

    /// Stops every watcher, returning nested documents that must stop too
    pub fn stop(&mut self, doc: &mut Document) -> Vec<DocumentId> {
        self.targets.clear();
        self.watchers.stop_all(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Document, Binder) {
        let id = DocumentId::from_raw(1);
        (Document::new(id), Binder::new(id))
    }

    #[test]
    fn test_scan_binds_once() {
        let (mut doc, mut binder) = setup();
        let body = doc.body();
        let input = doc.append_element(body, "input", &[]).unwrap();

        let first = binder.scan(&mut doc, body);
        let second = binder.scan(&mut doc, body);
        assert_eq!(first.bound, vec![input]);
        assert!(second.bound.is_empty());
        assert_eq!(doc.listeners(input).len(), ListenerKind::ALL.len());
        assert!(doc.has_marker(input, BOUND_MARKER));
    }

    #[test]
    fn test_disabled_targets_are_skipped() {
        let (mut doc, mut binder) = setup();
        let body = doc.body();
        let input = doc
            .append_element(body, "input", &[("disabled", "")])
            .unwrap();
        let report = binder.scan(&mut doc, body);
        assert_eq!(report.skipped, vec![input]);
        assert!(doc.listeners(input).is_empty());
        assert!(binder.target(input).is_none());
    }

    #[test]
    fn test_scan_enters_shadow_roots() {
        let (mut doc, mut binder) = setup();
        let body = doc.body();
        let host = doc.append_element(body, "div", &[]).unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        let inner = doc.append_element(shadow, "textarea", &[]).unwrap();

        let root = doc.root();
        let report = binder.observe_mutations(&mut doc, root).unwrap();
        assert_eq!(report.bound, vec![inner]);
        assert!(binder.watchers().contains(WatcherKey::ShadowHost(host)));
        assert_eq!(doc.observer_count(), 2);
    }

    #[test]
    fn test_mutations_bind_added_and_drop_removed() {
        let (mut doc, mut binder) = setup();
        let body = doc.body();
        let root = doc.root();
        binder.observe_mutations(&mut doc, root).unwrap();

        let form = doc.append_element(body, "form", &[]).unwrap();
        let input = doc.append_element(form, "input", &[]).unwrap();
        let report = binder.process_mutations(&mut doc);
        assert_eq!(report.scan.bound, vec![input]);

        doc.remove(form).unwrap();
        let report = binder.process_mutations(&mut doc);
        assert_eq!(report.dropped, vec![input]);
        assert!(binder.target(input).is_none());
    }

    #[test]
    fn test_moved_target_stays_bound_once() {
        let (mut doc, mut binder) = setup();
        let body = doc.body();
        let a = doc.append_element(body, "div", &[]).unwrap();
        let b = doc.append_element(body, "div", &[]).unwrap();
        let input = doc.append_element(a, "input", &[]).unwrap();
        let root = doc.root();
        binder.observe_mutations(&mut doc, root).unwrap();

        doc.append_child(b, input).unwrap();
        let report = binder.process_mutations(&mut doc);
        assert!(report.dropped.is_empty());
        assert!(report.scan.bound.is_empty());
        assert_eq!(doc.listeners(input).len(), ListenerKind::ALL.len());
    }

    #[test]
    fn test_removing_shadow_host_stops_its_watcher() {
        let (mut doc, mut binder) = setup();
        let body = doc.body();
        let host = doc.append_element(body, "div", &[]).unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        doc.append_element(shadow, "input", &[]).unwrap();
        let root = doc.root();
        binder.observe_mutations(&mut doc, root).unwrap();
        assert_eq!(doc.observer_count(), 2);

        doc.remove(host).unwrap();
        binder.process_mutations(&mut doc);
        assert!(!binder.watchers().contains(WatcherKey::ShadowHost(host)));
        assert_eq!(doc.observer_count(), 1);
        assert_eq!(binder.targets().count(), 0);
    }

    #[test]
    fn test_additions_inside_shadow_root_are_bound() {
        let (mut doc, mut binder) = setup();
        let body = doc.body();
        let host = doc.append_element(body, "div", &[]).unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        let root = doc.root();
        binder.observe_mutations(&mut doc, root).unwrap();

        let late = doc
            .append_element(shadow, "div", &[("role", "textbox")])
            .unwrap();
        let report = binder.process_mutations(&mut doc);
        assert_eq!(report.scan.bound, vec![late]);
    }

    #[test]
    fn test_reclassify_drops_target() {
        let (mut doc, mut binder) = setup();
        let body = doc.body();
        let div = doc
            .append_element(body, "div", &[("contenteditable", "true")])
            .unwrap();
        binder.scan(&mut doc, body);
        assert!(binder.target(div).is_some());

        doc.set_attribute(div, "contenteditable", "false").unwrap();
        assert!(binder.reclassify(&mut doc, div).is_none());
        assert!(binder.target(div).is_none());
    }

    #[test]
    fn test_listener_target_requires_listener() {
        let (mut doc, mut binder) = setup();
        let body = doc.body();
        let input = doc.append_element(body, "input", &[]).unwrap();
        assert!(binder
            .listener_target(&doc, input, ListenerKind::Focus)
            .is_none());
        binder.scan(&mut doc, body);
        assert!(binder
            .listener_target(&doc, input, ListenerKind::Focus)
            .is_some());
    }
}
