//! Mutation watcher registry
//!
//! One watcher per observed tree: the document tree itself, each shadow
//! root found by a scan and each nested document behind a frame element.
//! Watchers are owned by the scan that discovered them and stopped
//! explicitly when their host leaves the tree.

use core_types::{DocumentId, NodeId};
use host_dom::{Document, ObserverId};
use std::collections::BTreeMap;

/// What a watcher is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WatcherKey {
    /// A light tree observed from its root
    Tree(NodeId),
    /// The shadow root attached to this host
    ShadowHost(NodeId),
    /// The content document loaded in this frame element
    NestedDocument(NodeId),
}

/// A running watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watcher {
    Observer { observer: ObserverId, root: NodeId },
    /// Nested documents are observed by their own context
    Nested(DocumentId),
}

impl Watcher {
    /// Stops the watcher
    ///
    /// A nested document is handed back so the context owning it can shut
    /// down its own watchers.
    pub fn stop(self, doc: &mut Document) -> Option<DocumentId> {
        match self {
            Watcher::Observer { observer, .. } => {
                doc.disconnect(observer);
                None
            }
            Watcher::Nested(document) => Some(document),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WatcherRegistry {
    watchers: BTreeMap<WatcherKey, Watcher>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: WatcherKey) -> Option<Watcher> {
        self.watchers.get(&key).copied()
    }

    pub fn contains(&self, key: WatcherKey) -> bool {
        self.watchers.contains_key(&key)
    }

    /// Registers a watcher, returning the one it replaced
    pub fn insert(&mut self, key: WatcherKey, watcher: Watcher) -> Option<Watcher> {
        self.watchers.insert(key, watcher)
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    /// Observer ids of every local watcher
    pub fn observers(&self) -> Vec<ObserverId> {
        self.watchers
            .values()
            .filter_map(|w| match w {
                Watcher::Observer { observer, .. } => Some(*observer),
                Watcher::Nested(_) => None,
            })
            .collect()
    }

    /// Stops and forgets one watcher
    pub fn stop(&mut self, key: WatcherKey, doc: &mut Document) -> Option<DocumentId> {
        self.watchers.remove(&key).and_then(|w| w.stop(doc))
    }

    /// Stops every shadow-root and nested-document watcher whose host lies
    /// inside the detached subtree `removed`
    pub fn stop_within(&mut self, doc: &mut Document, removed: NodeId) -> Vec<DocumentId> {
        let keys: Vec<WatcherKey> = self
            .watchers
            .keys()
            .copied()
            .filter(|key| match key {
                WatcherKey::ShadowHost(host) | WatcherKey::NestedDocument(host) => {
                    doc.composed_contains(removed, *host) && !doc.is_connected(*host)
                }
                WatcherKey::Tree(_) => false,
            })
            .collect();

        keys.into_iter()
            .filter_map(|key| {
                tracing::debug!(target: "binder", ?key, "stopping watcher");
                self.stop(key, doc)
            })
            .collect()
    }

    /// Stops everything
    pub fn stop_all(&mut self, doc: &mut Document) -> Vec<DocumentId> {
        std::mem::take(&mut self.watchers)
            .into_values()
            .filter_map(|w| w.stop(doc))
            .collect()
    }
}
