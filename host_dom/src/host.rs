//! The set of documents making up one page

use crate::document::Document;
use crate::DomError;
use core_types::{DocumentId, NodeRef};
use std::collections::BTreeMap;

/// Host page: the top document plus every nested same-origin document
#[derive(Debug, Clone)]
pub struct Host {
    top: Document,
    nested: BTreeMap<DocumentId, Document>,
    next_document: u64,
}

impl Host {
    /// Creates a host with an empty top document
    pub fn new() -> Self {
        Self {
            top: Document::new(DocumentId::from_raw(1)),
            nested: BTreeMap::new(),
            next_document: 2,
        }
    }

    pub fn top_id(&self) -> DocumentId {
        self.top.id()
    }

    pub fn top(&self) -> &Document {
        &self.top
    }

    pub fn top_mut(&mut self) -> &mut Document {
        &mut self.top
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        if id == self.top.id() {
            Some(&self.top)
        } else {
            self.nested.get(&id)
        }
    }

    pub fn document_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        if id == self.top.id() {
            Some(&mut self.top)
        } else {
            self.nested.get_mut(&id)
        }
    }

    /// Document lookup that reports a missing document as an error
    pub fn require(&self, id: DocumentId) -> Result<&Document, DomError> {
        self.document(id).ok_or(DomError::DocumentNotFound(id))
    }

    /// Mutable variant of [`require`](Self::require)
    pub fn require_mut(&mut self, id: DocumentId) -> Result<&mut Document, DomError> {
        self.document_mut(id).ok_or(DomError::DocumentNotFound(id))
    }

    /// Loads a same-origin document into a frame element
    pub fn create_nested_document(&mut self, frame: NodeRef) -> Result<DocumentId, DomError> {
        let id = DocumentId::from_raw(self.next_document);
        self.require_mut(frame.document)?
            .set_content_document(frame.node, Some(id))?;
        self.next_document += 1;
        let mut doc = Document::new(id);
        doc.frame_element = Some(frame);
        self.nested.insert(id, doc);
        Ok(id)
    }

    /// Unloads a nested document and unlinks it from its frame element
    pub fn remove_document(&mut self, id: DocumentId) -> Option<Document> {
        let doc = self.nested.remove(&id)?;
        if let Some(frame) = doc.frame_element() {
            if let Some(parent) = self.document_mut(frame.document) {
                if let Err(err) = parent.set_content_document(frame.node, None) {
                    tracing::debug!(target: "host", document = %id, error = %err, "frame element not unlinked");
                }
            }
        }
        Some(doc)
    }

    /// Same-origin content document of a frame element
    pub fn content_document(&self, frame: NodeRef) -> Option<DocumentId> {
        self.document(frame.document)?
            .element(frame.node)?
            .content_document()
    }

    /// Nested documents in allocation order
    pub fn nested_documents(&self) -> Vec<DocumentId> {
        self.nested.keys().copied().collect()
    }

    /// Whether `node` is still attached all the way up to the top document
    pub fn is_connected(&self, node: NodeRef) -> bool {
        let Some(doc) = self.document(node.document) else {
            return false;
        };
        if !doc.is_connected(node.node) {
            return false;
        }
        match doc.frame_element() {
            Some(frame) => self.is_connected(frame),
            None => node.document == self.top.id(),
        }
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}
