//! Document selection ranges for rich-text editing
//!
//! A [`Boundary`] is `(text node, character offset)` or
//! `(container, child index)`, as in the DOM.

use crate::char_to_byte;
use crate::document::Document;
use crate::node::NodeData;
use crate::DomError;
use core_types::NodeId;
use serde::{Deserialize, Serialize};

/// A point in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub const fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A selection; `start` is never after `end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Boundary,
    pub end: Boundary,
}

impl Range {
    pub const fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    pub const fn collapsed_at(point: Boundary) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

impl Document {
    /// Topmost light ancestor of `node` (document root, shadow root or a
    /// detached subtree root)
    fn tree_root(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Preorder position of a boundary among the nodes of `order`:
    /// everything at an index `< position` lies before the boundary
    fn boundary_position(&self, order: &[NodeId], point: Boundary, is_end: bool) -> usize {
        let index_of = |id: NodeId| order.iter().position(|n| *n == id);
        match self.data(point.node) {
            Some(NodeData::Text(_)) => {
                let pos = index_of(point.node).unwrap_or(order.len());
                if is_end {
                    pos
                } else {
                    pos + 1
                }
            }
            _ => match self.children(point.node).get(point.offset) {
                Some(child) => index_of(*child).unwrap_or(order.len()),
                None => {
                    let last = self
                        .subtree(point.node)
                        .last()
                        .copied()
                        .unwrap_or(point.node);
                    index_of(last).map(|p| p + 1).unwrap_or(order.len())
                }
            },
        }
    }

    fn check_offset(&self, point: Boundary) -> Result<(), DomError> {
        if !self.contains_node(point.node) {
            return Err(DomError::NodeNotFound(point.node));
        }
        if point.offset > self.char_len(point.node) {
            return Err(DomError::OffsetOutOfRange {
                node: point.node,
                offset: point.offset,
            });
        }
        Ok(())
    }

    /// Removes the contents of `range` and returns the collapsed point
    ///
    /// Partially selected text nodes are trimmed; leaves fully inside the
    /// range are detached.
    pub fn delete_range_contents(&mut self, range: Range) -> Result<Boundary, DomError> {
        self.check_offset(range.start)?;
        self.check_offset(range.end)?;
        if range.is_collapsed() {
            return Ok(range.start);
        }

        let (start, end) = (range.start, range.end);
        if start.node == end.node {
            match self.data(start.node) {
                Some(NodeData::Text(_)) => {
                    let count = end.offset.saturating_sub(start.offset);
                    self.delete_text(start.node, start.offset, count)?;
                }
                _ => {
                    let lo = start.offset.min(end.offset);
                    let doomed: Vec<NodeId> = self.children(start.node)[lo..end.offset].to_vec();
                    for child in doomed {
                        self.remove(child)?;
                    }
                }
            }
            return Ok(start);
        }

        let order = self.subtree(self.tree_root(start.node));
        let from = self.boundary_position(&order, start, false);
        let to = self.boundary_position(&order, end, true);
        let doomed: Vec<NodeId> = order
            .iter()
            .enumerate()
            .filter(|(i, id)| *i >= from && *i < to && self.is_leaf(**id))
            .map(|(_, id)| *id)
            .collect();

        if self.text(start.node).is_some() {
            let text = self.text_mut(start.node)?;
            let cut = char_to_byte(text, start.offset);
            text.truncate(cut);
        }
        if self.text(end.node).is_some() {
            let text = self.text_mut(end.node)?;
            let cut = char_to_byte(text, end.offset);
            text.replace_range(..cut, "");
        }
        for leaf in doomed {
            self.remove(leaf)?;
        }

        if self.text(end.node).is_some() && self.text(start.node).is_none() {
            return Ok(Boundary::new(end.node, 0));
        }
        Ok(start)
    }

    /// Inserts `node` at `point`, splitting a text node if needed
    pub fn insert_node_at(&mut self, point: Boundary, node: NodeId) -> Result<(), DomError> {
        self.check_offset(point)?;
        match self.data(point.node) {
            Some(NodeData::Text(_)) => {
                let parent = self
                    .parent(point.node)
                    .ok_or_else(|| DomError::HierarchyRequest("detached text node".into()))?;
                let len = self.char_len(point.node);
                if point.offset == 0 {
                    return self.insert_before(parent, node, Some(point.node));
                }
                if point.offset < len {
                    let tail = {
                        let text = self.text_mut(point.node)?;
                        let cut = char_to_byte(text, point.offset);
                        text.split_off(cut)
                    };
                    let tail_node = self.create_text(&tail);
                    let next = self.next_sibling(point.node);
                    self.insert_before(parent, tail_node, next)?;
                }
                let next = self.next_sibling(point.node);
                self.insert_before(parent, node, next)
            }
            _ => {
                let reference = self.children(point.node).get(point.offset).copied();
                self.insert_before(point.node, node, reference)
            }
        }
    }

    /// Boundary immediately after `node` in its parent
    pub fn boundary_after(&self, node: NodeId) -> Option<Boundary> {
        let parent = self.parent(node)?;
        let index = self.children(parent).iter().position(|c| *c == node)?;
        Some(Boundary::new(parent, index + 1))
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    /// Last leaf before `point` inside the light subtree of `within`,
    /// skipping empty text nodes
    pub fn previous_leaf(&self, point: Boundary, within: NodeId) -> Option<NodeId> {
        let order = self.subtree(within);
        let before = self.boundary_position(&order, point, true);
        order[..before.min(order.len())]
            .iter()
            .rev()
            .copied()
            .filter(|id| *id != within && self.is_leaf(*id))
            .find(|id| self.text(*id).map_or(true, |t| !t.is_empty()))
    }
}
