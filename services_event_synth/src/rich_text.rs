//! Edits on rich-text regions, through the document selection
//!
//! When the selection is missing or lies outside the region, edits fall
//! back to the end of the region.

use core_types::NodeId;
use host_dom::{Boundary, Document, DomError, Range};

fn selection_within(doc: &Document, root: NodeId) -> Option<Range> {
    doc.selection().filter(|range| {
        doc.light_contains(root, range.start.node) && doc.light_contains(root, range.end.node)
    })
}

fn end_of(doc: &Document, root: NodeId) -> Boundary {
    Boundary::new(root, doc.children(root).len())
}

/// Collapsed point to insert at, after deleting any selected contents
fn insertion_point(doc: &mut Document, root: NodeId) -> Boundary {
    let Some(range) = selection_within(doc, root) else {
        tracing::debug!(target: "synth", root = %root, "no selection in region, appending");
        return end_of(doc, root);
    };
    match doc.delete_range_contents(range) {
        Ok(point) => point,
        Err(err) => {
            tracing::debug!(target: "synth", root = %root, error = %err, "selection unusable, appending");
            end_of(doc, root)
        }
    }
}

fn insert_node(doc: &mut Document, root: NodeId, node: NodeId) -> Result<(), DomError> {
    let point = insertion_point(doc, root);
    if let Err(err) = doc.insert_node_at(point, node) {
        tracing::debug!(target: "synth", root = %root, error = %err, "insert failed, appending");
        doc.append_child(root, node)?;
    }
    Ok(())
}

/// Inserts a text node at the selection; the caret ends up after it
pub fn insert_text(doc: &mut Document, root: NodeId, text: &str) -> Result<(), DomError> {
    let node = doc.create_text(text);
    insert_node(doc, root, node)?;
    doc.set_selection(Range::collapsed_at(Boundary::new(node, text.chars().count())));
    Ok(())
}

/// Inserts a line-break element at the selection; the caret ends up after it
pub fn insert_line_break(doc: &mut Document, root: NodeId) -> Result<(), DomError> {
    let br = doc.create_element("br");
    insert_node(doc, root, br)?;
    if let Some(after) = doc.boundary_after(br) {
        doc.set_selection(Range::collapsed_at(after));
    }
    Ok(())
}

/// Deletes the selection, or the character or line break before a
/// collapsed caret; returns whether anything was removed
pub fn delete_backward(doc: &mut Document, root: NodeId) -> Result<bool, DomError> {
    let point = match selection_within(doc, root) {
        Some(range) if !range.is_collapsed() => {
            let point = doc.delete_range_contents(range)?;
            doc.set_selection(Range::collapsed_at(point));
            return Ok(true);
        }
        Some(range) => range.start,
        None => end_of(doc, root),
    };

    if doc.text(point.node).is_some() && point.offset > 0 {
        doc.delete_text(point.node, point.offset - 1, 1)?;
        doc.set_selection(Range::collapsed_at(Boundary::new(point.node, point.offset - 1)));
        return Ok(true);
    }

    let Some(leaf) = doc.previous_leaf(point, root) else {
        return Ok(false);
    };
    if let Some(len) = doc.text(leaf).map(|t| t.chars().count()) {
        doc.delete_text(leaf, len - 1, 1)?;
        doc.set_selection(Range::collapsed_at(Boundary::new(leaf, len - 1)));
        return Ok(true);
    }
    if doc.tag(leaf) == Some("br") {
        let parent = doc.parent(leaf);
        let index = parent.and_then(|p| doc.children(p).iter().position(|c| *c == leaf));
        doc.remove(leaf)?;
        if let (Some(parent), Some(index)) = (parent, index) {
            doc.set_selection(Range::collapsed_at(Boundary::new(parent, index)));
        }
        return Ok(true);
    }
    Ok(false)
}
