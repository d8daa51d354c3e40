//! Edits on value-carrying controls (inputs and textareas)
//!
//! Offsets are in characters. Controls that refuse selection
//! introspection are edited at the end of their value.

use core_types::NodeId;
use host_dom::{Document, DomError};

/// `(start, end, exact)`; `exact` is false when the control refused to
/// report its selection and the end of the value is used instead
fn selection(doc: &Document, node: NodeId, len: usize) -> (usize, usize, bool) {
    match doc.selection_range(node) {
        Ok((start, end)) => {
            let start = start.min(len);
            (start, end.min(len).max(start), true)
        }
        Err(err) => {
            tracing::debug!(target: "synth", node = %node, error = %err, "selection unavailable, editing at end");
            (len, len, false)
        }
    }
}

fn place_caret(doc: &mut Document, node: NodeId, at: usize) {
    if let Err(err) = doc.set_selection_range(node, at, at) {
        tracing::debug!(target: "synth", node = %node, error = %err, "caret not restored");
    }
}

/// Replaces the selection with `text`, truncated to the room `max_length`
/// leaves; returns what was actually inserted
pub fn insert(
    doc: &mut Document,
    node: NodeId,
    text: &str,
    max_length: Option<usize>,
) -> Result<Option<String>, DomError> {
    let value: Vec<char> = doc.value(node)?.chars().collect();
    let len = value.len();
    let (start, end, exact) = selection(doc, node, len);

    let kept = len - (end - start);
    let room = max_length.map_or(usize::MAX, |max| max.saturating_sub(kept));
    let inserted: String = text.chars().take(room).collect();
    if inserted.is_empty() {
        tracing::debug!(target: "synth", node = %node, ?max_length, "insert blocked by max length");
        return Ok(None);
    }

    let mut next: String = value[..start].iter().collect();
    next.push_str(&inserted);
    next.extend(&value[end..]);
    doc.set_value(node, &next)?;
    if exact {
        place_caret(doc, node, start + inserted.chars().count());
    }
    Ok(Some(inserted))
}

/// Deletes the selection, or the character before a collapsed caret;
/// returns whether anything was removed
pub fn delete_backward(doc: &mut Document, node: NodeId) -> Result<bool, DomError> {
    let value: Vec<char> = doc.value(node)?.chars().collect();
    let len = value.len();
    let (start, end, exact) = selection(doc, node, len);

    let (from, to) = if start != end {
        (start, end)
    } else if start > 0 {
        (start - 1, start)
    } else {
        return Ok(false);
    };

    let next: String = value[..from].iter().chain(&value[to..]).collect();
    doc.set_value(node, &next)?;
    if exact {
        place_caret(doc, node, from);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::DocumentId;

    fn control(tag: &str, attrs: &[(&str, &str)], value: &str) -> (Document, NodeId) {
        let mut doc = Document::new(DocumentId::from_raw(1));
        let body = doc.body();
        let node = doc.append_element(body, tag, attrs).unwrap();
        doc.set_value(node, value).unwrap();
        (doc, node)
    }

    #[test]
    fn test_insert_replaces_selection() {
        let (mut doc, node) = control("input", &[], "hello world");
        doc.set_selection_range(node, 6, 11).unwrap();
        insert(&mut doc, node, "there", None).unwrap();
        assert_eq!(doc.value(node).unwrap(), "hello there");
        assert_eq!(doc.selection_range(node).unwrap(), (11, 11));
    }

    #[test]
    fn test_caret_follows_insert() {
        let (mut doc, node) = control("textarea", &[], "ac");
        doc.set_selection_range(node, 1, 1).unwrap();
        insert(&mut doc, node, "b", None).unwrap();
        assert_eq!(doc.value(node).unwrap(), "abc");
        assert_eq!(doc.selection_range(node).unwrap(), (2, 2));
    }

    #[test]
    fn test_max_length_truncates_and_blocks() {
        let (mut doc, node) = control("input", &[], "ab");
        assert_eq!(
            insert(&mut doc, node, "cde", Some(3)).unwrap(),
            Some("c".to_string())
        );
        assert_eq!(insert(&mut doc, node, "d", Some(3)).unwrap(), None);
        assert_eq!(doc.value(node).unwrap(), "abc");
    }

    #[test]
    fn test_max_length_counts_replaced_selection() {
        let (mut doc, node) = control("input", &[], "abc");
        doc.set_selection_range(node, 0, 3).unwrap();
        insert(&mut doc, node, "xyz", Some(3)).unwrap();
        assert_eq!(doc.value(node).unwrap(), "xyz");
    }

    #[test]
    fn test_email_input_appends() {
        let (mut doc, node) = control("input", &[("type", "email")], "me");
        insert(&mut doc, node, "@", None).unwrap();
        assert_eq!(doc.value(node).unwrap(), "me@");
        assert!(delete_backward(&mut doc, node).unwrap());
        assert!(delete_backward(&mut doc, node).unwrap());
        assert_eq!(doc.value(node).unwrap(), "m");
    }

    #[test]
    fn test_backspace_collapsed_and_selection() {
        let (mut doc, node) = control("input", &[], "héllo");
        doc.set_selection_range(node, 2, 2).unwrap();
        assert!(delete_backward(&mut doc, node).unwrap());
        assert_eq!(doc.value(node).unwrap(), "hllo");
        assert_eq!(doc.selection_range(node).unwrap(), (1, 1));

        doc.set_selection_range(node, 1, 3).unwrap();
        assert!(delete_backward(&mut doc, node).unwrap());
        assert_eq!(doc.value(node).unwrap(), "ho");
    }

    #[test]
    fn test_backspace_at_start_is_noop() {
        let (mut doc, node) = control("input", &[], "x");
        doc.set_selection_range(node, 0, 0).unwrap();
        assert!(!delete_backward(&mut doc, node).unwrap());
        assert_eq!(doc.value(node).unwrap(), "x");
    }
}
