//! Native-equivalent event sequence around one edit

use core_types::NodeId;
use host_dom::{Document, DomError, DomEvent, InputType};

/// Key identity reported in keyboard events
#[derive(Debug, Clone)]
pub(crate) struct Stroke {
    pub key: String,
    pub key_code: u32,
    /// `None` for keys that produce no keypress
    pub char_code: Option<u32>,
}

/// What the mutation step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mutation {
    None,
    Edited {
        input_type: InputType,
        data: Option<String>,
    },
}

/// Runs `keydown → mutate → keypress → keyup → input → input(inputType)`
///
/// Input events are only fired when the mutation step edited something.
pub(crate) fn stroke<F>(
    doc: &mut Document,
    node: NodeId,
    stroke: Stroke,
    mutate: F,
) -> Result<Mutation, DomError>
where
    F: FnOnce(&mut Document) -> Mutation,
{
    doc.dispatch(
        node,
        DomEvent::KeyDown {
            key: stroke.key.clone(),
            key_code: stroke.key_code,
        },
    )?;

    let mutation = mutate(doc);

    if let Some(char_code) = stroke.char_code {
        doc.dispatch(
            node,
            DomEvent::KeyPress {
                key: stroke.key.clone(),
                char_code,
            },
        )?;
    }
    doc.dispatch(
        node,
        DomEvent::KeyUp {
            key: stroke.key,
            key_code: stroke.key_code,
        },
    )?;

    if let Mutation::Edited { input_type, data } = &mutation {
        doc.dispatch(
            node,
            DomEvent::Input {
                input_type: None,
                data: None,
            },
        )?;
        doc.dispatch(
            node,
            DomEvent::Input {
                input_type: Some(*input_type),
                data: data.clone(),
            },
        )?;
    }
    Ok(mutation)
}
