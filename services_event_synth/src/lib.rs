//! # Event Synthesizer
//!
//! Performs keyboard edits on an editable target and fires the events a
//! real keyboard would, so host scripts cannot tell the difference.
//!
//! ## Philosophy
//!
//! - **Native-equivalent**: `keydown → mutation → keypress → keyup → input →
//!   input(inputType)`, in that order, on the target itself
//! - **Never fails outward**: selection problems fall back to editing at the
//!   end of the value; DOM errors are logged, not returned
//! - **Stateless**: shift state is owned by the keyboard controller and
//!   passed in; the [`SynthOutcome`] says whether it was consumed
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - Text prediction or autocorrect
//! - An IME

pub mod rich_text;
mod sequence;
pub mod value;

use core_types::NodeId;
use host_dom::{Document, DomError, DomEvent, Host, InputType};
use input_types::{
    key_code_for_char, shift_transform, KeyAction, KEY_CODE_BACKSPACE, KEY_CODE_ENTER,
    KEY_CODE_SHIFT,
};
use crate::sequence::{Mutation, Stroke};
use services_binder::{EditableTarget, TargetKind};

/// What applying an action did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthOutcome {
    /// The target's content changed
    pub changed: bool,
    /// A one-shot shift was used up by an insertion
    pub consumed_shift: bool,
    /// An enclosing form was submitted
    pub submitted: bool,
    /// The keyboard should close
    pub close_keyboard: bool,
}

/// Event synthesizer
#[derive(Debug, Clone, Copy, Default)]
pub struct EventSynthesizer;

impl EventSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Applies `action` to `target`
    ///
    /// `shift` is the keyboard's one-shot shift; it upper-cases the first
    /// inserted character.
    pub fn apply(
        &self,
        host: &mut Host,
        target: &EditableTarget,
        action: &KeyAction,
        shift: bool,
    ) -> SynthOutcome {
        let Some(doc) = host.document_mut(target.node.document) else {
            tracing::debug!(target: "synth", node = %target.node, "target document gone");
            return SynthOutcome::default();
        };
        let node = target.node.node;

        let result = match action {
            KeyAction::InsertChar(c) => {
                let text = shift_transform(*c, shift);
                self.insert(doc, target, text).map(|changed| SynthOutcome {
                    changed,
                    consumed_shift: shift && changed,
                    ..SynthOutcome::default()
                })
            }
            KeyAction::InsertText(text) => {
                let mut chars = text.chars();
                let text = match chars.next() {
                    Some(first) => shift_transform(first, shift) + chars.as_str(),
                    None => return SynthOutcome::default(),
                };
                self.insert(doc, target, text).map(|changed| SynthOutcome {
                    changed,
                    consumed_shift: shift && changed,
                    ..SynthOutcome::default()
                })
            }
            KeyAction::Backspace => self.backspace(doc, target).map(|changed| SynthOutcome {
                changed,
                ..SynthOutcome::default()
            }),
            KeyAction::Enter => self.enter(doc, target),
            KeyAction::SetShift(on) => self.shift(doc, node, *on).map(|_| SynthOutcome::default()),
        };

        match result {
            Ok(outcome) => {
                tracing::debug!(
                    target: "synth",
                    node = %target.node,
                    action = %action,
                    changed = outcome.changed,
                    "applied key"
                );
                outcome
            }
            Err(err) => {
                tracing::warn!(
                    target: "synth",
                    node = %target.node,
                    action = %action,
                    error = %err,
                    "key not applied"
                );
                SynthOutcome::default()
            }
        }
    }

    fn insert(
        &self,
        doc: &mut Document,
        target: &EditableTarget,
        text: String,
    ) -> Result<bool, DomError> {
        let node = target.node.node;
        let first = text.chars().next().unwrap_or(' ');
        let stroke = Stroke {
            key: text.clone(),
            key_code: key_code_for_char(first),
            char_code: Some(first as u32),
        };

        let mutation = sequence::stroke(doc, node, stroke, |doc| {
            let inserted = match target.kind {
                TargetKind::RichText => rich_text::insert_text(doc, node, &text).map(|_| Some(text)),
                TargetKind::ValueInput | TargetKind::Textarea => {
                    value::insert(doc, node, &text, target.max_length)
                }
            };
            edited(inserted, InputType::InsertText)
        })?;
        Ok(mutation != Mutation::None)
    }

    fn backspace(&self, doc: &mut Document, target: &EditableTarget) -> Result<bool, DomError> {
        let node = target.node.node;
        let stroke = Stroke {
            key: "Backspace".to_string(),
            key_code: KEY_CODE_BACKSPACE,
            char_code: None,
        };
        let mutation = sequence::stroke(doc, node, stroke, |doc| {
            let deleted = match target.kind {
                TargetKind::RichText => rich_text::delete_backward(doc, node),
                TargetKind::ValueInput | TargetKind::Textarea => value::delete_backward(doc, node),
            };
            match deleted {
                Ok(true) => Mutation::Edited {
                    input_type: InputType::DeleteContentBackward,
                    data: None,
                },
                Ok(false) => Mutation::None,
                Err(err) => {
                    tracing::warn!(target: "synth", node = %node, error = %err, "delete failed");
                    Mutation::None
                }
            }
        })?;
        Ok(mutation != Mutation::None)
    }

    fn enter(&self, doc: &mut Document, target: &EditableTarget) -> Result<SynthOutcome, DomError> {
        let node = target.node.node;
        let stroke = Stroke {
            key: "Enter".to_string(),
            key_code: KEY_CODE_ENTER,
            char_code: Some(KEY_CODE_ENTER),
        };

        if target.kind == TargetKind::ValueInput {
            let mut submitted = false;
            sequence::stroke(doc, node, stroke, |doc| {
                submitted = submit_form(doc, node);
                Mutation::None
            })?;
            return Ok(SynthOutcome {
                submitted,
                close_keyboard: true,
                ..SynthOutcome::default()
            });
        }

        let mutation = sequence::stroke(doc, node, stroke, |doc| match target.kind {
            TargetKind::RichText => edited(
                rich_text::insert_line_break(doc, node).map(|_| Some("\n".to_string())),
                InputType::InsertLineBreak,
            ),
            _ => edited(
                value::insert(doc, node, "\n", target.max_length),
                InputType::InsertLineBreak,
            ),
        })?;
        Ok(SynthOutcome {
            changed: mutation != Mutation::None,
            ..SynthOutcome::default()
        })
    }

    fn shift(&self, doc: &mut Document, node: NodeId, on: bool) -> Result<(), DomError> {
        let key = "Shift".to_string();
        let event = if on {
            DomEvent::KeyDown {
                key,
                key_code: KEY_CODE_SHIFT,
            }
        } else {
            DomEvent::KeyUp {
                key,
                key_code: KEY_CODE_SHIFT,
            }
        };
        doc.dispatch(node, event)
    }
}

fn edited(result: Result<Option<String>, DomError>, input_type: InputType) -> Mutation {
    match result {
        Ok(Some(data)) => Mutation::Edited {
            input_type,
            data: Some(data),
        },
        Ok(None) => Mutation::None,
        Err(err) => {
            tracing::warn!(target: "synth", error = %err, "insert failed");
            Mutation::None
        }
    }
}

/// Submits the form enclosing `node`: clicks its first submit control if
/// it has one, else dispatches `submit` on the form itself
fn submit_form(doc: &mut Document, node: NodeId) -> bool {
    let Some(form) = doc.closest(node, "form") else {
        return false;
    };
    let button = doc
        .subtree(form)
        .into_iter()
        .find(|id| doc.element(*id).is_some_and(|el| el.is_submit_button()));
    let result = match button {
        Some(button) => doc.click(button),
        None => doc.dispatch(form, DomEvent::Submit),
    };
    match result {
        Ok(()) => {
            tracing::info!(target: "synth", form = %form, "form submitted");
            true
        }
        Err(err) => {
            tracing::warn!(target: "synth", form = %form, error = %err, "submit failed");
            false
        }
    }
}
