//! Events observed by host scripts

use core_types::NodeId;
use serde::{Deserialize, Serialize};

/// `inputType` carried by the specific input event fired after an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputType {
    InsertText,
    InsertLineBreak,
    DeleteContentBackward,
}

impl InputType {
    /// Returns the DOM name of this input type
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::InsertText => "insertText",
            InputType::InsertLineBreak => "insertLineBreak",
            InputType::DeleteContentBackward => "deleteContentBackward",
        }
    }
}

/// A native-equivalent event dispatched on a host node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomEvent {
    KeyDown { key: String, key_code: u32 },
    KeyPress { key: String, char_code: u32 },
    KeyUp { key: String, key_code: u32 },
    /// `input_type` is `None` for the generic input event
    Input {
        input_type: Option<InputType>,
        data: Option<String>,
    },
    Change,
    Click,
    Submit,
}

impl DomEvent {
    /// Returns the DOM event name
    pub fn name(&self) -> &'static str {
        match self {
            DomEvent::KeyDown { .. } => "keydown",
            DomEvent::KeyPress { .. } => "keypress",
            DomEvent::KeyUp { .. } => "keyup",
            DomEvent::Input { .. } => "input",
            DomEvent::Change => "change",
            DomEvent::Click => "click",
            DomEvent::Submit => "submit",
        }
    }
}

/// Journal entry: an event and the node it was dispatched on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedEvent {
    pub target: NodeId,
    pub event: DomEvent,
}

/// Kinds of listener the keyboard attaches to an editable target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ListenerKind {
    PointerDown,
    Focus,
    Click,
    Blur,
}

impl ListenerKind {
    /// The full set attached to every bound target
    pub const ALL: [ListenerKind; 4] = [
        ListenerKind::PointerDown,
        ListenerKind::Focus,
        ListenerKind::Click,
        ListenerKind::Blur,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(DomEvent::Change.name(), "change");
        assert_eq!(
            DomEvent::KeyDown {
                key: "a".into(),
                key_code: 65
            }
            .name(),
            "keydown"
        );
        assert_eq!(InputType::DeleteContentBackward.as_str(), "deleteContentBackward");
    }

    #[test]
    fn test_dispatched_event_serialization() {
        let entry = DispatchedEvent {
            target: NodeId::from_raw(4),
            event: DomEvent::Input {
                input_type: Some(InputType::InsertText),
                data: Some("x".into()),
            },
        };
        let json = serde_json::to_string(&entry).unwrap();
        let decoded: DispatchedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, entry);
    }
}
