//! Cross-Context Integration Tests
//!
//! These tests validate nested documents borrowing the top keyboard:
//! - Open, key and blur across the frame boundary
//! - Keys before any open are ignored
//! - Reordered and duplicated envelopes are harmless
//! - State broadcasts reach nested contexts
//! - Frames nested inside nested documents

use core_types::FrameId;
use input_types::{KeyAction, VirtualKey};
use ipc::{MessageEnvelope, RelayMessage};
use services_focus_manager::FocusPhase;
use services_keyboard::KeyboardMode;
use services_relay::FRAME_ID_ATTR;
use services_settings::{keys, SettingValue};
use tests_keyboard::{Page, PageBuilder};

fn framed() -> Page {
    PageBuilder::new()
        .add("body", "input", "search", &[])
        .frame("body", "chat")
        .add("chat", "input", "message", &[])
        .build()
}

#[test]
fn test_nested_focus_opens_top_keyboard() {
    let mut page = framed();

    page.focus("message");
    assert_eq!(page.vk.coordinator().phase(), FocusPhase::FocusedRemote);
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Letters);

    page.type_text("hi there");
    assert_eq!(page.value("message"), "hi there");
    assert_eq!(
        page.event_names("message")[..5],
        ["keydown", "keypress", "keyup", "input", "input"]
    );
}

#[test]
fn test_nested_key_before_open_is_ignored() {
    let mut page = framed();

    page.post_nested_key("chat", KeyAction::InsertChar('x'));
    page.vk.pump();

    assert_eq!(page.value("message"), "");
    assert!(page.vk.focused().is_none());
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Closed);
}

#[test]
fn test_reordered_key_dropped_then_open_applies() {
    let mut page = framed();
    let message = page.node("message");

    page.vk.focus(message).unwrap();
    page.post_nested_key("chat", KeyAction::InsertChar('x'));
    page.vk.bus_mut().reverse_pending();
    page.vk.pump();

    assert_eq!(page.value("message"), "");
    assert_eq!(page.vk.focused().map(|t| t.node), Some(message));

    page.post_nested_key("chat", KeyAction::InsertChar('y'));
    page.vk.pump();
    assert_eq!(page.value("message"), "y");
}

#[test]
fn test_duplicated_envelopes_apply_once() {
    let mut page = framed();
    let message = page.node("message");

    page.vk.focus(message).unwrap();
    page.post_nested_key("chat", KeyAction::InsertText("ok".into()));
    page.vk.bus_mut().duplicate_pending();
    assert_eq!(page.vk.bus_mut().pending_len(), 4);
    page.vk.pump();

    assert_eq!(page.value("message"), "ok");
}

#[test]
fn test_key_from_unfocused_frame_is_dropped() {
    let mut page = PageBuilder::new()
        .frame("body", "left")
        .add("left", "input", "a", &[])
        .frame("body", "right")
        .add("right", "input", "b", &[])
        .build();

    page.focus("b");
    page.focus("a");
    page.post_nested_key("right", KeyAction::InsertChar('z'));
    page.vk.pump();

    assert_eq!(page.value("a"), "");
    assert_eq!(page.value("b"), "");
}

#[test]
fn test_nested_blur_closes_after_grace() {
    let mut page = framed();

    page.focus("message");
    page.type_text("x");
    page.blur("message");
    page.advance(499);
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Letters);

    page.advance(1);
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Closed);
    assert_eq!(page.event_names("message").last(), Some(&"change"));
}

#[test]
fn test_state_broadcast_reaches_nested_context() {
    let mut page = framed();
    let document = page.frame_document("chat");
    let open = |page: &Page| page.vk.nested(document).unwrap().relay.keyboard_open();

    assert!(!open(&page));
    page.focus("search");
    assert!(open(&page));
    page.press(VirtualKey::Close);
    assert!(!open(&page));
}

#[test]
fn test_focus_moves_between_contexts() {
    let mut page = framed();

    page.focus("message");
    page.type_text("a");
    page.focus("search");
    page.type_text("b");

    assert_eq!(page.vk.coordinator().phase(), FocusPhase::FocusedLocal);
    assert_eq!(page.value("message"), "a");
    assert_eq!(page.value("search"), "b");
    assert_eq!(page.event_names("message").last(), Some(&"change"));
}

#[test]
fn test_nested_click_scrolls_nested_document() {
    let mut page = framed();

    page.pointer("message", 10.0, 600.0);
    page.click("message");

    assert_eq!(page.vk.coordinator().phase(), FocusPhase::FocusedRemote);
    assert_eq!(page.doc("message").viewport().scroll_y, 92.0);
    assert_eq!(page.vk.host().top().viewport().scroll_y, 0.0);
}

#[test]
fn test_open_envelope_survives_the_wire() {
    let mut page = framed();
    let message = page.node("message");

    page.vk.focus(message).unwrap();
    let posted = page.vk.bus_mut().drain();
    assert_eq!(posted.len(), 1);

    let json = serde_json::to_string(&posted[0]).unwrap();
    let decoded: MessageEnvelope = serde_json::from_str(&json).unwrap();
    let relayed = RelayMessage::from_envelope(&decoded).unwrap();
    assert_eq!(relayed, RelayMessage::from_envelope(&posted[0]).unwrap());
    assert!(matches!(relayed, RelayMessage::OpenFromNested { force: true, .. }));
}

fn frame_id(page: &Page, frame: &str) -> Option<FrameId> {
    page.doc(frame)
        .attribute(page.node(frame).node, FRAME_ID_ATTR)
        .map(FrameId::from_string)
}

#[test]
fn test_doubly_nested_target_borrows_top_keyboard() {
    let mut page = PageBuilder::new()
        .frame("body", "outer")
        .frame("outer", "inner")
        .add("inner", "input", "deep", &[])
        .build();
    assert_eq!(page.vk.nested_documents().len(), 2);

    page.focus("deep");
    assert_eq!(page.vk.coordinator().phase(), FocusPhase::FocusedRemote);
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Letters);
    assert_eq!(page.vk.focused().map(|t| t.node), Some(page.node("deep")));

    page.type_text("ok");
    assert_eq!(page.value("deep"), "ok");

    // only the frame that hosts the target carries an id
    let inner = frame_id(&page, "inner").unwrap();
    assert!(frame_id(&page, "outer").is_none());
    assert!(page.vk.top_relay().resolved(&inner).is_some());
}

#[test]
fn test_removed_frame_is_forgotten() {
    let mut page = framed();

    page.focus("message");
    let chat = frame_id(&page, "chat").unwrap();
    assert!(page.vk.top_relay().resolved(&chat).is_some());

    let frame = page.node("chat").node;
    page.doc_mut("chat").remove(frame).unwrap();
    page.vk.pump();

    assert!(page.vk.top_relay().resolved(&chat).is_none());
    page.press(VirtualKey::Char('x'));
    assert_eq!(page.value("message"), "");
}

#[test]
fn test_open_button_in_frame_follows_keyboard_and_setting() {
    let mut page = framed();
    let document = page.frame_document("chat");
    let visible = |page: &Page| page.vk.nested(document).unwrap().relay.open_button_visible();

    assert!(visible(&page));
    page.focus("message");
    assert!(!visible(&page));
    page.press(VirtualKey::Close);
    assert!(visible(&page));

    page.vk
        .settings_mut()
        .set_override(keys::SHOW_OPEN_BUTTON, SettingValue::Boolean(false))
        .unwrap();
    page.vk.reload_settings();
    assert!(!visible(&page));
}
