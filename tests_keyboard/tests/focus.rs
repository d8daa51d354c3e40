//! Focus Coordination Integration Tests
//!
//! These tests validate the focus state machine as the page sees it:
//! - At most one focused target
//! - Blur waits out the grace delay and fires one change
//! - Stale targets swallow keys
//! - Scroll-into-view and the password type swap

use host_dom::DomEvent;
use input_types::{PadKind, VirtualKey};
use services_binder::SWAP_MARKER_ATTR;
use services_focus_manager::{FocusEvent, FocusPhase};
use services_keyboard::KeyboardMode;
use services_settings::{keys, SettingValue};
use tests_keyboard::PageBuilder;

fn two_inputs() -> tests_keyboard::Page {
    PageBuilder::new()
        .add("body", "input", "first", &[])
        .add("body", "input", "last", &[])
        .build()
}

#[test]
fn test_at_most_one_focused_target() {
    let mut page = two_inputs();

    page.focus("first");
    page.type_text("a");
    page.focus("last");

    assert_eq!(page.vk.focused().map(|t| t.node), Some(page.node("last")));
    assert_eq!(page.vk.coordinator().phase(), FocusPhase::FocusedLocal);
    // switching away flushed the first target's change
    assert_eq!(page.event_names("first").last(), Some(&"change"));
    assert!(page
        .vk
        .coordinator()
        .audit_trail()
        .iter()
        .any(|e| matches!(e, FocusEvent::Switched { .. })));

    page.type_text("b");
    assert_eq!(page.value("first"), "a");
    assert_eq!(page.value("last"), "b");
}

#[test]
fn test_blur_completes_after_grace_delay() {
    let mut page = two_inputs();

    page.focus("first");
    page.type_text("x");
    page.blur("first");
    page.advance(499);
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Letters);
    assert!(page.vk.focused().is_some());

    page.advance(1);
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Closed);
    assert_eq!(page.vk.coordinator().phase(), FocusPhase::Unfocused);
    let changes = page
        .event_names("first")
        .into_iter()
        .filter(|name| *name == "change")
        .count();
    assert_eq!(changes, 1);
}

#[test]
fn test_unchanged_target_fires_no_change() {
    let mut page = two_inputs();

    page.focus("first");
    page.blur("first");
    page.advance(500);

    assert!(!page.event_names("first").contains(&"change"));
}

#[test]
fn test_refocus_cancels_pending_blur() {
    let mut page = two_inputs();

    page.focus("first");
    page.blur("first");
    page.advance(300);
    page.click("first");
    page.advance(1000);

    assert_eq!(page.vk.focused().map(|t| t.node), Some(page.node("first")));
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Letters);
}

#[test]
fn test_blur_grace_from_settings() {
    let mut page = PageBuilder::new()
        .add("body", "input", "name", &[])
        .setting(keys::BLUR_GRACE_MS, SettingValue::Integer(50))
        .build();

    page.focus("name");
    page.blur("name");
    page.advance(50);
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Closed);
}

#[test]
fn test_removed_target_swallows_keys() {
    let mut page = two_inputs();

    page.focus("first");
    let node = page.node("first").node;
    page.doc_mut("first").remove(node).unwrap();
    page.press(VirtualKey::Char('x'));

    assert_eq!(page.value("first"), "");
    assert!(page.event_names("first").is_empty());
    assert_eq!(page.vk.coordinator().phase(), FocusPhase::Unfocused);
}

#[test]
fn test_click_on_covered_target_scrolls_into_view() {
    let mut page = two_inputs();

    // viewport 768, keyboard 260: the keyboard covers y > 508
    page.pointer("first", 20.0, 700.0);
    page.click("first");

    assert_eq!(page.vk.snapshot().scroll_y, 192.0);
    assert_eq!(page.vk.snapshot().height, 260.0);
}

#[test]
fn test_scroll_disabled_by_setting() {
    let mut page = PageBuilder::new()
        .add("body", "input", "name", &[])
        .setting(keys::INTELLIGENT_SCROLL, SettingValue::Boolean(false))
        .build();

    page.pointer("name", 20.0, 700.0);
    page.click("name");
    assert_eq!(page.vk.snapshot().scroll_y, 0.0);
}

#[test]
fn test_password_revealed_while_focused() {
    let mut page = PageBuilder::new()
        .add("body", "input", "secret", &[("type", "password")])
        .setting(keys::REVEAL_PASSWORD, SettingValue::Boolean(true))
        .build();
    let node = page.node("secret").node;

    page.focus("secret");
    assert_eq!(page.doc("secret").attribute(node, "type"), Some("text"));
    assert_eq!(page.doc("secret").attribute(node, SWAP_MARKER_ATTR), Some("password"));
    page.type_text("pw");

    page.blur("secret");
    page.advance(500);
    assert_eq!(page.doc("secret").attribute(node, "type"), Some("password"));
    assert_eq!(page.doc("secret").attribute(node, SWAP_MARKER_ATTR), None);
    assert_eq!(page.value("secret"), "pw");
}

#[test]
fn test_chrome_follows_target() {
    let mut page = PageBuilder::new()
        .add("body", "input", "age", &[("type", "number")])
        .add("body", "input", "mail", &[("type", "email")])
        .add("body", "div", "editor", &[("role", "textbox")])
        .build();

    page.focus("age");
    assert_eq!(page.vk.keyboard().chrome().pad, PadKind::Numeric);

    page.focus("mail");
    let chrome = page.vk.keyboard().chrome();
    assert_eq!(chrome.pad, PadKind::Letters);
    assert!(chrome.email_keys);

    page.focus("editor");
    assert!(page.vk.keyboard().chrome().rich_text);
    assert!(!page.vk.keyboard().chrome().email_keys);
}

#[test]
fn test_disabled_keyboard_ignores_intents() {
    let mut page = PageBuilder::new()
        .add("body", "input", "name", &[])
        .setting(keys::ENABLED, SettingValue::Boolean(false))
        .build();

    page.focus("name");
    page.click("name");
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Closed);
    assert!(page.vk.focused().is_none());
}

#[test]
fn test_close_key_blurs_immediately() {
    let mut page = two_inputs();

    page.focus("first");
    page.type_text("z");
    page.press(VirtualKey::Close);

    assert_eq!(page.vk.coordinator().phase(), FocusPhase::Unfocused);
    assert_eq!(
        page.doc("first").events_for(page.node("first").node).last(),
        Some(&&DomEvent::Change)
    );
}
