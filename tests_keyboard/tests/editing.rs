//! Editing Integration Tests
//!
//! These tests validate what page scripts observe when keys are pressed:
//! - Selection replace and caret placement
//! - Max-length guard
//! - Shift is one-shot
//! - Enter submits single-line forms, breaks lines elsewhere
//! - The native event order

use host_dom::{DomEvent, InputType};
use input_types::VirtualKey;
use services_keyboard::KeyboardMode;
use tests_keyboard::PageBuilder;

#[test]
fn test_selection_replace_law() {
    let mut page = PageBuilder::new()
        .add("body", "input", "greeting", &[])
        .value("greeting", "hello world")
        .build();

    page.focus("greeting");
    page.select("greeting", 6, 11);
    page.vk.insert_text("there");

    assert_eq!(page.value("greeting"), "hello there");
    assert_eq!(page.caret("greeting"), (11, 11));
}

#[test]
fn test_cursor_follows_insert() {
    let mut page = PageBuilder::new()
        .add("body", "textarea", "notes", &[])
        .value("notes", "ac")
        .build();

    page.focus("notes");
    page.select("notes", 1, 1);
    page.press(VirtualKey::Char('b'));

    assert_eq!(page.value("notes"), "abc");
    assert_eq!(page.caret("notes"), (2, 2));
}

#[test]
fn test_max_length_guard() {
    let mut page = PageBuilder::new()
        .add("body", "input", "code", &[("maxlength", "3")])
        .value("code", "ab")
        .build();

    page.focus("code");
    page.press(VirtualKey::Char('c'));
    page.clear_journal("code");
    page.press(VirtualKey::Char('d'));

    assert_eq!(page.value("code"), "abc");
    // key events still fire, the blocked edit fires no input
    assert_eq!(page.event_names("code"), vec!["keydown", "keypress", "keyup"]);
}

#[test]
fn test_voice_insert_truncated_to_max_length() {
    let mut page = PageBuilder::new()
        .add("body", "input", "pin", &[("maxlength", "4")])
        .build();

    page.focus("pin");
    page.vk.insert_text("123456");
    assert_eq!(page.value("pin"), "1234");
}

#[test]
fn test_shift_is_one_shot() {
    let mut page = PageBuilder::new().add("body", "input", "name", &[]).build();

    page.focus("name");
    page.press(VirtualKey::Shift);
    assert!(page.vk.keyboard().state().shift);
    page.type_text("ada");

    assert_eq!(page.value("name"), "Ada");
    assert!(!page.vk.keyboard().state().shift);
}

#[test]
fn test_event_order_for_one_key() {
    let mut page = PageBuilder::new().add("body", "input", "name", &[]).build();

    page.focus("name");
    page.clear_journal("name");
    page.press(VirtualKey::Char('a'));

    let node = page.node("name").node;
    let events = page.doc("name").events_for(node);
    assert_eq!(
        events.iter().map(|e| e.name()).collect::<Vec<_>>(),
        vec!["keydown", "keypress", "keyup", "input", "input"]
    );
    assert_eq!(
        events[4],
        &DomEvent::Input {
            input_type: Some(InputType::InsertText),
            data: Some("a".into())
        }
    );
}

#[test]
fn test_backspace_has_no_keypress() {
    let mut page = PageBuilder::new()
        .add("body", "input", "name", &[])
        .value("name", "ab")
        .build();

    page.focus("name");
    page.clear_journal("name");
    page.press(VirtualKey::Backspace);

    assert_eq!(page.value("name"), "a");
    assert_eq!(
        page.event_names("name"),
        vec!["keydown", "keyup", "input", "input"]
    );
}

#[test]
fn test_enter_submits_single_line_form() {
    let mut page = PageBuilder::new()
        .add("body", "form", "login", &[])
        .add("login", "input", "user", &[])
        .add("login", "button", "go", &[])
        .build();

    page.focus("user");
    page.type_text("me");
    page.press(VirtualKey::Enter);

    assert_eq!(page.value("user"), "me");
    assert_eq!(page.event_names("go"), vec!["click"]);
    assert_eq!(page.event_names("login"), vec!["submit"]);
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Closed);
}

#[test]
fn test_enter_without_submit_button() {
    let mut page = PageBuilder::new()
        .add("body", "form", "search", &[])
        .add("search", "input", "q", &[("type", "search")])
        .add("search", "button", "reset", &[("type", "reset")])
        .build();

    page.focus("q");
    page.press(VirtualKey::Enter);

    assert!(page.event_names("reset").is_empty());
    assert_eq!(page.event_names("search"), vec!["submit"]);
}

#[test]
fn test_enter_in_textarea_inserts_newline() {
    let mut page = PageBuilder::new()
        .add("body", "form", "form", &[])
        .add("form", "textarea", "notes", &[])
        .add("form", "button", "send", &[])
        .build();

    page.focus("notes");
    page.type_text("a");
    page.press(VirtualKey::Enter);
    page.type_text("b");

    assert_eq!(page.value("notes"), "a\nb");
    assert!(page.event_names("form").is_empty());
    assert_eq!(page.vk.keyboard().mode(), KeyboardMode::Letters);
}

#[test]
fn test_rich_text_editing() {
    let mut page = PageBuilder::new()
        .add("body", "div", "editor", &[("contenteditable", "")])
        .text("editor", "hi")
        .build();

    page.focus("editor");
    page.type_text(" yo");
    page.press(VirtualKey::Enter);
    page.type_text("x");
    assert_eq!(page.rendered("editor"), "hi yo\nx");

    page.press(VirtualKey::Backspace);
    page.press(VirtualKey::Backspace);
    assert_eq!(page.rendered("editor"), "hi yo");
}

#[test]
fn test_selection_refusing_input_appends() {
    let mut page = PageBuilder::new()
        .add("body", "input", "mail", &[("type", "email")])
        .value("mail", "me")
        .build();

    page.focus("mail");
    page.press(VirtualKey::EmailAt);
    page.press(VirtualKey::DotCom);
    assert_eq!(page.value("mail"), "me@.com");

    page.press(VirtualKey::Backspace);
    assert_eq!(page.value("mail"), "me@.co");
}

#[test]
fn test_full_case_mapping() {
    let mut page = PageBuilder::new().add("body", "input", "street", &[]).build();

    page.focus("street");
    page.press(VirtualKey::Shift);
    page.press(VirtualKey::Char('ß'));
    assert_eq!(page.value("street"), "SS");
}
