//! # Scenario Runtime
//!
//! Drives a [`VirtualKeyboard`] from a scenario script, one action per
//! step, on a fresh host page.

use crate::engine::{edit_action, Snapshot, VirtualKeyboard};
use crate::input_script::{InputScript, ScriptAction, ScriptError, ScriptedInput};
use core_types::{DocumentId, NodeId, NodeRef};
use host_dom::{Document, DomError, Host};
use input_types::KeyAction;
use services_keyboard::{LayoutError, StaticLayouts};
use services_relay::RelayError;
use services_settings::{create_default_registry, PersistenceError};
use std::path::PathBuf;
use thiserror::Error;

/// Runtime error types
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Settings error: {0}")]
    Settings(#[from] PersistenceError),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("No element with id '{0}'")]
    ElementNotFound(String),

    #[error("No frame element with id '{0}'")]
    FrameNotFound(String),

    #[error("No nested context for document {0}")]
    NoNestedContext(DocumentId),

    #[error("Key cannot be sent from a nested document: {0}")]
    NotAnEditKey(String),
}

/// Runtime configuration
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Scenario script text
    pub script: Option<String>,
    /// Settings overrides file, loaded at start and saved at the end
    pub settings_path: Option<PathBuf>,
    /// Maximum steps to run (0 = unlimited)
    pub max_steps: usize,
}

/// Scenario runtime
pub struct Runtime {
    config: RuntimeConfig,
    keyboard: VirtualKeyboard,
    script: Option<InputScript>,
    steps: usize,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let mut settings = create_default_registry();
        if let Some(path) = &config.settings_path {
            settings.load_from_path(path)?;
        }

        let script = config
            .script
            .as_deref()
            .map(InputScript::from_text)
            .transpose()?;

        let keyboard = VirtualKeyboard::new(Host::new(), settings, StaticLayouts::builtin())?;

        Ok(Self {
            config,
            keyboard,
            script,
            steps: 0,
        })
    }

    /// Runs until the script is exhausted or the step limit is reached,
    /// then saves settings back
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            if self.config.max_steps > 0 && self.steps >= self.config.max_steps {
                tracing::info!(target: "runtime", steps = self.steps, "step limit reached");
                break;
            }
            if !self.script.as_ref().is_some_and(InputScript::has_more) {
                break;
            }
            self.step()?;
            self.steps += 1;
        }

        if let Some(path) = &self.config.settings_path {
            self.keyboard.settings().save_to_path(path)?;
        }
        Ok(())
    }

    /// Executes the next scripted action and pumps
    pub fn step(&mut self) -> Result<(), RuntimeError> {
        let Some(input) = self.script.as_mut().and_then(InputScript::next_input) else {
            return Ok(());
        };
        self.execute(input)?;
        self.keyboard.pump();
        Ok(())
    }

    /// Executes one action without pumping
    pub fn execute(&mut self, input: ScriptedInput) -> Result<(), RuntimeError> {
        tracing::debug!(target: "runtime", frame = ?input.frame, action = ?input.action, "step");
        let frame = input.frame.as_deref();
        match input.action {
            ScriptAction::Add {
                parent,
                tag,
                id,
                attributes,
            } => {
                let parent = self.resolve_parent(frame, &parent)?;
                let mut attrs: Vec<(&str, &str)> = vec![("id", id.as_str())];
                attrs.extend(attributes.iter().map(|(n, v)| (n.as_str(), v.as_str())));
                let doc = self.keyboard.host_mut().require_mut(parent.document)?;
                let node = doc.append_element(parent.node, &tag, &attrs)?;
                if tag == "iframe" {
                    let frame_ref = doc.node_ref(node);
                    self.keyboard.host_mut().create_nested_document(frame_ref)?;
                }
            }
            ScriptAction::Text { parent, text } => {
                let parent = self.resolve_parent(frame, &parent)?;
                self.keyboard
                    .host_mut()
                    .require_mut(parent.document)?
                    .append_text(parent.node, &text)?;
            }
            ScriptAction::Shadow { host } => {
                let host = self.resolve(frame, &host)?;
                self.keyboard.attach_shadow(host)?;
            }
            ScriptAction::SetAttribute { id, name, value } => {
                let node = self.resolve(frame, &id)?;
                self.keyboard
                    .host_mut()
                    .require_mut(node.document)?
                    .set_attribute(node.node, &name, &value)?;
                self.keyboard.reclassify(node);
            }
            ScriptAction::Remove { id } => {
                let node = self.resolve(frame, &id)?;
                self.keyboard
                    .host_mut()
                    .require_mut(node.document)?
                    .remove(node.node)?;
            }
            ScriptAction::Pointer { id, x, y } => {
                let node = self.resolve(frame, &id)?;
                self.keyboard.pointer_down(node, x, y);
            }
            ScriptAction::Focus { id } => {
                let node = self.resolve(frame, &id)?;
                self.keyboard.focus(node)?;
            }
            ScriptAction::Click { id } => {
                let node = self.resolve(frame, &id)?;
                self.keyboard.click(node)?;
            }
            ScriptAction::Blur { id: Some(id) } => {
                let node = self.resolve(frame, &id)?;
                self.keyboard.blur(node)?;
            }
            ScriptAction::Blur { id: None } => {
                if let Some(node) = self.keyboard.focused().map(|t| t.node) {
                    self.keyboard.blur(node)?;
                }
            }
            ScriptAction::Select { id, start, end } => {
                let node = self.resolve(frame, &id)?;
                self.keyboard
                    .host_mut()
                    .require_mut(node.document)?
                    .set_selection_range(node.node, start, end)?;
            }
            ScriptAction::Outside => {
                let body = self.keyboard.host().top().body();
                let body = NodeRef::new(self.keyboard.host().top_id(), body);
                self.keyboard.click(body)?;
            }
            ScriptAction::Key(key) => match frame {
                None => {
                    self.keyboard.press_key(&key);
                }
                Some(frame) => {
                    let action = edit_action(&key)
                        .ok_or_else(|| RuntimeError::NotAnEditKey(format!("{:?}", key)))?;
                    let document = self.frame_document(frame)?;
                    self.keyboard.nested_key(document, action)?;
                }
            },
            ScriptAction::Insert(text) => match frame {
                None => {
                    self.keyboard.insert_text(&text);
                }
                Some(frame) => {
                    let document = self.frame_document(frame)?;
                    self.keyboard
                        .nested_key(document, KeyAction::InsertText(text))?;
                }
            },
            ScriptAction::Layout(id) => self.keyboard.choose_layout(&id)?,
            ScriptAction::Dismiss => self.keyboard.dismiss_overlay(),
            ScriptAction::UrlBar => self.keyboard.request_url_bar()?,
            ScriptAction::Wait(millis) => {
                self.keyboard.advance(millis);
            }
        }
        Ok(())
    }

    /// Content document of the top-level frame element with `id`
    fn frame_document(&self, id: &str) -> Result<DocumentId, RuntimeError> {
        let host = self.keyboard.host();
        let top = host.top();
        top.find_by_attribute("id", id)
            .and_then(|frame| host.content_document(top.node_ref(frame)))
            .ok_or_else(|| RuntimeError::FrameNotFound(id.to_string()))
    }

    fn document(&self, frame: Option<&str>) -> Result<&Document, RuntimeError> {
        let document = match frame {
            Some(frame) => self.frame_document(frame)?,
            None => self.keyboard.host().top_id(),
        };
        Ok(self.keyboard.host().require(document)?)
    }

    /// Element with `id` in the top document or in `frame`'s document
    fn resolve(&self, frame: Option<&str>, id: &str) -> Result<NodeRef, RuntimeError> {
        let doc = self.document(frame)?;
        doc.find_by_attribute("id", id)
            .map(|node| doc.node_ref(node))
            .ok_or_else(|| RuntimeError::ElementNotFound(id.to_string()))
    }

    /// `body`, an element id, or `<id>/shadow`
    fn resolve_parent(&self, frame: Option<&str>, parent: &str) -> Result<NodeRef, RuntimeError> {
        let doc = self.document(frame)?;
        let node: Option<NodeId> = match parent {
            "body" => Some(doc.body()),
            _ => match parent.strip_suffix("/shadow") {
                Some(host) => {
                    let host = self.resolve(frame, host)?;
                    doc.shadow_root(host.node)
                }
                None => return self.resolve(frame, parent),
            },
        };
        node.map(|node| doc.node_ref(node))
            .ok_or_else(|| RuntimeError::ElementNotFound(parent.to_string()))
    }

    pub fn keyboard(&self) -> &VirtualKeyboard {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut VirtualKeyboard {
        &mut self.keyboard
    }

    pub fn snapshot(&self) -> Snapshot {
        self.keyboard.snapshot()
    }

    pub fn step_count(&self) -> usize {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use services_keyboard::KeyboardMode;
    use services_settings::{keys, SettingKey, SettingValue, SettingsStore};

    fn runtime(script: &str) -> Runtime {
        Runtime::new(RuntimeConfig {
            script: Some(script.to_string()),
            ..RuntimeConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_runtime_without_script() {
        let mut runtime = Runtime::new(RuntimeConfig::default()).unwrap();
        runtime.run().unwrap();
        assert_eq!(runtime.step_count(), 0);
        assert_eq!(runtime.snapshot().mode, KeyboardMode::Closed);
    }

    #[test]
    fn test_invalid_script_is_rejected() {
        let result = Runtime::new(RuntimeConfig {
            script: Some("jump".into()),
            ..RuntimeConfig::default()
        });
        assert!(matches!(result, Err(RuntimeError::Script(_))));
    }

    #[test]
    fn test_scripted_email_session() {
        let mut runtime = runtime(
            r#"
            add body form f
            add f input email type=email
            add f button go
            focus email
            type "me"
            key @
            key .com
            "#,
        );
        runtime.run().unwrap();
        let snapshot = runtime.snapshot();
        assert_eq!(snapshot.mode, KeyboardMode::Letters);
        assert_eq!(snapshot.text.as_deref(), Some("me@.com"));
        assert!(runtime.keyboard().keyboard().chrome().email_keys);
    }

    #[test]
    fn test_max_steps() {
        let mut runtime = Runtime::new(RuntimeConfig {
            script: Some("add body input a\nfocus a\ntype \"abc\"".into()),
            max_steps: 3,
            ..RuntimeConfig::default()
        })
        .unwrap();
        runtime.run().unwrap();
        assert_eq!(runtime.step_count(), 3);
        assert_eq!(runtime.snapshot().text.as_deref(), Some("a"));
    }

    #[test]
    fn test_unknown_element_fails_step() {
        let mut runtime = runtime("focus missing");
        assert!(matches!(
            runtime.run(),
            Err(RuntimeError::ElementNotFound(id)) if id == "missing"
        ));
    }

    #[test]
    fn test_frame_scoped_actions() {
        let mut runtime = runtime(
            r#"
            add body iframe f1
            frame f1 add body textarea notes
            frame f1 focus notes
            type "hi"
            frame f1 insert " there"
            "#,
        );
        runtime.run().unwrap();
        let snapshot = runtime.snapshot();
        assert_eq!(snapshot.text.as_deref(), Some("hi there"));
        assert_eq!(
            snapshot.phase,
            services_focus_manager::FocusPhase::FocusedRemote
        );
    }

    #[test]
    fn test_shadow_parent() {
        let mut runtime = runtime(
            r#"
            add body div card
            shadow card
            add card/shadow input inner
            focus inner
            type "x"
            "#,
        );
        runtime.run().unwrap();
        assert_eq!(runtime.snapshot().text.as_deref(), Some("x"));
    }

    #[test]
    fn test_unreadable_settings_file_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let result = Runtime::new(RuntimeConfig {
            script: None,
            settings_path: Some(dir.path().to_path_buf()),
            max_steps: 0,
        });
        assert!(matches!(
            result,
            Err(RuntimeError::Settings(PersistenceError::Io(_)))
        ));
    }

    #[test]
    fn test_settings_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut registry = create_default_registry();
        registry
            .set_override(
                keys::LAYOUTS,
                SettingValue::StringList(vec!["en".into(), "de".into()]),
            )
            .unwrap();
        registry.save_to_path(&path).unwrap();

        let mut runtime = Runtime::new(RuntimeConfig {
            script: Some("add body input a\nfocus a\nkey layouts\nlayout de".into()),
            settings_path: Some(path.clone()),
            max_steps: 0,
        })
        .unwrap();
        runtime.run().unwrap();

        let mut reloaded = create_default_registry();
        reloaded.load_from_path(&path).unwrap();
        let layout = reloaded.get(&[SettingKey::new(keys::LAYOUT)]);
        assert_eq!(layout[0].1, SettingValue::String("de".into()));
    }
}
