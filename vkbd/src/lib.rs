//! # Virtual Keyboard Runtime
//!
//! Injects the on-screen keyboard into a host page and runs it.
//!
//! ## Philosophy
//!
//! - **The page is the source of truth**: Edits go through the page's own
//!   elements and events, never a shadow copy of its text
//! - **Messages are explicit**: Nested documents talk to the top context
//!   only through the bus, and only when pumped
//! - **Time is virtual**: Blur grace and overlay delays advance with
//!   [`VirtualKeyboard::advance`], which keeps sessions deterministic
//!
//! ## Responsibilities
//!
//! The runtime:
//! - Installs the keyboard widget and binds editable targets
//! - Starts a context per same-origin nested document
//! - Routes host interactions to the focus coordinator
//! - Turns key presses into synthesized edits
//! - Replays scenario scripts for demos and tests
//!
//! ## Non-Responsibilities
//!
//! The runtime does NOT:
//! - Render the keyboard (the widget only mirrors its mode)
//! - Reach into cross-origin documents
//! - Predict or auto-correct text

pub mod engine;
pub mod input_script;
pub mod runtime;

pub use engine::{edit_action, NestedContext, Snapshot, VirtualKeyboard, MODE_ATTR, URL_BAR_ID, WIDGET_ID};
pub use input_script::{InputScript, ScriptAction, ScriptError, ScriptedInput};
pub use runtime::{Runtime, RuntimeConfig, RuntimeError};
