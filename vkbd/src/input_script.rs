//! # Scenario Script Parser
//!
//! Line-based scenario format for deterministic sessions and demos.
//!
//! ## Format
//!
//! Each line is one action:
//! - Page building: `add <parent> <tag> <id> [name=value ...]`,
//!   `text <parent> "<text>"`, `shadow <id>`, `attr <id> name=value`,
//!   `remove <id>`. A parent is `body`, an element id, or `<id>/shadow`
//!   for the shadow root of that element. Adding an `iframe` loads a
//!   same-origin document into it.
//! - Interaction: `pointer <id> <x> <y>`, `focus <id>`, `click <id>`,
//!   `blur [<id>]`, `select <id> <start> <end>`, `outside`
//! - Keyboard: `key <name>` (names as the layout format accepts),
//!   `type "<text>"` (one key press per character), `insert "<text>"`
//!   (voice input), `layout <id>`, `dismiss`, `url`
//! - Delays: `wait 100ms`, `wait 2s`
//! - Comments: `# This is a comment`
//!
//! Prefixing a line with `frame <frame-id>` runs it inside the document
//! loaded in that frame element.
//!
//! ## Example
//!
//! ```text
//! add body form f
//! add f input email type=email
//! focus email
//! type "me"
//! key @
//! key .com
//! key enter
//! wait 600ms
//! ```

use input_types::VirtualKey;
use std::collections::VecDeque;
use thiserror::Error;

/// Script error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Invalid key name: {0}")]
    InvalidKeyName(String),

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Empty script")]
    EmptyScript,

    #[error("Invalid delay format: {0}")]
    InvalidDelay(String),
}

/// One scenario action
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptAction {
    Add {
        parent: String,
        tag: String,
        id: String,
        attributes: Vec<(String, String)>,
    },
    Text {
        parent: String,
        text: String,
    },
    Shadow {
        host: String,
    },
    SetAttribute {
        id: String,
        name: String,
        value: String,
    },
    Remove {
        id: String,
    },
    Pointer {
        id: String,
        x: f64,
        y: f64,
    },
    Focus {
        id: String,
    },
    Click {
        id: String,
    },
    /// Blurs `id`, or the focused target when `None`
    Blur {
        id: Option<String>,
    },
    Select {
        id: String,
        start: usize,
        end: usize,
    },
    Outside,
    Key(VirtualKey),
    Insert(String),
    Layout(String),
    Dismiss,
    UrlBar,
    /// Advance the clock (in milliseconds)
    Wait(u64),
}

/// An action and the frame it runs in
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedInput {
    /// Id of the frame element, `None` for the top document
    pub frame: Option<String>,
    pub action: ScriptAction,
}

impl ScriptedInput {
    pub fn top(action: ScriptAction) -> Self {
        Self {
            frame: None,
            action,
        }
    }
}

/// Scenario script
#[derive(Debug, Clone, Default)]
pub struct InputScript {
    inputs: VecDeque<ScriptedInput>,
}

impl InputScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a script from text
    pub fn from_text(text: &str) -> Result<Self, ScriptError> {
        let mut inputs = VecDeque::new();

        for (line_num, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            inputs.extend(Self::parse_line(line, line_num + 1)?);
        }

        if inputs.is_empty() {
            return Err(ScriptError::EmptyScript);
        }

        Ok(Self { inputs })
    }

    fn parse_line(line: &str, line_num: usize) -> Result<Vec<ScriptedInput>, ScriptError> {
        let parse_error = |message: String| ScriptError::ParseError {
            line: line_num,
            message,
        };

        let (frame, line) = match line.strip_prefix("frame ") {
            Some(rest) => {
                let rest = rest.trim_start();
                let (id, command) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| parse_error("frame needs an id and a command".into()))?;
                (Some(id.to_string()), command.trim())
            }
            None => (None, line),
        };

        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(c, r)| (c, r.trim()));
        let args: Vec<&str> = rest.split_whitespace().collect();
        let arity = |n: usize| {
            if args.len() == n {
                Ok(())
            } else {
                Err(parse_error(format!(
                    "{} expects {} argument(s), got {}",
                    command,
                    n,
                    args.len()
                )))
            }
        };

        let actions: Vec<ScriptAction> = match command {
            "add" => {
                if args.len() < 3 {
                    return Err(parse_error("add expects <parent> <tag> <id>".into()));
                }
                let attributes = args[3..]
                    .iter()
                    .map(|pair| Self::parse_pair(pair).map_err(&parse_error))
                    .collect::<Result<Vec<_>, _>>()?;
                vec![ScriptAction::Add {
                    parent: args[0].to_string(),
                    tag: args[1].to_ascii_lowercase(),
                    id: args[2].to_string(),
                    attributes,
                }]
            }
            "text" => {
                let (parent, quoted) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| parse_error("text expects <parent> \"<text>\"".into()))?;
                vec![ScriptAction::Text {
                    parent: parent.to_string(),
                    text: Self::parse_quoted(quoted).map_err(&parse_error)?,
                }]
            }
            "shadow" => {
                arity(1)?;
                vec![ScriptAction::Shadow {
                    host: args[0].to_string(),
                }]
            }
            "attr" => {
                arity(2)?;
                let (name, value) = Self::parse_pair(args[1]).map_err(&parse_error)?;
                vec![ScriptAction::SetAttribute {
                    id: args[0].to_string(),
                    name,
                    value,
                }]
            }
            "remove" => {
                arity(1)?;
                vec![ScriptAction::Remove {
                    id: args[0].to_string(),
                }]
            }
            "pointer" => {
                arity(3)?;
                let coord = |s: &str| {
                    s.parse::<f64>()
                        .map_err(|_| parse_error(format!("invalid coordinate: {}", s)))
                };
                vec![ScriptAction::Pointer {
                    id: args[0].to_string(),
                    x: coord(args[1])?,
                    y: coord(args[2])?,
                }]
            }
            "focus" => {
                arity(1)?;
                vec![ScriptAction::Focus {
                    id: args[0].to_string(),
                }]
            }
            "click" => {
                arity(1)?;
                vec![ScriptAction::Click {
                    id: args[0].to_string(),
                }]
            }
            "blur" => {
                if args.len() > 1 {
                    return Err(parse_error("blur expects at most one id".into()));
                }
                vec![ScriptAction::Blur {
                    id: args.first().map(|s| s.to_string()),
                }]
            }
            "select" => {
                arity(3)?;
                let offset = |s: &str| {
                    s.parse::<usize>()
                        .map_err(|_| parse_error(format!("invalid offset: {}", s)))
                };
                vec![ScriptAction::Select {
                    id: args[0].to_string(),
                    start: offset(args[1])?,
                    end: offset(args[2])?,
                }]
            }
            "outside" => vec![ScriptAction::Outside],
            "dismiss" => vec![ScriptAction::Dismiss],
            "url" => vec![ScriptAction::UrlBar],
            "key" => {
                arity(1)?;
                let key = Self::parse_key(args[0]).map_err(|e| parse_error(e.to_string()))?;
                vec![ScriptAction::Key(key)]
            }
            "type" => Self::parse_quoted(rest)
                .map_err(&parse_error)?
                .chars()
                .map(|c| match c {
                    ' ' => ScriptAction::Key(VirtualKey::Space),
                    c => ScriptAction::Key(VirtualKey::Char(c)),
                })
                .collect(),
            "insert" => vec![ScriptAction::Insert(
                Self::parse_quoted(rest).map_err(&parse_error)?,
            )],
            "layout" => {
                arity(1)?;
                vec![ScriptAction::Layout(args[0].to_string())]
            }
            "wait" => {
                let millis = Self::parse_duration(rest).map_err(|e| parse_error(e.to_string()))?;
                vec![ScriptAction::Wait(millis)]
            }
            other => return Err(parse_error(format!("unknown command: {}", other))),
        };

        Ok(actions
            .into_iter()
            .map(|action| ScriptedInput {
                frame: frame.clone(),
                action,
            })
            .collect())
    }

    fn parse_key(name: &str) -> Result<VirtualKey, ScriptError> {
        VirtualKey::from_name(name).ok_or_else(|| ScriptError::InvalidKeyName(name.to_string()))
    }

    fn parse_quoted(s: &str) -> Result<String, String> {
        let s = s.trim();
        s.strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .map(str::to_string)
            .ok_or_else(|| format!("expected a quoted string, got {}", s))
    }

    fn parse_pair(s: &str) -> Result<(String, String), String> {
        s.split_once('=')
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .ok_or_else(|| format!("expected name=value, got {}", s))
    }

    /// Parses a duration string (e.g., "100ms", "1s")
    fn parse_duration(s: &str) -> Result<u64, ScriptError> {
        let s = s.trim().to_lowercase();

        if let Some(ms_str) = s.strip_suffix("ms") {
            ms_str
                .trim()
                .parse::<u64>()
                .map_err(|_| ScriptError::InvalidDelay(s.to_string()))
        } else if let Some(s_str) = s.strip_suffix('s') {
            s_str
                .trim()
                .parse::<u64>()
                .map(|s| s * 1000)
                .map_err(|_| ScriptError::InvalidDelay(s.to_string()))
        } else {
            Err(ScriptError::InvalidDelay(s.to_string()))
        }
    }

    /// Returns the next input, if any
    pub fn next_input(&mut self) -> Option<ScriptedInput> {
        self.inputs.pop_front()
    }

    pub fn has_more(&self) -> bool {
        !self.inputs.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.inputs.len()
    }
}
