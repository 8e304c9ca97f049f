//! Declarative rules: types, loading, and evaluation.
//!
//! A rule file is JSON, either a top-level array of rules or an object with a
//! `rules` array:
//!
//! ```json
//! [
//!   {
//!     "description": "Archive old newsletters",
//!     "mode": "all",
//!     "conditions": [
//!       {"field": "from", "predicate": "contains", "value": "newsletter"},
//!       {"field": "date_received", "predicate": "greater_than_days", "value": 30}
//!     ],
//!     "actions": [{"type": "mark_read"}, {"type": "move_message", "mailbox": "ARCHIVE"}]
//!   }
//! ]
//! ```
//!
//! Loading never fails: a missing or malformed file yields an empty rule set,
//! and invalid rules or actions are dropped with a warning.

pub mod actions;
pub mod engine;
pub mod field;
pub mod predicate;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

pub use actions::{LabelDelta, resolve_actions};
pub use engine::RuleEngine;
pub use field::{Field, FieldValue, resolve_field};
pub use predicate::Predicate;

/// Why a single condition could not be evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("unknown predicate '{0}'")]
    UnknownPredicate(String),

    #[error("predicate '{predicate}' cannot compare {found}")]
    ValueMismatch {
        predicate: Predicate,
        found: String,
    },
}

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every condition must hold. An empty list always fires.
    #[default]
    All,
    /// At least one condition must hold. An empty list never fires.
    Any,
}

impl Mode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "all" => Some(Self::All),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

/// Comparison operand of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Integer(i64),
    Text(String),
    /// Anything else JSON allows. Never satisfies a predicate.
    Other(serde_json::Value),
}

impl Default for ConditionValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Other(v) => write!(f, "{v}"),
        }
    }
}

/// One field/predicate/value test.
///
/// Names stay as written in the rule file and are resolved during
/// evaluation, so an unknown name only affects the rule that uses it. A
/// missing name is read as empty and fails resolution the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub predicate: String,
    #[serde(default)]
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(field: &str, predicate: &str, value: impl Into<ConditionValue>) -> Self {
        Self {
            field: field.to_string(),
            predicate: predicate.to_string(),
            value: value.into(),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// A label mutation requested by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    MoveMessage { mailbox: String },
    MarkRead,
    MarkUnread,
}

impl Action {
    pub fn move_to(mailbox: &str) -> Self {
        Self::MoveMessage {
            mailbox: mailbox.to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveMessage { mailbox } => write!(f, "move_message({mailbox})"),
            Self::MarkRead => f.write_str("mark_read"),
            Self::MarkUnread => f.write_str("mark_unread"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub mode: Mode,
    pub description: Option<String>,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn new(mode: Mode, conditions: Vec<Condition>, actions: Vec<Action>) -> Self {
        Self {
            mode,
            description: None,
            conditions,
            actions,
        }
    }
}

// ── Rule file format ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleFile {
    List(Vec<RawRule>),
    Wrapped { rules: Vec<RawRule> },
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    conditions: Vec<Condition>,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    mailbox: Option<String>,
}

impl RawAction {
    fn into_action(self) -> Result<Action, String> {
        match self.kind.as_deref() {
            Some("move_message") => match self.mailbox {
                Some(mailbox) if !mailbox.is_empty() => Ok(Action::MoveMessage { mailbox }),
                _ => Err("move_message action has no mailbox".to_string()),
            },
            Some("mark_read") => Ok(Action::MarkRead),
            Some("mark_unread") => Ok(Action::MarkUnread),
            Some(other) => Err(format!("unknown action type '{other}'")),
            None => Err("action has no type".to_string()),
        }
    }
}

fn compile_rule(index: usize, raw: RawRule) -> Option<Rule> {
    let mode = match raw.mode.as_deref() {
        None => Mode::All,
        Some(name) => match Mode::parse(name) {
            Some(mode) => mode,
            None => {
                warn!(rule = index, mode = %name, "Unknown rule mode, rule will never fire");
                return None;
            }
        },
    };

    let actions = raw
        .actions
        .into_iter()
        .enumerate()
        .filter_map(|(action_index, action)| match action.into_action() {
            Ok(action) => Some(action),
            Err(reason) => {
                warn!(rule = index, action = action_index, %reason, "Skipping invalid action");
                None
            }
        })
        .collect();

    Some(Rule {
        mode,
        description: raw.description,
        conditions: raw.conditions,
        actions,
    })
}

/// Parse a rule document. Fails only on invalid JSON or a document that is
/// not a rule list; individual bad rules and actions are dropped.
pub fn parse_rules(json: &str) -> Result<Vec<Rule>, serde_json::Error> {
    let file: RuleFile = serde_json::from_str(json)?;
    let raw = match file {
        RuleFile::List(rules) | RuleFile::Wrapped { rules } => rules,
    };
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, rule)| compile_rule(index, rule))
        .collect())
}

/// Load rules from a file, degrading to an empty set on any failure.
pub fn load_rules(path: &Path) -> Vec<Rule> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(
                path = %path.display(),
                error = %e,
                "Rules file could not be read, no rules will be applied"
            );
            return Vec::new();
        }
    };

    match parse_rules(&content) {
        Ok(rules) if rules.is_empty() => {
            warn!(path = %path.display(), "Rules file is empty, no rules will be applied");
            rules
        }
        Ok(rules) => {
            info!(path = %path.display(), count = rules.len(), "Loaded rules");
            rules
        }
        Err(e) => {
            error!(
                path = %path.display(),
                error = %e,
                "Invalid JSON in rules file, no rules will be applied"
            );
            Vec::new()
        }
    }
}
