//! Rule definitions and the JSON document they are loaded from.

pub mod engine;
pub mod field;
pub mod predicate;

use crate::error::RuleError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

impl MatchMode {
    /// Unrecognized modes fall back to `All`, which never broadens a match.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "all" => MatchMode::All,
            "any" => MatchMode::Any,
            other => {
                warn!("Unknown rule predicate {:?}; using All", other);
                MatchMode::All
            }
        }
    }

    pub fn combine(self, results: impl IntoIterator<Item = bool>) -> bool {
        let mut results = results.into_iter();
        match self {
            MatchMode::All => results.all(|r| r),
            MatchMode::Any => results.any(|r| r),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::All => f.write_str("All"),
            MatchMode::Any => f.write_str("Any"),
        }
    }
}

/// Any JSON value is accepted here; whether it suits the predicate is decided when the
/// condition is evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Other(serde_json::Value),
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Integer(n) => write!(f, "{n}"),
            ConditionValue::Float(n) => write!(f, "{n}"),
            ConditionValue::Bool(b) => write!(f, "{b}"),
            ConditionValue::Text(s) => f.write_str(s),
            ConditionValue::Other(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub predicate: String,
    #[serde(default)]
    pub value: Option<ConditionValue>,
}

impl Condition {
    pub fn new(field: &str, predicate: &str, value: ConditionValue) -> Self {
        Self {
            field: field.to_string(),
            predicate: predicate.to_string(),
            value: Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ActionSpec")]
pub enum Action {
    MarkAsRead,
    MarkAsUnread,
    MoveToLabel { label: Option<String> },
    Unknown(String),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::MarkAsRead => "mark_as_read",
            Action::MarkAsUnread => "mark_as_unread",
            Action::MoveToLabel { .. } => "move_to_label",
            Action::Unknown(name) => name,
        }
    }
}

#[derive(Deserialize)]
struct ActionSpec {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

impl From<ActionSpec> for Action {
    fn from(spec: ActionSpec) -> Self {
        let name = spec.action.unwrap_or_default();
        match name.trim().to_lowercase().as_str() {
            "mark_as_read" => Action::MarkAsRead,
            "mark_as_unread" => Action::MarkAsUnread,
            "move_to_label" => Action::MoveToLabel { label: spec.label },
            _ => Action::Unknown(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RuleSpec")]
pub struct Rule {
    pub name: String,
    pub match_mode: MatchMode,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

#[derive(Deserialize)]
struct RuleSpec {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    predicate: Option<String>,
    #[serde(default)]
    conditions: Vec<Condition>,
    #[serde(default)]
    actions: Vec<Action>,
}

impl From<RuleSpec> for Rule {
    fn from(spec: RuleSpec) -> Self {
        Rule {
            name: spec.name.unwrap_or_else(|| "<unnamed>".to_string()),
            match_mode: spec
                .predicate
                .as_deref()
                .map(MatchMode::from_name)
                .unwrap_or_default(),
            conditions: spec.conditions,
            actions: spec.actions,
        }
    }
}

/// Parses either a bare list of rules or an object holding them under `rules`.
/// A rule entry that does not deserialize is logged and skipped; the others still load.
pub fn parse_rules(json: &str) -> Result<Vec<Rule>, RuleError> {
    use serde_json::Value;

    let entries = match serde_json::from_str(json)? {
        Value::Array(entries) => entries,
        Value::Object(mut doc) => match doc.remove("rules") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(RuleError::Shape),
        },
        _ => return Err(RuleError::Shape),
    };

    let mut rules = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match Rule::deserialize(entry) {
            Ok(rule) => rules.push(rule),
            Err(e) => warn!("Skipping rule #{}: {}", index + 1, e),
        }
    }
    Ok(rules)
}

pub fn load_rules(path: &Path) -> Result<Vec<Rule>, RuleError> {
    let content = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rules(&content)
}
