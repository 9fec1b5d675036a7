use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// A named, ordered schema of form fields.
///
/// Immutable for the duration of an autofill session; owned by the template
/// store and read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FormField>,
}

/// One entry in a template's field schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub id: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Input kind of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Number,
    Date,
    MultiLine,
    ChoiceSingle,
    ChoiceMulti,
}

/// A stored field value: a scalar or a list (multi-choice fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Stringified form used for display and the completion predicate.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Scalar(value) => value.clone(),
            FieldValue::List(values) => values.join(", "),
        }
    }

    /// A field counts as unfilled when its stringified value trims to empty.
    pub fn is_blank(&self) -> bool {
        self.as_text().trim().is_empty()
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Scalar(value)
    }
}

/// Per-session form state, keyed by field id.
///
/// Keys are always a subset of the active template's field ids; merges are
/// per-key upserts and never touch unrelated keys.
pub type FormData = BTreeMap<String, FieldValue>;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Notice,
}

/// One entry in the append-only session chat log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Vec<u8>>,
}

impl ChatMessage {
    fn new(role: Role, text: String, audio: Option<Vec<u8>>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            role,
            text,
            created_at: now_rfc3339(),
            audio,
        }
    }

    pub fn user(text: impl Into<String>, audio: Option<Vec<u8>>) -> Self {
        Self::new(Role::User, text.into(), audio)
    }

    pub fn assistant(text: impl Into<String>, audio: Option<Vec<u8>>) -> Self {
        Self::new(Role::Assistant, text.into(), audio)
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::new(Role::Notice, text.into(), None)
    }
}

/// Current UTC timestamp as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Recording lifecycle of the capture controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Recorded,
}

/// Phase of an autofill session.
///
/// Advances forward only, except the explicit reviewing -> conversing
/// "continue editing" transition. Submitted is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    SelectingTemplate,
    Conversing,
    Reviewing,
    Submitted,
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::SelectingTemplate => "selecting-template",
            SessionPhase::Conversing => "conversing",
            SessionPhase::Reviewing => "reviewing",
            SessionPhase::Submitted => "submitted",
        }
    }
}
