//! Canonical message types.
//!
//! Messages are the units of a conversation history. A reply strategy reads the
//! history and may produce one new message; existing messages are never
//! mutated after creation.

use serde::{Deserialize, Serialize};

/// A conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID (UUID v4 unless supplied by the host).
    #[serde(default = "new_message_id")]
    pub id: String,

    /// Message role.
    pub role: Role,

    /// Textual content. `None` for messages that carry no text
    /// (e.g. a pure tool invocation recorded by the host).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Who produced this message (agent or user name).
    #[serde(default)]
    pub from: String,

    /// Unix milliseconds.
    #[serde(default = "now_millis")]
    pub created_at: i64,
}

impl Message {
    pub fn new(role: Role, content: Option<String>, from: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content,
            from: from.into(),
            created_at: now_millis(),
        }
    }

    pub fn user(content: impl Into<String>, from: impl Into<String>) -> Self {
        Self::new(Role::User, Some(content.into()), from)
    }

    pub fn assistant(content: impl Into<String>, from: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Some(content.into()), from)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, Some(content.into()), "system")
    }

    /// Text content, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
