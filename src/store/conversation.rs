//! Conversation and message records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored title of a conversation nobody has named yet
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Content shown while an assistant message is still pending
pub const PLACEHOLDER_CONTENT: &str = "...";

const TITLE_MAX_CHARS: usize = 30;
const TITLE_ELLIPSIS: &str = "...";

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Set only while the reply this message stands in for is in flight
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: now_millis(),
            pending: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: now_millis(),
            pending: false,
        }
    }

    pub fn placeholder() -> Self {
        Self {
            pending: true,
            ..Self::assistant(PLACEHOLDER_CONTENT)
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.role == Role::Assistant && self.pending
    }

    /// Replace a placeholder's content with the final reply
    pub fn settle(&mut self, content: String) {
        self.content = content;
        self.pending = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at,
        }
    }

    /// Title to show for this conversation.
    ///
    /// An unnamed conversation borrows its first user message, cut to 30
    /// characters with `...` appended when cut.
    pub fn display_title(&self) -> String {
        if self.title != DEFAULT_TITLE {
            return self.title.clone();
        }
        let Some(first) = self.messages.iter().find(|m| m.role == Role::User) else {
            return DEFAULT_TITLE.to_string();
        };
        if first.content.chars().count() > TITLE_MAX_CHARS {
            let head: String = first.content.chars().take(TITLE_MAX_CHARS).collect();
            format!("{head}{TITLE_ELLIPSIS}")
        } else {
            first.content.clone()
        }
    }

    pub fn has_pending_reply(&self) -> bool {
        self.messages.last().is_some_and(Message::is_placeholder)
    }
}

/// Current time truncated to whole milliseconds, the precision the
/// persisted form keeps.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
