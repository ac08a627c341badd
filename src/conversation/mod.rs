//! Conversation types and history helpers

use serde::{Deserialize, Serialize};

/// Number of characters of the opening user message kept in a draft title
const TITLE_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A conversation persisted by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub messages: Vec<Turn>,
}

/// A finished exchange that has not been saved yet.
///
/// The backend assigns the identifier; the returned [`Conversation`]
/// supersedes the draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConversation {
    pub title: String,
    pub summary: String,
    pub messages: Vec<Turn>,
}

impl NewConversation {
    /// Draft a conversation from the turn list of a completed exchange
    pub fn from_exchange(last_user_message: &str, model: &str, messages: Vec<Turn>) -> Self {
        Self {
            title: draft_title(last_user_message),
            summary: format!("Chat with {}", model),
            messages,
        }
    }
}

/// First characters of the message followed by an ellipsis.
///
/// The ellipsis is always appended, even for short messages.
pub fn draft_title(message: &str) -> String {
    let mut title: String = message.chars().take(TITLE_CHARS).collect();
    title.push_str("...");
    title
}

/// Deduplicate by title, keeping the first occurrence and the original order
pub fn dedupe_by_title(conversations: &[Conversation]) -> Vec<&Conversation> {
    let mut seen = std::collections::HashSet::new();
    conversations
        .iter()
        .filter(|c| seen.insert(c.title.as_str()))
        .collect()
}
