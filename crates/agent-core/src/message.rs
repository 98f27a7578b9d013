//! Conversation Messages
//!
//! Standard message format passed to completion providers and kept in
//! per-turn conversation state.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Who produced a message; advisor turns never carry tool messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    /// Creation time; absent timestamps deserialize as now
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Render as a single `role: content` line for prompt transcripts
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.role.as_str(), self.content.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Xin chào");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Xin chào");
    }

    #[test]
    fn test_transcript_line() {
        assert_eq!(Message::assistant("Chào bạn\n").transcript_line(), "assistant: Chào bạn");
        assert_eq!(Role::System.to_string(), "system");
    }
}
