//! Chat messages and the conversation memory.
//!
//! A [`ChatMessage`] is created once (from user input or a final answer) and
//! never mutated. [`ChatMemory`] is the append-only history a run reads when
//! it builds the next prompt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions (tool header, extra context)
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        f.write_str(s)
    }
}

/// A single message in a conversation.
///
/// Equality ignores `timestamp` so two replays of the same run compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Rough token estimate (4 characters per token).
    pub fn estimated_tokens(&self) -> usize {
        self.content.chars().count().div_ceil(4)
    }
}

impl PartialEq for ChatMessage {
    fn eq(&self, other: &Self) -> bool {
        self.role == other.role && self.content == other.content
    }
}

impl Eq for ChatMessage {}

/// Append-only chat history with an optional token window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMemory {
    messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_limit: Option<usize>,
}

impl ChatMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the window returned by [`ChatMemory::get`] to roughly `limit` tokens.
    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.token_limit = Some(limit);
        self
    }

    pub fn token_limit(&self) -> Option<usize> {
        self.token_limit
    }

    /// Append a message.
    pub fn put(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// The most recent messages that fit the token limit, oldest first.
    ///
    /// The newest message is always included, even if it alone exceeds the limit.
    pub fn get(&self) -> &[ChatMessage] {
        let Some(limit) = self.token_limit else {
            return &self.messages;
        };

        let mut used = 0usize;
        let mut start = self.messages.len();
        for (idx, msg) in self.messages.iter().enumerate().rev() {
            used += msg.estimated_tokens();
            if used > limit && start < self.messages.len() {
                break;
            }
            start = idx;
        }
        &self.messages[start..]
    }

    /// Every stored message, ignoring the token limit.
    pub fn all(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_timestamp() {
        let a = ChatMessage::user("hello");
        let mut b = ChatMessage::user("hello");
        b.timestamp = a.timestamp + chrono::Duration::seconds(30);
        assert_eq!(a, b);
        assert_ne!(a, ChatMessage::assistant("hello"));
    }

    #[test]
    fn memory_is_append_only_in_order() {
        let mut mem = ChatMemory::new();
        mem.put(ChatMessage::user("one"));
        mem.put(ChatMessage::assistant("two"));
        assert_eq!(mem.len(), 2);
        assert_eq!(mem.get()[0].content, "one");
        assert_eq!(mem.last().unwrap().content, "two");
    }

    #[test]
    fn token_limit_keeps_most_recent_window() {
        // 40 chars ≈ 10 tokens each
        let mut mem = ChatMemory::new().with_token_limit(25);
        for i in 0..5 {
            mem.put(ChatMessage::user(format!("{i}{}", "x".repeat(39))));
        }
        let window = mem.get();
        assert_eq!(window.len(), 2);
        assert!(window[0].content.starts_with('3'));
        assert!(window[1].content.starts_with('4'));
        assert_eq!(mem.all().len(), 5);
    }

    #[test]
    fn oversized_latest_message_still_returned() {
        let mut mem = ChatMemory::new().with_token_limit(1);
        mem.put(ChatMessage::user("a long message that blows the budget"));
        assert_eq!(mem.get().len(), 1);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
