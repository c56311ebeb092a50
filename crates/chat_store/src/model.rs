use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Placeholder title for a conversation with no user message yet.
pub const DEFAULT_TITLE: &str = "New Chat";

const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One chat message. Content is append-only while `streaming` is set and
/// immutable afterwards; the store enforces both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub streaming: bool,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::User,
            content: content.into(),
            created_at: OffsetDateTime::now_utc(),
            streaming: false,
        }
    }

    /// An empty assistant message that is about to receive streamed tokens.
    #[must_use]
    pub fn assistant_placeholder() -> Self {
        Self {
            id: new_id(),
            role: Role::Assistant,
            content: String::new(),
            created_at: OffsetDateTime::now_utc(),
            streaming: true,
        }
    }
}

/// One persisted chat thread with an ordered message history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Conversation {
    #[must_use]
    pub fn new_empty() -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: new_id(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.messages.len(),
        }
    }
}

/// Rendering-boundary projection of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub message_count: usize,
}

/// Derive a display title from the first user message, truncated to 50
/// characters with an ellipsis marker when longer.
#[must_use]
pub fn derive_title(messages: &[Message], fallback: &str) -> String {
    let Some(first_user) = messages.iter().find(|message| message.role == Role::User) else {
        return fallback.to_string();
    };

    let content = &first_user.content;
    if content.chars().count() > TITLE_MAX_CHARS {
        let truncated: String = content.chars().take(TITLE_MAX_CHARS).collect();
        format!("{truncated}...")
    } else {
        content.clone()
    }
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::{derive_title, Message, DEFAULT_TITLE};

    #[test]
    fn title_comes_from_first_user_message() {
        let messages = vec![Message::user("short prompt")];
        assert_eq!(derive_title(&messages, DEFAULT_TITLE), "short prompt");
    }

    #[test]
    fn title_truncates_long_first_user_message() {
        let messages = vec![Message::user("x".repeat(80))];
        let title = derive_title(&messages, DEFAULT_TITLE);
        assert_eq!(title, format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn title_truncation_counts_characters_not_bytes() {
        let messages = vec![Message::user("\u{00e9}".repeat(51))];
        let title = derive_title(&messages, DEFAULT_TITLE);
        assert_eq!(title, format!("{}...", "\u{00e9}".repeat(50)));
    }

    #[test]
    fn title_falls_back_without_user_messages() {
        let mut assistant = Message::assistant_placeholder();
        assistant.streaming = false;
        assert_eq!(derive_title(&[assistant], DEFAULT_TITLE), DEFAULT_TITLE);
    }
}
