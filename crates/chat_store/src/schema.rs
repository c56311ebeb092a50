use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::ChatStoreError;
use crate::model::{Conversation, Message, Role};

/// Current on-disk schema version. A blob with any other version is treated
/// as unreadable and the store starts empty.
pub const STORE_VERSION: u32 = 1;

/// Complete application state as persisted: all conversations plus the
/// active selection. Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoredState {
    pub version: u32,
    pub conversations: Vec<StoredConversation>,
    pub active_conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoredConversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<StoredMessage>,
    pub created_at: String,
    pub updated_at: String,
}

/// Stored messages carry no streaming flag: persistence only ever runs once
/// every message in the buffer is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoredMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: String,
}

pub(crate) fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, ChatStoreError> {
    timestamp.format(&Rfc3339).map_err(ChatStoreError::ClockFormat)
}

pub(crate) fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).ok()
}

pub(crate) fn dehydrate_message(message: &Message) -> Result<StoredMessage, ChatStoreError> {
    Ok(StoredMessage {
        id: message.id.clone(),
        role: message.role,
        content: message.content.clone(),
        created_at: format_timestamp(message.created_at)?,
    })
}

pub(crate) fn dehydrate_conversation(
    conversation: &Conversation,
) -> Result<StoredConversation, ChatStoreError> {
    Ok(StoredConversation {
        id: conversation.id.clone(),
        title: conversation.title.clone(),
        messages: conversation
            .messages
            .iter()
            .map(dehydrate_message)
            .collect::<Result<_, _>>()?,
        created_at: format_timestamp(conversation.created_at)?,
        updated_at: format_timestamp(conversation.updated_at)?,
    })
}

pub(crate) fn dehydrate_state(
    conversations: &[Conversation],
    active_conversation_id: Option<&str>,
) -> Result<StoredState, ChatStoreError> {
    Ok(StoredState {
        version: STORE_VERSION,
        conversations: conversations
            .iter()
            .map(dehydrate_conversation)
            .collect::<Result<_, _>>()?,
        active_conversation_id: active_conversation_id.map(ToString::to_string),
    })
}

/// Rebuild a conversation from its stored record. A malformed timestamp
/// anywhere in the record drops the whole record; sibling records survive.
pub(crate) fn hydrate_conversation(stored: StoredConversation) -> Option<Conversation> {
    let created_at = parse_timestamp(&stored.created_at)?;
    let updated_at = parse_timestamp(&stored.updated_at)?;
    let mut messages = Vec::with_capacity(stored.messages.len());
    for message in stored.messages {
        messages.push(Message {
            created_at: parse_timestamp(&message.created_at)?,
            id: message.id,
            role: message.role,
            content: message.content,
            streaming: false,
        });
    }

    Some(Conversation {
        id: stored.id,
        title: stored.title,
        messages,
        created_at,
        updated_at,
    })
}

pub(crate) fn hydrate_state(stored: StoredState) -> (Vec<Conversation>, Option<String>) {
    let conversations = stored
        .conversations
        .into_iter()
        .filter_map(hydrate_conversation)
        .collect();
    (conversations, stored.active_conversation_id)
}
