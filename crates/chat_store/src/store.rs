use time::OffsetDateTime;

use crate::codec;
use crate::error::ChatStoreError;
use crate::model::{derive_title, Conversation, ConversationSummary, Message};
use crate::schema::{dehydrate_state, hydrate_state};
use crate::storage::StorageSlot;

/// In-memory source of truth for all conversations and the active message
/// buffer.
///
/// Committed records live in `conversations`, sorted by `updated_at`
/// descending; `live` holds the active conversation's messages, including an
/// in-flight assistant reply. Every committed mutation rewrites the full
/// store through the storage slot. While a live message is streaming,
/// persistence is deferred entirely, so the stored blob never reflects
/// partially streamed text.
pub struct ChatStore<S> {
    storage: S,
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    live: Vec<Message>,
}

impl<S: StorageSlot> ChatStore<S> {
    /// Hydrate the store from the slot. Unreadable or corrupt state degrades
    /// to an empty store; a dangling active id is cleared.
    pub fn load(storage: S) -> Self {
        let stored = match storage.read() {
            Ok(Some(blob)) => codec::deserialize(&blob),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(%error, "failed to read chat state; starting empty");
                None
            }
        };

        let (mut conversations, mut active_id) = match stored {
            Some(state) => hydrate_state(state),
            None => (Vec::new(), None),
        };
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut live = Vec::new();
        if let Some(id) = active_id.clone() {
            match conversations.iter().find(|c| c.id == id) {
                Some(conversation) => live = conversation.messages.clone(),
                None => active_id = None,
            }
        }

        Self {
            storage,
            conversations,
            active_id,
            live,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    /// Messages of the active conversation, in chronological order.
    pub fn messages(&self) -> &[Message] {
        &self.live
    }

    /// Conversation list for the rendering boundary, most recent first.
    pub fn conversation_list(&self) -> Vec<ConversationSummary> {
        self.conversations
            .iter()
            .map(Conversation::summary)
            .collect()
    }

    /// Switch the active conversation. No-op when already active; flushes the
    /// current conversation first either way. Unknown ids leave everything
    /// but the flush untouched.
    pub fn load_conversation(&mut self, id: &str) -> Result<(), ChatStoreError> {
        if self.active_id.as_deref() == Some(id) {
            return Ok(());
        }

        let flushed = self.flush_active();

        let Some(conversation) = self.conversations.iter().find(|c| c.id == id) else {
            if flushed {
                self.persist();
            }
            return Err(ChatStoreError::ConversationNotFound { id: id.to_string() });
        };

        self.live = conversation.messages.clone();
        self.active_id = Some(id.to_string());
        self.persist();
        Ok(())
    }

    /// Create an empty conversation, make it active, clear the buffer.
    pub fn start_new_conversation(&mut self) -> String {
        self.flush_active();

        let conversation = Conversation::new_empty();
        let id = conversation.id.clone();
        self.conversations.insert(0, conversation);
        self.sort_conversations();
        self.active_id = Some(id.clone());
        self.live.clear();
        self.persist();
        id
    }

    /// Remove a conversation unconditionally; unknown ids are a no-op.
    pub fn delete_conversation(&mut self, id: &str) {
        self.conversations.retain(|c| c.id != id);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = None;
            self.live.clear();
        }
        self.persist();
    }

    /// Append a finalized user message and return its id.
    pub fn add_user_message(&mut self, content: &str) -> String {
        let message = Message::user(content);
        let id = message.id.clone();
        self.live.push(message);
        self.persist();
        id
    }

    /// Open the streaming assistant placeholder. At most one may be open per
    /// conversation.
    pub fn begin_assistant_message(&mut self) -> Result<String, ChatStoreError> {
        if self.live.iter().any(|message| message.streaming) {
            return Err(ChatStoreError::AssistantMessageOpen);
        }

        let message = Message::assistant_placeholder();
        let id = message.id.clone();
        self.live.push(message);
        Ok(id)
    }

    /// Concatenate streamed text onto an open message. Silent no-op when the
    /// id is unknown or already finalized; the stream may outlive a
    /// conversation switch.
    pub fn append_tokens(&mut self, id: &str, text: &str) {
        if let Some(message) = self
            .live
            .iter_mut()
            .find(|message| message.id == id && message.streaming)
        {
            message.content.push_str(text);
        }
    }

    /// Close a streaming message, unlocking persistence.
    pub fn finalize_message(&mut self, id: &str) {
        if let Some(message) = self
            .live
            .iter_mut()
            .find(|message| message.id == id && message.streaming)
        {
            message.streaming = false;
            self.persist();
        }
    }

    /// Empty the visible buffer without deleting the conversation record.
    pub fn clear_active_conversation(&mut self) {
        self.live.clear();
        self.persist();
    }

    /// Merge committed live messages into the active record. Returns whether
    /// the record changed.
    fn flush_active(&mut self) -> bool {
        let Some(active_id) = self.active_id.clone() else {
            return false;
        };

        let committed: Vec<Message> = self
            .live
            .iter()
            .filter(|message| !message.streaming)
            .cloned()
            .collect();
        if committed.is_empty() {
            return false;
        }

        let Some(record) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == active_id)
        else {
            return false;
        };

        if record.messages == committed {
            return false;
        }

        record.title = derive_title(&committed, &record.title);
        record.messages = committed;
        record.updated_at = OffsetDateTime::now_utc();
        self.sort_conversations();
        true
    }

    /// Write the full store through the slot. Deferred while any live
    /// message is still streaming; failures are logged and swallowed.
    fn persist(&mut self) {
        if self.live.iter().any(|message| message.streaming) {
            return;
        }

        self.flush_active();

        let state = match dehydrate_state(&self.conversations, self.active_id.as_deref()) {
            Ok(state) => state,
            Err(error) => {
                tracing::warn!(%error, "failed to encode chat state");
                return;
            }
        };
        let blob = match codec::serialize(&state) {
            Ok(blob) => blob,
            Err(error) => {
                tracing::warn!(%error, "failed to serialize chat state");
                return;
            }
        };
        if let Err(error) = self.storage.write(&blob) {
            tracing::warn!(%error, "failed to persist chat state");
        }
    }

    fn sort_conversations(&mut self) {
        self.conversations
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }
}
