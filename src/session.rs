use chat_api::{CancellationSignal, ChatApiClient, ChatApiError};
use chat_store::{ChatStore, ChatStoreError, StorageSlot};

/// One request/response/stream cycle at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Loading,
    Streaming,
    Error,
}

/// Drives one outstanding chat turn: issues the request, wires decoded
/// tokens into the store, and classifies failures.
///
/// All mutation is single-threaded and cooperative; the surrounding UI is
/// expected to keep input disabled while status is `Loading` or `Streaming`.
pub struct ChatSession<S> {
    client: ChatApiClient,
    store: ChatStore<S>,
    status: SessionStatus,
    error: Option<String>,
    last_prompt: Option<String>,
}

impl<S: StorageSlot> ChatSession<S> {
    #[must_use]
    pub fn new(client: ChatApiClient, store: ChatStore<S>) -> Self {
        Self {
            client,
            store,
            status: SessionStatus::Idle,
            error: None,
            last_prompt: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The prompt retained for [`retry`](Self::retry), verbatim.
    pub fn last_prompt(&self) -> Option<&str> {
        self.last_prompt.as_deref()
    }

    pub fn store(&self) -> &ChatStore<S> {
        &self.store
    }

    /// Send a prompt and stream the reply into the active conversation,
    /// creating one when none is active. Decoded tokens are echoed to
    /// `on_token` for live display.
    ///
    /// Failures land in [`error`](Self::error) with status `Error`;
    /// cancellation returns to `Idle` silently. Either way the partial
    /// assistant reply is finalized: an open message would block persistence
    /// and the next send.
    pub async fn send(
        &mut self,
        prompt: &str,
        cancellation: Option<&CancellationSignal>,
        on_token: &mut dyn FnMut(&str),
    ) {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return;
        }

        if self.store.active_conversation_id().is_none() {
            self.store.start_new_conversation();
        }

        self.last_prompt = Some(prompt.to_string());
        self.error = None;
        self.store.add_user_message(prompt);
        self.status = SessionStatus::Loading;

        let response = match self.client.send_prompt(prompt, cancellation).await {
            Ok(response) => response,
            Err(ChatApiError::Cancelled) => {
                self.status = SessionStatus::Idle;
                return;
            }
            Err(error) => {
                self.fail(error.to_string());
                return;
            }
        };

        let assistant_id = match self.store.begin_assistant_message() {
            Ok(id) => id,
            Err(error) => {
                self.fail(error.to_string());
                return;
            }
        };
        self.status = SessionStatus::Streaming;
        tracing::debug!(message_id = %assistant_id, "streaming assistant reply");

        let Self { client, store, .. } = self;
        let outcome = client
            .stream_tokens(response, cancellation, |event| {
                store.append_tokens(&assistant_id, &event.text);
                on_token(&event.text);
            })
            .await;

        self.store.finalize_message(&assistant_id);

        match outcome {
            Ok(()) => self.status = SessionStatus::Idle,
            Err(ChatApiError::Cancelled) => self.status = SessionStatus::Idle,
            Err(error) => self.fail(error.to_string()),
        }
    }

    /// Resubmit the last prompt through the same path as a fresh send.
    pub async fn retry(
        &mut self,
        cancellation: Option<&CancellationSignal>,
        on_token: &mut dyn FnMut(&str),
    ) {
        let Some(prompt) = self.last_prompt.clone() else {
            return;
        };
        self.send(&prompt, cancellation, on_token).await;
    }

    /// Make another conversation active. An unknown id surfaces a
    /// user-visible error and changes nothing else.
    pub fn select_conversation(&mut self, id: &str) {
        match self.store.load_conversation(id) {
            Ok(()) => self.error = None,
            Err(ChatStoreError::ConversationNotFound { .. }) => {
                self.error = Some("Chat not found".to_string());
            }
            Err(error) => self.error = Some(error.to_string()),
        }
    }

    pub fn start_new_conversation(&mut self) -> String {
        self.error = None;
        self.store.start_new_conversation()
    }

    pub fn delete_conversation(&mut self, id: &str) {
        self.store.delete_conversation(id);
    }

    /// Empty the visible message list and reset error/status, keeping the
    /// conversation record.
    pub fn clear_active_conversation(&mut self) {
        self.store.clear_active_conversation();
        self.error = None;
        self.status = SessionStatus::Idle;
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(%message, "chat send failed");
        self.error = Some(message);
        self.status = SessionStatus::Error;
    }
}
