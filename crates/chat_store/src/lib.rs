//! Durable multi-conversation chat state.
//!
//! [`ChatStore`] is the in-memory source of truth for all conversations and
//! the active message buffer. Every committed mutation rewrites one opaque
//! blob through an injected [`StorageSlot`]; the blob is the JSON schema in
//! [`schema`] compressed with zstd and framed as base64 (see [`codec`]).
//! Persistence is deferred while an assistant message is still streaming, so
//! the stored blob never contains partially streamed text.

pub mod codec;
mod error;
mod model;
mod paths;
mod schema;
mod storage;
mod store;

pub use error::ChatStoreError;
pub use model::{derive_title, Conversation, ConversationSummary, Message, Role, DEFAULT_TITLE};
pub use paths::{state_file_path, state_root};
pub use schema::{StoredConversation, StoredMessage, StoredState, STORE_VERSION};
pub use storage::{FileSlot, MemorySlot, StorageSlot};
pub use store::ChatStore;
