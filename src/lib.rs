//! Streaming chat client core.
//!
//! The session controller in [`session`] drives one chat turn at a time:
//! `chat_api` supplies the transport and incremental stream decoding,
//! `chat_store` owns conversation state and its compressed durable blob.
//! Rendering is an external collaborator; the bundled binary is a minimal
//! line-oriented front end over the same session API.

pub mod session;

pub use session::{ChatSession, SessionStatus};
