//! Transport-only chat API client primitives.
//!
//! This crate owns request building, response classification, and incremental
//! stream decoding for the chat completion endpoint. It contains no
//! conversation state and no persistence; callers feed decoded token events
//! into their own store.
//!
//! The wire format is newline-delimited JSON objects shaped `{"text": ...}`.
//! The decoder tolerates a non-conformant upstream: records chunked mid-line,
//! characters chunked mid-byte-sequence, and malformed lines all degrade to
//! dropped records rather than stream failure.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod ndjson;
pub mod payload;

pub use client::CancellationSignal;
pub use client::ChatApiClient;
pub use config::ChatApiConfig;
pub use endpoint::normalize_chat_url;
pub use error::ChatApiError;
pub use events::TokenEvent;
pub use ndjson::TokenStreamParser;
pub use payload::PromptRequest;
