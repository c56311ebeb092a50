//! Stored-blob codec: JSON, zstd-compressed, framed as base64 text.
//!
//! Conversation histories repeat structure and keys heavily, so the
//! compressed blob stays sub-linear in that redundancy. Decoding swallows
//! every failure mode locally: a blob that fails base64, zstd, JSON, or
//! version checks reads back as "no prior state".

use base64::{engine::general_purpose, Engine as _};

use crate::error::ChatStoreError;
use crate::schema::{StoredState, STORE_VERSION};

const COMPRESSION_LEVEL: i32 = 3;

/// Serialize the full stored state into one opaque string.
pub fn serialize(state: &StoredState) -> Result<String, ChatStoreError> {
    let json = serde_json::to_vec(state).map_err(ChatStoreError::json_serialize)?;
    let compressed =
        zstd::stream::encode_all(json.as_slice(), COMPRESSION_LEVEL).map_err(ChatStoreError::compress)?;
    Ok(general_purpose::STANDARD.encode(compressed))
}

/// Decode a stored blob. Any failure yields `None` so startup can always
/// proceed with an empty store.
pub fn deserialize(blob: &str) -> Option<StoredState> {
    let compressed = general_purpose::STANDARD.decode(blob.trim()).ok()?;
    let json = zstd::stream::decode_all(compressed.as_slice()).ok()?;
    let state: StoredState = serde_json::from_slice(&json).ok()?;
    if state.version != STORE_VERSION {
        return None;
    }
    Some(state)
}
