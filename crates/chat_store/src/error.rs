use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize chat state: {source}")]
    JsonSerialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to compress chat state: {source}")]
    Compress {
        #[source]
        source: std::io::Error,
    },

    #[error("no conversation with id '{id}'")]
    ConversationNotFound { id: String },

    #[error("an assistant message is already streaming in this conversation")]
    AssistantMessageOpen,

    #[error("failed to format timestamp as RFC3339: {0}")]
    ClockFormat(#[source] time::error::Format),
}

impl ChatStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn json_serialize(source: serde_json::Error) -> Self {
        Self::JsonSerialize { source }
    }

    #[must_use]
    pub fn compress(source: std::io::Error) -> Self {
        Self::Compress { source }
    }
}
