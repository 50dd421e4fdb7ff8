//! Domain error taxonomy. Every variant has a defined recovery path so no
//! failure in the library, codec, or playback layers is fatal to the process.

use thiserror::Error;

/// Result alias used by the domain modules.
pub type Result<T> = std::result::Result<T, DownbeatError>;

#[derive(Error, Debug)]
pub enum DownbeatError {
    /// User input rejected at the write boundary (empty name, BPM out of
    /// range). Nothing was mutated.
    #[error("{0}")]
    Validation(String),

    /// A persisted record could not be parsed. Callers reset to defaults.
    #[error("stored record `{key}` is corrupt: {source}")]
    StorageCorrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A share link could not be turned back into a show.
    #[error("Invalid share link. The data could not be imported ({0}).")]
    ImportDecode(String),

    /// An index no longer points at an existing show or song.
    #[error("{0}")]
    StaleReference(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl DownbeatError {
    pub(crate) fn validation<S: Into<String>>(message: S) -> Self {
        DownbeatError::Validation(message.into())
    }

    pub(crate) fn stale<S: Into<String>>(message: S) -> Self {
        DownbeatError::StaleReference(message.into())
    }

    pub(crate) fn import<S: Into<String>>(message: S) -> Self {
        DownbeatError::ImportDecode(message.into())
    }
}
