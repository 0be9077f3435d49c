//! Error taxonomy for the playback runtime
//!
//! Only [`SessionError::NoSourceAvailable`] ever reaches the embedding
//! application. Everything else is recovered inside the engine or concerns a
//! side channel (progress persistence, remote sync) and is logged and dropped.

use thiserror::Error;

/// Errors raised by a playback session
#[derive(Debug, Error)]
pub enum SessionError {
    /// No playable candidate is left for this attempt
    #[error("No playable source available for {0}")]
    NoSourceAvailable(String),
    /// The current candidate exhausted its recovery budget
    #[error("Stream unplayable: {0}")]
    StreamUnplayable(String),
    /// Network-class failure inside the demuxer
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Decode/media pipeline failure
    #[error("Media decode error: {0}")]
    MediaDecodeError(String),
    /// Local progress write failed
    #[error("Failed to persist progress: {0}")]
    PersistenceWriteError(#[from] StorageError),
    /// Remote progress push/pull failed
    #[error("Remote progress sync failed: {0}")]
    RemoteSyncError(#[from] ApiError),
    /// Stored progress could not be read back
    #[error("Failed to read saved position: {0}")]
    ResumeReadError(String),
}

impl SessionError {
    /// Whether this error should be shown to the user
    pub fn is_user_visible(&self) -> bool {
        matches!(self, SessionError::NoSourceAvailable(_))
    }
}

/// Errors from a progress storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the provider and progress HTTP collaborators
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned HTTP {0}")]
    Status(u16),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
