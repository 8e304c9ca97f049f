//! Error types for the storage and transport layers.

use thiserror::Error;

/// Errors surfaced to the caller by the store, the Gmail client and auth.
///
/// Rule content never produces one of these: malformed rules are logged and
/// degraded at load time, see [`crate::rules`].
#[derive(Error, Debug)]
pub enum Error {
    /// Local SQLite store failed.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// A Gmail API call failed.
    #[error("Gmail API error: {0}")]
    Gmail(String),

    /// OAuth flow or token storage failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The labels column of a stored row is not a JSON string array.
    #[error("invalid labels stored for message {message_id}: {source}")]
    Labels {
        message_id: String,
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn gmail(context: impl std::fmt::Display, source: impl std::fmt::Display) -> Self {
        Self::Gmail(format!("{context}: {source}"))
    }
}
