//! Queue port error type.

use thiserror::Error;

/// Errors surfaced by a [`crate::BuildQueue`] implementation.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("build server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("queue unavailable: {0}")]
    Unavailable(String),
}
