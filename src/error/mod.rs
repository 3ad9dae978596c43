//! Client error types.

use thiserror::Error;

/// Errors raised by the live-update client.
///
/// Only `InvalidJobId` and `ClientStopped` ever reach a caller directly. The
/// other variants are produced inside the worker and end up in logs and
/// lifecycle events.
#[derive(Error, Debug)]
pub enum LiveError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Build id must not be empty")]
    InvalidJobId,

    #[error("Live client has stopped")]
    ClientStopped,
}

impl From<tokio_tungstenite::tungstenite::Error> for LiveError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        LiveError::Transport(e.to_string())
    }
}

pub type LiveResult<T> = Result<T, LiveError>;
