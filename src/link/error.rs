use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::controller::InputError;

/// Transient failures on either link. Always handled by backoff and reconnect.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("Link closed by peer")]
    Closed,

    #[error("I/O failure on link: {0}")]
    Io(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl LinkError {
    /// Failures that come from the network itself rather than a misbehaving peer.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            LinkError::ConnectFailed { .. } | LinkError::Closed | LinkError::Io(_)
        )
    }
}

impl From<tungstenite::Error> for LinkError {
    fn from(error: tungstenite::Error) -> Self {
        match error {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                LinkError::Closed
            }
            tungstenite::Error::Io(e) => LinkError::Io(e.to_string()),
            other => LinkError::Protocol(other.to_string()),
        }
    }
}

/// Inbound payload that could not be turned into a status message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Status body is not a JSON object")]
    NotAnObject,
}

/// Reasons a session stops for good. Link errors never end up here.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Input failure: {0}")]
    Input(#[from] InputError),
}
