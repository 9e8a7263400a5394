//! # Network Links
//!
//! Two independent, self-healing WebSocket sessions:
//!
//! ```text
//! link/
//! ├── actuator_session.rs - shapes input and streams motor commands to the robot
//! ├── status_session.rs   - consumes game status and updates the control state
//! ├── websocket.rs        - tokio-tungstenite implementation of the transport seam
//! ├── wire.rs             - JSON payloads
//! └── error.rs            - link, decode and session errors
//! ```
//!
//! Both sessions are generic over [`Connector`], so the retry and shaping logic
//! does not depend on the concrete transport.

pub mod actuator_session;
pub mod error;
pub mod status_session;
pub mod websocket;
pub mod wire;

pub use actuator_session::{ActuatorSession, ActuatorSettings};
pub use error::{DecodeError, LinkError, SessionError};
pub use status_session::{StatusSession, StatusSettings};
pub use websocket::{WsConnector, WsLink};

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    /// Moves `self` to `next`, logging the change under `link`.
    pub(crate) fn advance(&mut self, link: &str, next: ConnectionState) {
        if *self != next {
            debug!("{} link: {:?} -> {:?}", link, self, next);
            *self = next;
        }
    }
}

/// An established, message-oriented duplex link.
pub trait MessageLink: Send {
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Next inbound text message; `Ok(None)` once the peer has closed the link.
    fn recv_text(&mut self) -> impl Future<Output = Result<Option<String>, LinkError>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens links to one fixed endpoint.
pub trait Connector: Send + Sync + 'static {
    type Link: MessageLink + 'static;

    fn endpoint(&self) -> &str;

    fn connect(&self) -> impl Future<Output = Result<Self::Link, LinkError>> + Send;
}

/// Sleeps for `backoff` unless cancelled first. Returns `false` on cancellation.
pub(crate) async fn backoff(cancel: &CancellationToken, backoff: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(backoff) => true,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_only_moves_on_change() {
        let mut state = ConnectionState::default();
        state.advance("test", ConnectionState::Connecting);
        assert_eq!(state, ConnectionState::Connecting);
        state.advance("test", ConnectionState::Connecting);
        assert_eq!(state, ConnectionState::Connecting);
        state.advance("test", ConnectionState::Connected);
        assert_eq!(state, ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_reports_cancellation() {
        let cancel = CancellationToken::new();
        assert!(backoff(&cancel, Duration::from_millis(300)).await);

        cancel.cancel();
        assert!(!backoff(&cancel, Duration::from_secs(60)).await);
    }
}
