//! Status Session - listens to the game server
//!
//! Best-effort sidecar link: it reconnects forever with a fixed backoff and
//! only ever touches the control state on `power_active` / `game_over` edges.
//! Payloads that do not decode are dropped without closing the link.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::wire::decode_status;
use super::{backoff, ConnectionState, Connector, LinkError, MessageLink, SessionError};
use crate::control_state::SharedControlState;

#[derive(Clone, Debug)]
pub struct StatusSettings {
    /// Wait after a refused connection or a lost link
    pub retry_backoff: Duration,
    /// Wait after a protocol-level fault
    pub fault_backoff: Duration,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(3),
            fault_backoff: Duration::from_secs(1),
        }
    }
}

pub struct StatusSession<C: Connector> {
    connector: C,
    control: SharedControlState,
    settings: StatusSettings,
    cancel: CancellationToken,
    state: ConnectionState,
    messages_received: u64,
    messages_dropped: u64,
}

impl<C: Connector> StatusSession<C> {
    pub fn new(
        connector: C,
        control: SharedControlState,
        settings: StatusSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connector,
            control,
            settings,
            cancel,
            state: ConnectionState::Disconnected,
            messages_received: 0,
            messages_dropped: 0,
        }
    }

    /// Runs until cancelled. Link failures never end the session.
    pub async fn run(mut self) -> Result<(), SessionError> {
        info!(
            "Status session starting, game server {}",
            self.connector.endpoint()
        );

        loop {
            self.state.advance("Game server", ConnectionState::Connecting);
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.connector.connect() => result,
            };

            let fault = match connected {
                Ok(mut link) => {
                    self.state.advance("Game server", ConnectionState::Connected);
                    info!("Connected to game server at {}", self.connector.endpoint());

                    let outcome = self.listen(&mut link).await;
                    link.close().await;
                    match outcome {
                        Ok(()) => break,
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            let wait = if fault.is_connection_failure() {
                self.settings.retry_backoff
            } else {
                self.settings.fault_backoff
            };
            warn!("Game server link: {}, retrying in {:?}", fault, wait);

            self.state.advance("Game server", ConnectionState::Reconnecting);
            if !backoff(&self.cancel, wait).await {
                break;
            }
        }

        self.state.advance("Game server", ConnectionState::Disconnected);
        info!(
            "Status session stopped after {} messages ({} dropped)",
            self.messages_received, self.messages_dropped
        );
        Ok(())
    }

    // Receive loop on one link; `Ok` only on cancellation
    async fn listen(&mut self, link: &mut C::Link) -> Result<(), LinkError> {
        loop {
            let inbound = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                inbound = link.recv_text() => inbound?,
            };

            let Some(text) = inbound else {
                return Err(LinkError::Closed);
            };
            self.messages_received += 1;

            match decode_status(&text) {
                Ok(status) => {
                    debug!("Game status: {:?}", status);
                    self.control.apply_status(&status).await;
                }
                Err(e) => {
                    self.messages_dropped += 1;
                    debug!("Discarding status payload ({}): {}", e, text);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_state::SpeedLevels;
    use crate::link::testing::{mock_pair, MockConnector};

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn status_edges_update_control_state() {
        let connector = MockConnector::default();
        let (link, peer) = mock_pair();
        connector.push(link);

        let control = SharedControlState::new(SpeedLevels::default());
        let cancel = CancellationToken::new();
        let session = StatusSession::new(
            connector,
            control.clone(),
            StatusSettings::default(),
            cancel.clone(),
        );
        let handle = tokio::spawn(session.run());

        peer.deliver
            .send(r#"{"estado_jogo": {"power_active": true}}"#.to_string())
            .unwrap();
        settle().await;
        let state = control.snapshot().await;
        assert!(state.boost_active);
        assert_eq!(state.speed_ceiling, 255.0);

        // Garbage in between does not disturb anything
        peer.deliver.send("{{{ not json".to_string()).unwrap();
        peer.deliver
            .send(r#"{"power_active": false, "game_over": true}"#.to_string())
            .unwrap();
        peer.deliver
            .send(r#"{"power_active": false, "game_over": false}"#.to_string())
            .unwrap();
        settle().await;

        let state = control.snapshot().await;
        assert!(!state.boost_active);
        assert_eq!(state.speed_ceiling, 150.0);
        assert!(state.halted);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn lost_link_is_retried_after_backoff() {
        let connector = MockConnector::default();
        let (first, first_peer) = mock_pair();
        let (second, second_peer) = mock_pair();
        connector.push(first);
        connector.push(second);

        let control = SharedControlState::new(SpeedLevels::default());
        let cancel = CancellationToken::new();
        let session = StatusSession::new(
            connector.clone(),
            control.clone(),
            StatusSettings::default(),
            cancel.clone(),
        );
        let handle = tokio::spawn(session.run());

        settle().await;
        assert_eq!(connector.attempts(), 1);
        drop(first_peer);

        // Still inside the 3 s backoff
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(connector.attempts(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(connector.attempts(), 2);

        second_peer
            .deliver
            .send(r#"{"power_active": true}"#.to_string())
            .unwrap();
        settle().await;
        assert!(control.snapshot().await.boost_active);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn protocol_fault_uses_shorter_backoff() {
        let connector = MockConnector::default();
        let (first, first_peer) = mock_pair();
        let (second, second_peer) = mock_pair();
        let (third, _third_peer) = mock_pair();
        connector.push(first);
        connector.push(second);
        connector.push(third);

        let cancel = CancellationToken::new();
        let session = StatusSession::new(
            connector.clone(),
            SharedControlState::new(SpeedLevels::default()),
            StatusSettings::default(),
            cancel.clone(),
        );
        let handle = tokio::spawn(session.run());

        settle().await;
        assert_eq!(connector.attempts(), 1);

        // Protocol fault: 1 s backoff
        first_peer
            .fail
            .send(LinkError::Protocol("bad frame".to_string()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(connector.attempts(), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(connector.attempts(), 2);

        // I/O fault: full 3 s backoff
        second_peer
            .fail
            .send(LinkError::Io("connection reset".to_string()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(connector.attempts(), 2);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(connector.attempts(), 3);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let connector = MockConnector::default();
        let cancel = CancellationToken::new();
        let session = StatusSession::new(
            connector.clone(),
            SharedControlState::new(SpeedLevels::default()),
            StatusSettings::default(),
            cancel.clone(),
        );
        let handle = tokio::spawn(session.run());

        settle().await;
        assert_eq!(connector.attempts(), 1);

        cancel.cancel();
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("session did not stop promptly")
            .unwrap()
            .unwrap();
    }
}
