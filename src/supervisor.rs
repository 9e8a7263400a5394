//! Supervisor - runs both link sessions side by side
//!
//! Owns the shared [`SharedControlState`] and the cancellation token. Each
//! session is its own tokio task; when one of them ends (error or panic) the
//! outcome is logged and the other keeps running. Shutdown cancels both and
//! aborts whatever has not finished within the grace period.

use std::future::Future;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::control_state::{SharedControlState, SpeedLevels};
use crate::link::SessionError;

type SessionResult = Result<Result<(), SessionError>, JoinError>;

/// How the supervised run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// The shutdown signal fired
    Shutdown,
    /// Both sessions ended on their own
    SessionsFinished,
}

pub struct Supervisor {
    control: SharedControlState,
    cancel: CancellationToken,
    shutdown_grace: Duration,
}

impl Supervisor {
    pub fn new(levels: SpeedLevels, shutdown_grace: Duration) -> Self {
        Self {
            control: SharedControlState::new(levels),
            cancel: CancellationToken::new(),
            shutdown_grace,
        }
    }

    /// Handle to the control state for constructing sessions.
    pub fn control(&self) -> SharedControlState {
        self.control.clone()
    }

    /// Token the sessions watch for shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawns both sessions and waits for `shutdown` or for both to finish.
    pub async fn run<A, S, F>(self, actuator: A, status: S, shutdown: F) -> SupervisorExit
    where
        A: Future<Output = Result<(), SessionError>> + Send + 'static,
        S: Future<Output = Result<(), SessionError>> + Send + 'static,
        F: Future<Output = ()>,
    {
        info!("Supervisor starting actuator and status sessions");
        let mut actuator: JoinHandle<Result<(), SessionError>> = tokio::spawn(actuator);
        let mut status: JoinHandle<Result<(), SessionError>> = tokio::spawn(status);
        let mut actuator_done = false;
        let mut status_done = false;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping sessions");
                    break;
                }
                result = &mut actuator, if !actuator_done => {
                    actuator_done = true;
                    report("actuator", result);
                }
                result = &mut status, if !status_done => {
                    status_done = true;
                    report("status", result);
                }
            }

            if actuator_done && status_done {
                warn!("Both sessions have ended");
                return SupervisorExit::SessionsFinished;
            }
        }

        self.cancel.cancel();

        let grace = self.shutdown_grace;
        let drain = async {
            if !actuator_done {
                report("actuator", (&mut actuator).await);
            }
            if !status_done {
                report("status", (&mut status).await);
            }
        };

        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!("Sessions did not stop within {:?}, aborting", grace);
            actuator.abort();
            status.abort();
        }

        SupervisorExit::Shutdown
    }
}

fn report(name: &str, result: SessionResult) {
    match result {
        Ok(Ok(())) => info!("{} session finished", name),
        Ok(Err(e)) => error!("{} session terminated: {}", name, e),
        Err(e) if e.is_panic() => error!("{} session panicked, other session keeps running", name),
        Err(e) => warn!("{} session was cancelled: {}", name, e),
    }
}
