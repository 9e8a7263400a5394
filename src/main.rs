pub mod config;
pub mod control_state;
pub mod controller;
pub mod drive;
pub mod link;
pub mod supervisor;

use crate::config::TeleopConfig;
use crate::controller::ControllerHandle;
use crate::drive::CommandShaper;
use crate::link::{ActuatorSession, StatusSession, WsConnector};
use crate::supervisor::{Supervisor, SupervisorExit};
use color_eyre::{eyre::eyre, Result};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = TeleopConfig::load_or_create().await?;

    // Without a gamepad there is nothing to drive
    info!("Initializing controller");
    let controller = ControllerHandle::spawn(Some(config.controller.clone()))
        .map_err(|e| eyre!("Failed to start controller: {}", e))?;

    let supervisor = Supervisor::new(config.speed_levels(), config.shutdown_grace());

    let actuator = ActuatorSession::new(
        WsConnector::new(config.links.actuator_uri.clone()),
        controller,
        CommandShaper::new(config.drive.shaper.clone()),
        supervisor.control(),
        config.actuator_settings(),
        supervisor.cancel_token(),
    );

    let status = StatusSession::new(
        WsConnector::new(config.links.status_uri.clone()),
        supervisor.control(),
        config.status_settings(),
        supervisor.cancel_token(),
    );

    info!(
        "Driving robot at {} with status from {}",
        config.links.actuator_uri, config.links.status_uri
    );

    match supervisor
        .run(actuator.run(), status.run(), shutdown_signal())
        .await
    {
        SupervisorExit::Shutdown => info!("Shutting down"),
        SupervisorExit::SessionsFinished => warn!("All sessions ended, exiting"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
