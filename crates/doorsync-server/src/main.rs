//! # DoorSync Server
//!
//! Coordination runtime between the authoritative door-lock datastore
//! and the gateway fleet.
//!
//! The binary drives the telemetry direction: subscribe to every
//! gateway's telemetry topic, audit every message, and apply confirmed
//! status reports. The command direction is a library seam
//! ([`doorsync_server::Coordinator::dispatcher`]) consumed by the
//! CRUD/API layer embedding this runtime.

use anyhow::Result;
use doorsync_server::{Coordinator, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting DoorSync server"
    );

    let config = ServerConfig::from_env()?;
    let coordinator = Coordinator::new(config)?;

    coordinator.run().await
}
