//! Server configuration.

use crate::transport::TransportConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Transport client settings
    pub transport: TransportConfig,

    /// Topic prefix shared with the gateway fleet
    pub topic_prefix: String,

    /// Path of the SQLite database
    pub db_path: PathBuf,

    /// How long a gateway may stay silent before it is displayed as
    /// offline. Display only; commands are never suppressed.
    pub staleness: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            topic_prefix: "gateway".to_string(),
            db_path: PathBuf::from("./doorsync.db"),
            staleness: Duration::from_secs(120),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DOORSYNC_MQTT_BROKER`: MQTT broker URL
    /// - `DOORSYNC_CLIENT_ID`: MQTT client identifier
    /// - `DOORSYNC_TOPIC_PREFIX`: topic prefix shared with the fleet
    /// - `DOORSYNC_DB_PATH`: SQLite database path
    /// - `DOORSYNC_PUBLISH_TIMEOUT_SECS`: publish delivery bound
    /// - `DOORSYNC_KEEP_ALIVE_SECS`: MQTT keep-alive interval
    /// - `DOORSYNC_STALENESS_SECS`: offline display threshold
    ///
    /// # Errors
    ///
    /// Returns error if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(broker) = std::env::var("DOORSYNC_MQTT_BROKER") {
            config.transport.broker_url = broker;
        }

        if let Ok(client_id) = std::env::var("DOORSYNC_CLIENT_ID") {
            config.transport.client_id = client_id;
        }

        if let Ok(prefix) = std::env::var("DOORSYNC_TOPIC_PREFIX") {
            config.topic_prefix = prefix;
        }

        if let Ok(db_path) = std::env::var("DOORSYNC_DB_PATH") {
            config.db_path = PathBuf::from(db_path);
        }

        if let Ok(secs) = std::env::var("DOORSYNC_PUBLISH_TIMEOUT_SECS") {
            config.transport.publish_timeout = Duration::from_secs(
                secs.parse()
                    .context("Invalid DOORSYNC_PUBLISH_TIMEOUT_SECS")?,
            );
        }

        if let Ok(secs) = std::env::var("DOORSYNC_KEEP_ALIVE_SECS") {
            config.transport.keep_alive =
                Duration::from_secs(secs.parse().context("Invalid DOORSYNC_KEEP_ALIVE_SECS")?);
        }

        if let Ok(secs) = std::env::var("DOORSYNC_STALENESS_SECS") {
            config.staleness =
                Duration::from_secs(secs.parse().context("Invalid DOORSYNC_STALENESS_SECS")?);
        }

        Ok(config)
    }
}
