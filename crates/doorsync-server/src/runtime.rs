//! Coordinator wiring: store, transport, dispatcher, ingestor.

use crate::config::ServerConfig;
use crate::dispatcher::CommandDispatcher;
use crate::ingestor::TelemetryIngestor;
use crate::transport::MqttTransport;
use anyhow::{Context, Result};
use chrono::Utc;
use doorsync_core::GatewayId;
use doorsync_proto::TopicScheme;
use doorsync_store::{EntityStore, SqliteStore};
use rumqttc::EventLoop;
use std::sync::Arc;
use tokio::task::JoinSet;

/// The coordination runtime.
///
/// Owns the store and the transport connection. [`Coordinator::run`]
/// drives the telemetry direction; [`Coordinator::dispatcher`] hands
/// the command direction to the embedding CRUD layer.
pub struct Coordinator {
    config: ServerConfig,
    store: Arc<SqliteStore>,
    transport: MqttTransport,
    eventloop: EventLoop,
    topics: TopicScheme,
}

impl Coordinator {
    /// Open the store and create the transport client.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or the broker URL
    /// is invalid.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let store = Arc::new(
            SqliteStore::open(&config.db_path).context("Failed to open SQLite database")?,
        );
        let (transport, eventloop) =
            MqttTransport::connect(&config.transport).context("Failed to create MQTT client")?;
        let topics = TopicScheme::new(&config.topic_prefix);

        Ok(Self {
            config,
            store,
            transport,
            eventloop,
            topics,
        })
    }

    /// Shared handle to the entity store.
    #[must_use]
    pub fn store(&self) -> Arc<SqliteStore> {
        Arc::clone(&self.store)
    }

    /// Command dispatcher handle for the embedding CRUD layer.
    #[must_use]
    pub fn dispatcher(&self) -> CommandDispatcher<MqttTransport, SqliteStore> {
        CommandDispatcher::new(
            self.transport.clone(),
            Arc::clone(&self.store),
            self.topics.clone(),
        )
    }

    /// Whether a gateway counts as online for display purposes, derived
    /// from its last-seen stamp against the configured staleness
    /// threshold. `None` if the gateway is not persisted.
    ///
    /// # Errors
    ///
    /// Returns error on store failure.
    pub fn gateway_is_online(&self, id: &GatewayId) -> Result<Option<bool>> {
        let staleness = chrono::Duration::from_std(self.config.staleness)
            .context("Staleness threshold out of range")?;
        let gateway = self.store.get_gateway(id)?;
        Ok(gateway.map(|g| g.is_online(Utc::now(), staleness)))
    }

    /// Run the telemetry direction until shutdown.
    ///
    /// Subscribes to every gateway's telemetry topic, then handles each
    /// inbound message in its own task so gateways never block each
    /// other. On ctrl-c, outstanding handlers drain before the
    /// transport disconnects.
    ///
    /// # Errors
    ///
    /// Returns error if the initial subscription cannot be queued.
    pub async fn run(self) -> Result<()> {
        self.transport
            .subscribe(&self.topics.telemetry_wildcard())
            .await
            .context("Failed to subscribe to telemetry topics")?;

        let mut inbound = self.transport.start(self.eventloop);
        let ingestor = Arc::new(TelemetryIngestor::new(
            Arc::clone(&self.store),
            self.topics.clone(),
        ));

        tracing::info!("Coordinator running, press Ctrl+C to stop");

        let mut handlers = JoinSet::new();
        loop {
            tokio::select! {
                maybe = inbound.recv() => match maybe {
                    Some(message) => {
                        let ingestor = Arc::clone(&ingestor);
                        handlers.spawn(async move {
                            ingestor.handle_message(&message.topic, &message.payload);
                        });
                    }
                    None => break,
                },
                Some(_) = handlers.join_next(), if !handlers.is_empty() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Stop consuming, then let outstanding handlers finish.
        drop(inbound);
        while handlers.join_next().await.is_some() {}

        tracing::info!("Coordinator stopped");
        Ok(())
    }
}
