//! MQTT transport client.
//!
//! One logical broker connection for the process lifetime. Connection
//! loss is retried indefinitely with capped exponential backoff, and
//! every recorded subscription is re-issued after each reconnect, so
//! subscriptions survive broker restarts transparently.

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Configuration for the transport client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// MQTT broker URL (e.g. <tcp://localhost:1883>)
    pub broker_url: String,
    /// Client ID for the MQTT connection
    pub client_id: String,
    /// Keep-alive interval
    pub keep_alive: Duration,
    /// Upper bound on how long one publish may take before it is
    /// reported as a delivery failure
    pub publish_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            broker_url: "tcp://localhost:1883".to_string(),
            client_id: "doorsync-server".to_string(),
            keep_alive: Duration::from_secs(30),
            publish_timeout: Duration::from_secs(10),
        }
    }
}

/// A message received from a gateway.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Topic the message arrived on
    pub topic: String,
    /// Payload exactly as received
    pub payload: Vec<u8>,
}

/// Outbound publish seam.
///
/// The command dispatcher is generic over this so its fan-out and
/// ordering behavior can be exercised without a broker.
pub trait Publisher: Send + Sync {
    /// Publish a payload at at-least-once delivery quality.
    ///
    /// # Errors
    ///
    /// Returns a delivery error when the publish fails or times out;
    /// failures are reported, never silently dropped.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;
}

impl<P: Publisher> Publisher for Arc<P> {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        (**self).publish(topic, payload).await
    }
}

/// MQTT-backed transport client.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    filters: Arc<Mutex<Vec<String>>>,
    publish_timeout: Duration,
}

impl MqttTransport {
    /// Create the client and its event loop.
    ///
    /// The returned [`EventLoop`] must be handed to [`Self::start`];
    /// nothing moves on the wire until it is polled.
    ///
    /// # Errors
    ///
    /// Returns error if the broker URL cannot be parsed.
    pub fn connect(config: &TransportConfig) -> Result<(Self, EventLoop), TransportError> {
        let (host, port) = parse_mqtt_url(&config.broker_url)?;

        let mut options = MqttOptions::new(&config.client_id, host, port);
        options.set_keep_alive(config.keep_alive);

        let (client, eventloop) = AsyncClient::new(options, 100);

        Ok((
            Self {
                client,
                filters: Arc::new(Mutex::new(Vec::new())),
                publish_timeout: config.publish_timeout,
            },
            eventloop,
        ))
    }

    /// Subscribe to a topic filter and record it for re-subscription
    /// after reconnects.
    ///
    /// # Errors
    ///
    /// Returns error if the subscription cannot be queued.
    pub async fn subscribe(&self, filter: &str) -> Result<(), TransportError> {
        tracing::info!(filter, "Subscribing");
        self.client
            .subscribe(filter, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;
        self.filters().push(filter.to_string());
        Ok(())
    }

    /// Drive the connection and forward inbound publishes.
    ///
    /// Spawns the poll loop; it runs until the returned receiver is
    /// dropped, reconnecting with capped exponential backoff on every
    /// connection error.
    pub fn start(&self, mut eventloop: EventLoop) -> mpsc::Receiver<InboundMessage> {
        let (tx, rx) = mpsc::channel(100);
        let transport = self.clone();

        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        backoff = INITIAL_BACKOFF;
                        let message = InboundMessage {
                            topic: publish.topic,
                            payload: publish.payload.to_vec(),
                        };
                        if tx.send(message).await.is_err() {
                            tracing::debug!("Inbound receiver dropped, stopping transport");
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        backoff = INITIAL_BACKOFF;
                        tracing::info!("Connected to MQTT broker");
                        transport.resubscribe().await;
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        tracing::debug!("Subscription acknowledged");
                    }
                    Ok(_) => {
                        backoff = INITIAL_BACKOFF;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, backoff_secs = backoff.as_secs(), "MQTT connection error, retrying");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        });

        rx
    }

    async fn resubscribe(&self) {
        let filters = self.filters().clone();
        for filter in filters {
            if let Err(e) = self.client.subscribe(&filter, QoS::AtLeastOnce).await {
                tracing::warn!(error = %e, filter, "Failed to restore subscription");
            }
        }
    }

    fn filters(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.filters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Publisher for MqttTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        tracing::debug!(topic, payload_len = payload.len(), "Publishing");

        let publish = self.client.publish(topic, QoS::AtLeastOnce, false, payload);
        match tokio::time::timeout(self.publish_timeout, publish).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Publish(e.to_string())),
            Err(_) => Err(TransportError::PublishTimeout(self.publish_timeout)),
        }
    }
}

/// Parse an MQTT URL into host and port.
fn parse_mqtt_url(input: &str) -> Result<(String, u16), TransportError> {
    if input.contains("://") {
        let url = Url::parse(input)
            .map_err(|e| TransportError::InvalidBrokerUrl(format!("{input}: {e}")))?;

        match url.scheme() {
            "tcp" | "mqtt" => {}
            scheme => {
                return Err(TransportError::InvalidBrokerUrl(format!(
                    "{input}: unsupported scheme '{scheme}'"
                )));
            }
        }

        let host = url
            .host_str()
            .ok_or_else(|| TransportError::InvalidBrokerUrl(format!("{input}: missing host")))?;
        let port = url.port().unwrap_or(1883);

        return Ok((host.to_string(), port));
    }

    let mut parts = input.split(':');
    let host = parts
        .next()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| TransportError::InvalidBrokerUrl(format!("{input}: missing host")))?;
    let port = match parts.next() {
        None => 1883,
        Some(port) => port.parse().map_err(|_| {
            TransportError::InvalidBrokerUrl(format!("{input}: invalid port '{port}'"))
        })?,
    };
    if parts.next().is_some() {
        return Err(TransportError::InvalidBrokerUrl(format!(
            "{input}: too many ':' separators"
        )));
    }

    Ok((host.to_string(), port))
}

/// Errors from the transport client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Invalid MQTT broker URL
    #[error("invalid MQTT broker URL: {0}")]
    InvalidBrokerUrl(String),
    /// Subscription failed
    #[error("subscription error: {0}")]
    Subscribe(String),
    /// Publish failed
    #[error("publish error: {0}")]
    Publish(String),
    /// Publish did not complete within the configured bound
    #[error("publish timed out after {0:?}")]
    PublishTimeout(Duration),
}
