//! # DoorSync Server
//!
//! Coordination runtime bridging the authoritative door-lock datastore
//! and a fleet of independently connected gateways over MQTT.
//!
//! Two decoupled directions:
//! 1. **Dispatch**: committed CRUD state changes become per-gateway
//!    command messages, published synchronously in commit order
//! 2. **Ingest**: gateway telemetry becomes append-only audit rows and
//!    event-time-guarded status updates
//!
//! There is no synchronous request/reply over the message transport;
//! divergence after a failed publish self-heals because every sync
//! command carries full desired state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(async_fn_in_trait)]

pub mod config;
pub mod dispatcher;
pub mod ingestor;
pub mod runtime;
pub mod transport;

pub use config::ServerConfig;
pub use dispatcher::{CommandDispatcher, DispatchError};
pub use ingestor::{IngestOutcome, TelemetryIngestor};
pub use runtime::Coordinator;
pub use transport::{InboundMessage, MqttTransport, Publisher, TransportConfig, TransportError};
