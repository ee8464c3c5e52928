//! # DoorSync Proto
//!
//! Wire protocol between the coordination layer and gateway devices:
//! the MQTT topic addressing scheme and the JSON message types carried
//! on those topics.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod messages;
pub mod topics;

pub use messages::{CommandKind, CommandMessage, MessageError, TelemetryEvent, TelemetryKind};
pub use topics::{Channel, TopicScheme};
