//! Telemetry ingestion from gateway devices.
//!
//! Every inbound message on a recognized telemetry topic yields exactly
//! one audit row: tagged with the decoded event kind, or with the
//! anomaly that terminated processing (`unknown-gateway`,
//! `decode-failure`, `unknown-lock`). Redelivered messages append
//! duplicate rows by design; the audit trail is not deduplicated.
//!
//! Status updates go through the store's event-time-conditional write,
//! so they are idempotent and reordered or redelivered reports can
//! never roll a lock's state backwards.

use doorsync_core::{GatewayId, LogKind, NewGatewayLog};
use doorsync_proto::{Channel, TelemetryEvent, TopicScheme};
use doorsync_store::{EntityStore, StoreResult};
use std::sync::Arc;

/// What ingesting one message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Event logged and a lock status applied
    Applied,
    /// Event logged; it carried no status to apply
    Logged,
    /// Event logged but its status was older than the stored one
    Stale,
    /// Payload could not be decoded; anomaly logged
    DecodeFailure,
    /// Topic named a gateway missing from the store; anomaly logged
    UnknownGateway,
    /// Event referenced a lock missing from the store; anomaly logged
    UnknownLock,
    /// Topic was outside the scheme; nothing could be attributed
    Ignored,
    /// A store failure forced the message to be dropped
    Dropped,
}

/// Consumes device-origin messages and writes them through the store.
pub struct TelemetryIngestor<S> {
    store: Arc<S>,
    topics: TopicScheme,
}

impl<S: EntityStore> TelemetryIngestor<S> {
    /// Create an ingestor over the entity store.
    pub fn new(store: Arc<S>, topics: TopicScheme) -> Self {
        Self { store, topics }
    }

    /// Handle one inbound message.
    ///
    /// Never fails: store errors are logged and the message dropped, so
    /// one bad message cannot stall the subscription.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> IngestOutcome {
        let Some((gateway_id, channel)) = self.topics.parse(topic) else {
            tracing::warn!(topic, "Ignoring message on unrecognized topic");
            return IngestOutcome::Ignored;
        };
        if channel != Channel::Telemetry {
            tracing::warn!(topic, "Ignoring non-telemetry message");
            return IngestOutcome::Ignored;
        }

        match self.ingest(&gateway_id, payload) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    gateway = %gateway_id,
                    "Dropping telemetry message after store failure"
                );
                IngestOutcome::Dropped
            }
        }
    }

    fn ingest(&self, gateway_id: &GatewayId, payload: &[u8]) -> StoreResult<IngestOutcome> {
        if self.store.get_gateway(gateway_id)?.is_none() {
            tracing::warn!(gateway = %gateway_id, "Telemetry from unknown gateway");
            self.append_log(gateway_id, LogKind::UnknownGateway, payload)?;
            return Ok(IngestOutcome::UnknownGateway);
        }

        let event = match TelemetryEvent::from_json(payload) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    gateway = %gateway_id,
                    payload_len = payload.len(),
                    "Undecodable telemetry payload"
                );
                self.append_log(gateway_id, LogKind::DecodeFailure, payload)?;
                return Ok(IngestOutcome::DecodeFailure);
            }
        };

        // Status-bearing events must name a lock we know about.
        let status_target = event
            .lock_id
            .filter(|_| event.kind.carries_status() && event.status.is_some());
        if let Some(lock_id) = status_target {
            if self.store.get_doorlock(lock_id)?.is_none() {
                tracing::warn!(gateway = %gateway_id, lock = %lock_id, "Telemetry for unknown lock");
                self.append_log(gateway_id, LogKind::UnknownLock, payload)?;
                return Ok(IngestOutcome::UnknownLock);
            }
        }

        self.append_log(gateway_id, event.kind.into(), payload)?;
        self.store
            .update_gateway_last_seen(gateway_id, event.timestamp)?;

        let Some(lock_id) = status_target else {
            return Ok(IngestOutcome::Logged);
        };
        let Some(status) = event.status else {
            return Ok(IngestOutcome::Logged);
        };

        let applied = self.store.update_doorlock_status(
            lock_id,
            status,
            event.timestamp,
            event.command_id,
        )?;
        if applied {
            tracing::debug!(
                gateway = %gateway_id,
                lock = %lock_id,
                status = %status,
                "Applied reported lock status"
            );
            Ok(IngestOutcome::Applied)
        } else {
            // Expected under broker redelivery and reordering.
            tracing::debug!(gateway = %gateway_id, lock = %lock_id, "Discarded stale status report");
            Ok(IngestOutcome::Stale)
        }
    }

    fn append_log(&self, gateway_id: &GatewayId, kind: LogKind, payload: &[u8]) -> StoreResult<()> {
        self.store
            .append_gateway_log(&NewGatewayLog::new(gateway_id.as_str(), kind, payload))?;
        Ok(())
    }
}
