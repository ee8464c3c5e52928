//! JSON message types carried on command and telemetry topics.

use chrono::{DateTime, Utc};
use doorsync_core::{CredentialGrant, LockId, LockStatus, LogKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a command instructs the gateway to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    /// Replace the lock's full local access state with the carried one
    SyncLock,
    /// Forget the lock entirely
    RemoveLock,
}

/// Server-originated instruction for one lock on one gateway.
///
/// `command_id` is unique per command, letting the gateway deduplicate
/// redeliveries and echo back an acknowledgement in later telemetry.
/// Sync commands always carry the full desired state rather than a diff,
/// so a missed command is superseded by the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMessage {
    /// Unique command identifier
    pub command_id: Uuid,
    /// Instruction kind
    pub kind: CommandKind,
    /// Target lock
    pub lock_id: LockId,
    /// Desired physical state, for sync commands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired_state: Option<LockStatus>,
    /// Full authorized-credential set, for sync commands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Vec<CredentialGrant>>,
}

impl CommandMessage {
    /// Build a full-state sync command with a fresh command id.
    #[must_use]
    pub fn sync_lock(
        lock_id: LockId,
        desired_state: LockStatus,
        credentials: Vec<CredentialGrant>,
    ) -> Self {
        Self {
            command_id: Uuid::new_v4(),
            kind: CommandKind::SyncLock,
            lock_id,
            desired_state: Some(desired_state),
            credentials: Some(credentials),
        }
    }

    /// Build a removal command with a fresh command id.
    #[must_use]
    pub fn remove_lock(lock_id: LockId) -> Self {
        Self {
            command_id: Uuid::new_v4(),
            kind: CommandKind::RemoveLock,
            lock_id,
            desired_state: None,
            credentials: None,
        }
    }

    /// Serialize to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, MessageError> {
        serde_json::to_vec(self).map_err(|e| MessageError::Serialize(e.to_string()))
    }

    /// Deserialize from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_json(bytes: &[u8]) -> Result<Self, MessageError> {
        serde_json::from_slice(bytes).map_err(|e| MessageError::Deserialize(e.to_string()))
    }
}

/// Kind of a device-originated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TelemetryKind {
    /// Periodic full status report
    StatusReport,
    /// A lock changed physical state
    LockStateChanged,
    /// Someone presented a credential at a lock
    AccessAttempt,
    /// Liveness beacon
    Heartbeat,
    /// Device-reported error
    ErrorReport,
}

impl TelemetryKind {
    /// Whether events of this kind may carry a lock status to apply.
    #[must_use]
    pub fn carries_status(self) -> bool {
        matches!(
            self,
            TelemetryKind::StatusReport | TelemetryKind::LockStateChanged
        )
    }
}

impl From<TelemetryKind> for LogKind {
    fn from(kind: TelemetryKind) -> Self {
        match kind {
            TelemetryKind::StatusReport => LogKind::StatusReport,
            TelemetryKind::LockStateChanged => LogKind::LockStateChanged,
            TelemetryKind::AccessAttempt => LogKind::AccessAttempt,
            TelemetryKind::Heartbeat => LogKind::Heartbeat,
            TelemetryKind::ErrorReport => LogKind::ErrorReport,
        }
    }
}

/// Device-originated event published on a gateway's telemetry topic.
///
/// `timestamp` is the device's own event time; the ingestor uses it to
/// discard reordered or redelivered status updates. `command_id` is the
/// echo of the last command the gateway applied, when it reports one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    /// Event kind
    pub kind: TelemetryKind,
    /// Device event time
    pub timestamp: DateTime<Utc>,
    /// Lock the event concerns, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_id: Option<LockId>,
    /// Reported physical state, for status-bearing events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LockStatus>,
    /// Echoed acknowledgement of the last applied command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_id: Option<Uuid>,
    /// Free-form detail (error text, credential presented, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TelemetryEvent {
    /// A lock status report.
    #[must_use]
    pub fn status_report(lock_id: LockId, status: LockStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: TelemetryKind::StatusReport,
            timestamp,
            lock_id: Some(lock_id),
            status: Some(status),
            command_id: None,
            detail: None,
        }
    }

    /// A lock state change notification.
    #[must_use]
    pub fn lock_state_changed(
        lock_id: LockId,
        status: LockStatus,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: TelemetryKind::LockStateChanged,
            timestamp,
            lock_id: Some(lock_id),
            status: Some(status),
            command_id: None,
            detail: None,
        }
    }

    /// A liveness beacon.
    #[must_use]
    pub fn heartbeat(timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: TelemetryKind::Heartbeat,
            timestamp,
            lock_id: None,
            status: None,
            command_id: None,
            detail: None,
        }
    }

    /// Attach the echoed command acknowledgement.
    #[must_use]
    pub fn with_command_id(mut self, command_id: Uuid) -> Self {
        self.command_id = Some(command_id);
        self
    }

    /// Serialize to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, MessageError> {
        serde_json::to_vec(self).map_err(|e| MessageError::Serialize(e.to_string()))
    }

    /// Deserialize from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_json(bytes: &[u8]) -> Result<Self, MessageError> {
        serde_json::from_slice(bytes).map_err(|e| MessageError::Deserialize(e.to_string()))
    }
}

/// Errors for message serialization/deserialization.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MessageError {
    /// Serialization failed
    #[error("serialization failed: {0}")]
    Serialize(String),
    /// Deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorsync_core::{CredentialKind, Principal};

    #[test]
    fn command_json_roundtrip() {
        let grant = CredentialGrant {
            credential_id: 4,
            principal: Principal::employee(7),
            kind: CredentialKind::Rfid,
            secret: "0A1B2C3D".to_string(),
            windows: Vec::new(),
        };
        let command = CommandMessage::sync_lock(LockId(3), LockStatus::Locked, vec![grant]);

        let bytes = command.to_json().unwrap();
        let decoded = CommandMessage::from_json(&bytes).unwrap();

        assert_eq!(command, decoded);
    }

    #[test]
    fn sync_command_wire_shape() {
        let command = CommandMessage::sync_lock(LockId(9), LockStatus::Unlocked, Vec::new());
        let value: serde_json::Value =
            serde_json::from_slice(&command.to_json().unwrap()).unwrap();

        assert_eq!(value["kind"], "sync-lock");
        assert_eq!(value["lockId"], 9);
        assert_eq!(value["desiredState"], "unlocked");
        assert!(value["commandId"].is_string());
    }

    #[test]
    fn remove_command_omits_state_fields() {
        let command = CommandMessage::remove_lock(LockId(2));
        let value: serde_json::Value =
            serde_json::from_slice(&command.to_json().unwrap()).unwrap();

        assert_eq!(value["kind"], "remove-lock");
        assert!(value.get("desiredState").is_none());
        assert!(value.get("credentials").is_none());
    }

    #[test]
    fn telemetry_json_roundtrip() {
        let event = TelemetryEvent::lock_state_changed(LockId(5), LockStatus::Locked, Utc::now())
            .with_command_id(Uuid::new_v4());

        let bytes = event.to_json().unwrap();
        let decoded = TelemetryEvent::from_json(&bytes).unwrap();

        assert_eq!(event, decoded);
    }

    #[test]
    fn telemetry_decodes_device_shape() {
        let raw = br#"{
            "kind": "status-report",
            "timestamp": "2026-02-11T08:30:00Z",
            "lockId": 12,
            "status": "locked"
        }"#;

        let event = TelemetryEvent::from_json(raw).unwrap();
        assert_eq!(event.kind, TelemetryKind::StatusReport);
        assert_eq!(event.lock_id, Some(LockId(12)));
        assert_eq!(event.status, Some(LockStatus::Locked));
        assert!(event.command_id.is_none());
    }

    #[test]
    fn malformed_telemetry_is_an_error() {
        assert!(TelemetryEvent::from_json(b"not json").is_err());
        assert!(TelemetryEvent::from_json(b"{\"kind\":\"telepathy\"}").is_err());
    }

    #[test]
    fn status_bearing_kinds() {
        assert!(TelemetryKind::StatusReport.carries_status());
        assert!(TelemetryKind::LockStateChanged.carries_status());
        assert!(!TelemetryKind::Heartbeat.carries_status());
        assert!(!TelemetryKind::AccessAttempt.carries_status());
        assert!(!TelemetryKind::ErrorReport.carries_status());
    }
}
