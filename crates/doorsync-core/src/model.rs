//! Entity types mirrored from the authoritative datastore.

use crate::ids::{GatewayId, LockId, Principal};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A networked device controlling one or more physical door locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    /// Device-assigned identifier, also the topic key
    pub id: GatewayId,
    /// Human-readable name
    pub name: String,
    /// Area the gateway is deployed in
    pub area_id: i64,
    /// When the gateway last reported any telemetry
    pub last_seen: Option<DateTime<Utc>>,
}

impl Gateway {
    /// Whether the gateway counts as online for display purposes.
    ///
    /// Connectivity is derived from the last-seen timestamp against a
    /// staleness threshold; it never suppresses command dispatch.
    #[must_use]
    pub fn is_online(&self, now: DateTime<Utc>, staleness: Duration) -> bool {
        match self.last_seen {
            Some(seen) => now.signed_duration_since(seen) <= staleness,
            None => false,
        }
    }
}

/// Physical state of a doorlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockStatus {
    /// Door is locked
    Locked,
    /// Door is unlocked
    Unlocked,
}

impl LockStatus {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Locked => "locked",
            LockStatus::Unlocked => "unlocked",
        }
    }

    /// Parse the storage string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "locked" => Some(LockStatus::Locked),
            "unlocked" => Some(LockStatus::Unlocked),
            _ => None,
        }
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single controllable lock, owned by exactly one gateway.
///
/// `status`, `status_time`, and `last_command_id` are mutated only by the
/// telemetry ingestor upon confirmed device reports, never optimistically
/// by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doorlock {
    /// Datastore identifier
    pub id: LockId,
    /// Owning gateway; reassigned only by explicit CRUD, never by the core
    pub gateway_id: GatewayId,
    /// Area the lock belongs to
    pub area_id: i64,
    /// Human-readable description
    pub description: String,
    /// Last confirmed physical state
    pub status: LockStatus,
    /// Event time of the report that set `status`
    pub status_time: Option<DateTime<Utc>>,
    /// Command the gateway last acknowledged applying
    pub last_command_id: Option<Uuid>,
}

/// The secret mechanism of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialKind {
    /// Shared password
    Password,
    /// RFID badge
    Rfid,
    /// Keypad PIN
    Keypad,
}

impl CredentialKind {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Password => "password",
            CredentialKind::Rfid => "rfid",
            CredentialKind::Keypad => "keypad",
        }
    }

    /// Parse the storage string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "password" => Some(CredentialKind::Password),
            "rfid" => Some(CredentialKind::Rfid),
            "keypad" => Some(CredentialKind::Keypad),
            _ => None,
        }
    }
}

/// A secret granting its principal access to scheduled locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCredential {
    /// Datastore identifier
    pub id: i64,
    /// Owning principal
    pub principal: Principal,
    /// Secret mechanism
    pub kind: CredentialKind,
    /// Secret material as provisioned to gateways
    pub secret: String,
    /// Validity window start, unbounded if absent
    pub starts_at: Option<DateTime<Utc>>,
    /// Validity window end, unbounded if absent
    pub ends_at: Option<DateTime<Utc>>,
}

/// A time-bounded access rule linking principals to locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduler {
    /// Datastore identifier
    pub id: i64,
    /// Human-readable name
    pub name: String,
    /// Window start
    pub starts_at: DateTime<Utc>,
    /// Window end
    pub ends_at: DateTime<Utc>,
}

/// A time window during which a grant is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessWindow {
    /// Window start
    pub starts_at: DateTime<Utc>,
    /// Window end
    pub ends_at: DateTime<Utc>,
}

/// A credential joined with the schedule windows under which it opens a
/// particular lock. This is what gateways receive in sync commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialGrant {
    /// Credential datastore identifier
    pub credential_id: i64,
    /// Owning principal
    pub principal: Principal,
    /// Secret mechanism
    pub kind: CredentialKind,
    /// Secret material
    pub secret: String,
    /// Schedule windows granting access
    pub windows: Vec<AccessWindow>,
}

/// What happened to an entity in the CRUD layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Entity was created
    Created,
    /// Entity was updated
    Updated,
    /// Entity was deleted
    Deleted,
}

/// Classification of a gateway log row: the five telemetry event kinds
/// plus the anomaly tags the ingestor records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogKind {
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
    /// Payload could not be decoded
    DecodeFailure,
    /// Topic named a gateway not present in the store
    UnknownGateway,
    /// Event referenced a lock not present in the store
    UnknownLock,
}

impl LogKind {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::StatusReport => "status-report",
            LogKind::LockStateChanged => "lock-state-changed",
            LogKind::AccessAttempt => "access-attempt",
            LogKind::Heartbeat => "heartbeat",
            LogKind::ErrorReport => "error-report",
            LogKind::DecodeFailure => "decode-failure",
            LogKind::UnknownGateway => "unknown-gateway",
            LogKind::UnknownLock => "unknown-lock",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogKind {
    type Err = LogKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status-report" => Ok(LogKind::StatusReport),
            "lock-state-changed" => Ok(LogKind::LockStateChanged),
            "access-attempt" => Ok(LogKind::AccessAttempt),
            "heartbeat" => Ok(LogKind::Heartbeat),
            "error-report" => Ok(LogKind::ErrorReport),
            "decode-failure" => Ok(LogKind::DecodeFailure),
            "unknown-gateway" => Ok(LogKind::UnknownGateway),
            "unknown-lock" => Ok(LogKind::UnknownLock),
            other => Err(LogKindError(other.to_string())),
        }
    }
}

/// Error parsing a stored log kind.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown log kind: {0}")]
pub struct LogKindError(pub String);

/// An immutable audit record of one inbound telemetry message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayLog {
    /// Datastore identifier
    pub id: i64,
    /// Gateway named by the topic; kept as raw text so anomalies about
    /// unknown gateways can still be attributed
    pub gateway_id: String,
    /// Row classification
    pub kind: LogKind,
    /// Payload exactly as received
    pub payload: Vec<u8>,
    /// Ingestion time
    pub created_at: DateTime<Utc>,
}

/// Insert form of a [`GatewayLog`]; the store assigns id and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGatewayLog {
    /// Gateway named by the topic
    pub gateway_id: String,
    /// Row classification
    pub kind: LogKind,
    /// Payload exactly as received
    pub payload: Vec<u8>,
}

impl NewGatewayLog {
    /// Build an entry for a message received from `gateway_id`.
    #[must_use]
    pub fn new(gateway_id: impl Into<String>, kind: LogKind, payload: &[u8]) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            kind,
            payload: payload.to_vec(),
        }
    }
}
