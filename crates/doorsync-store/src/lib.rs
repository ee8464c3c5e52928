//! # DoorSync Store
//!
//! Persistence gateway between the coordination layer and the
//! authoritative datastore.
//!
//! The [`EntityStore`] trait is the complete datastore surface the
//! coordination core consumes: entity reads for command construction and
//! the status/log writes the telemetry ingestor performs. Entity CRUD
//! beyond this boundary belongs to the external administration layer.
//!
//! Status and last-seen writes are conditional on event time, so
//! concurrent or redelivered reports converge to the newest state
//! regardless of arrival order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use doorsync_core::{
    CredentialGrant, Doorlock, Gateway, GatewayId, LockId, LockStatus, NewGatewayLog, Principal,
};
use uuid::Uuid;

/// Datastore operations required by the coordination core.
pub trait EntityStore: Send + Sync {
    /// Fetch a gateway by identifier.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn get_gateway(&self, id: &GatewayId) -> StoreResult<Option<Gateway>>;

    /// Fetch a doorlock by identifier.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn get_doorlock(&self, id: LockId) -> StoreResult<Option<Doorlock>>;

    /// All locks owned by a gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn list_locks_for_gateway(&self, id: &GatewayId) -> StoreResult<Vec<Doorlock>>;

    /// All locks a principal is authorized for, through its schedule
    /// memberships. Each lock appears once even when granted by several
    /// schedules.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn list_authorized_locks(&self, principal: &Principal) -> StoreResult<Vec<Doorlock>>;

    /// All locks a schedule grants access to.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn list_locks_for_scheduler(&self, scheduler_id: i64) -> StoreResult<Vec<Doorlock>>;

    /// The full authorized-credential set of a lock: every credential of
    /// every principal scheduled onto it, with the access windows under
    /// which each grant holds.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn list_credentials_for_lock(&self, id: LockId) -> StoreResult<Vec<CredentialGrant>>;

    /// Apply a device-reported status if it is not older than the one
    /// stored. Returns whether the write applied; a stale event yields
    /// `false` and leaves the row untouched. When `command_id` is
    /// present it is recorded as the lock's last applied command.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    fn update_doorlock_status(
        &self,
        id: LockId,
        status: LockStatus,
        event_time: DateTime<Utc>,
        command_id: Option<Uuid>,
    ) -> StoreResult<bool>;

    /// Advance a gateway's last-seen timestamp; older stamps are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    fn update_gateway_last_seen(&self, id: &GatewayId, time: DateTime<Utc>) -> StoreResult<()>;

    /// Append one immutable audit row. Returns the row id.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    fn append_gateway_log(&self, entry: &NewGatewayLog) -> StoreResult<i64>;
}
