//! Command dispatch for domain state changes.
//!
//! The CRUD layer calls one notify operation after committing its own
//! change; the dispatcher resolves the affected locks, builds one
//! full-state command per lock, and publishes it to the owning
//! gateway's command topic. Publishing happens synchronously in the
//! caller's path, so commands for one lock reach the broker in commit
//! order. A publish failure surfaces to the caller without rolling the
//! datastore change back; the divergence heals on the next successful
//! full-state command for the entity.

use crate::transport::{Publisher, TransportError};
use doorsync_core::{AccessCredential, ChangeKind, Doorlock, GatewayId, Scheduler};
use doorsync_proto::{CommandMessage, MessageError, TopicScheme};
use doorsync_store::{EntityStore, StoreError};
use std::sync::Arc;
use uuid::Uuid;

/// Translates committed domain events into outbound gateway commands.
pub struct CommandDispatcher<P, S> {
    publisher: P,
    store: Arc<S>,
    topics: TopicScheme,
}

impl<P: Publisher, S: EntityStore> CommandDispatcher<P, S> {
    /// Create a dispatcher over a publisher and the entity store.
    pub fn new(publisher: P, store: Arc<S>, topics: TopicScheme) -> Self {
        Self {
            publisher,
            store,
            topics,
        }
    }

    /// A lock was created, updated, or deleted.
    ///
    /// Publishes one command to the owning gateway: the lock's full
    /// authorized-credential set and desired state, or a removal.
    /// Returns the command id.
    ///
    /// # Errors
    ///
    /// Returns error if the owning gateway is not persisted, on store
    /// failure, or on delivery failure.
    pub async fn notify_lock_changed(
        &self,
        lock: &Doorlock,
        change: ChangeKind,
    ) -> Result<Uuid, DispatchError> {
        if self.store.get_gateway(&lock.gateway_id)?.is_none() {
            return Err(DispatchError::UnknownGateway(lock.gateway_id.clone()));
        }

        let command = match change {
            ChangeKind::Deleted => CommandMessage::remove_lock(lock.id),
            ChangeKind::Created | ChangeKind::Updated => self.build_sync(lock)?,
        };
        self.send(&lock.gateway_id, &command).await?;
        Ok(command.command_id)
    }

    /// A credential changed (created, rotated, revoked, ...).
    ///
    /// Re-syncs every lock the credential's principal is authorized
    /// for: one command per lock, addressed to that lock's gateway.
    /// Returns the command ids in lock order.
    ///
    /// # Errors
    ///
    /// Returns error on store failure or on the first delivery failure;
    /// locks not yet synced heal on their next command.
    pub async fn notify_credential_changed(
        &self,
        credential: &AccessCredential,
    ) -> Result<Vec<Uuid>, DispatchError> {
        let locks = self.store.list_authorized_locks(&credential.principal)?;
        self.sync_all(&locks).await
    }

    /// A schedule changed: re-sync every lock it grants access to.
    ///
    /// # Errors
    ///
    /// Returns error on store failure or on the first delivery failure.
    pub async fn notify_schedule_changed(
        &self,
        scheduler: &Scheduler,
    ) -> Result<Vec<Uuid>, DispatchError> {
        let locks = self.store.list_locks_for_scheduler(scheduler.id)?;
        self.sync_all(&locks).await
    }

    async fn sync_all(&self, locks: &[Doorlock]) -> Result<Vec<Uuid>, DispatchError> {
        let mut command_ids = Vec::with_capacity(locks.len());
        for lock in locks {
            let command = self.build_sync(lock)?;
            self.send(&lock.gateway_id, &command).await?;
            command_ids.push(command.command_id);
        }
        Ok(command_ids)
    }

    fn build_sync(&self, lock: &Doorlock) -> Result<CommandMessage, DispatchError> {
        let credentials = self.store.list_credentials_for_lock(lock.id)?;
        Ok(CommandMessage::sync_lock(lock.id, lock.status, credentials))
    }

    async fn send(
        &self,
        gateway: &GatewayId,
        command: &CommandMessage,
    ) -> Result<(), DispatchError> {
        let topic = self.topics.command(gateway);
        let payload = command.to_json()?;
        self.publisher.publish(&topic, payload).await?;
        tracing::debug!(
            command_id = %command.command_id,
            gateway = %gateway,
            lock = %command.lock_id,
            kind = ?command.kind,
            "Dispatched command"
        );
        Ok(())
    }
}

/// Errors from command dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The target lock's gateway is not persisted
    #[error("gateway {0} is not persisted")]
    UnknownGateway(GatewayId),
    /// Reading entity state failed
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The command could not be encoded
    #[error(transparent)]
    Encode(#[from] MessageError),
    /// The command could not be delivered to the broker
    #[error("delivery failed: {0}")]
    Delivery(#[from] TransportError),
}
