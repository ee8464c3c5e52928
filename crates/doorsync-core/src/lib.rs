//! # DoorSync Core
//!
//! Domain model shared by the DoorSync coordination layer.
//!
//! This crate provides:
//! - Identifier newtypes for gateways, doorlocks, and principals
//! - Entity types mirrored from the authoritative datastore
//! - Effective access grants (credential joined with its schedule windows)
//! - The append-only gateway log record and its kind taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ids;
pub mod model;

pub use ids::{GatewayId, GatewayIdError, LockId, Principal, PrincipalKind};
pub use model::{
    AccessCredential, AccessWindow, ChangeKind, CredentialGrant, CredentialKind, Doorlock,
    Gateway, GatewayLog, LockStatus, LogKind, LogKindError, NewGatewayLog, Scheduler,
};
