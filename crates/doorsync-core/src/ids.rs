//! Identifier newtypes.
//!
//! Gateway identifiers double as MQTT topic segments, so construction
//! rejects anything that would break topic addressing: empty strings,
//! the `/` separator, and the `+`/`#` wildcard characters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters a gateway identifier must not contain.
const FORBIDDEN: [char; 3] = ['/', '+', '#'];

/// Device-assigned identifier of a gateway.
///
/// Guaranteed non-empty and free of topic separator/wildcard characters,
/// which makes the derived command and telemetry topics injective per
/// gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GatewayId(String);

impl GatewayId {
    /// Create a new gateway identifier with validation.
    ///
    /// # Errors
    ///
    /// Returns `GatewayIdError` if the identifier is empty or contains a
    /// topic separator or wildcard character.
    pub fn new(id: impl Into<String>) -> Result<Self, GatewayIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(GatewayIdError::Empty);
        }
        if let Some(ch) = id.chars().find(|c| FORBIDDEN.contains(c)) {
            return Err(GatewayIdError::ForbiddenChar { id, ch });
        }
        Ok(GatewayId(id))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GatewayId {
    type Err = GatewayIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GatewayId::new(s)
    }
}

impl TryFrom<String> for GatewayId {
    type Error = GatewayIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        GatewayId::new(value)
    }
}

impl From<GatewayId> for String {
    fn from(id: GatewayId) -> Self {
        id.0
    }
}

/// Errors constructing a [`GatewayId`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayIdError {
    /// Identifier was empty
    #[error("gateway id must not be empty")]
    Empty,
    /// Identifier contained a character that breaks topic addressing
    #[error("gateway id {id:?} contains forbidden character {ch:?}")]
    ForbiddenChar {
        /// The offending identifier
        id: String,
        /// The first forbidden character found
        ch: char,
    },
}

/// Datastore identifier of a doorlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockId(pub i64);

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of person a credential or schedule membership belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrincipalKind {
    /// Staff member
    Employee,
    /// Enrolled student
    Student,
}

impl PrincipalKind {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Employee => "employee",
            PrincipalKind::Student => "student",
        }
    }

    /// Parse the storage string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "employee" => Some(PrincipalKind::Employee),
            "student" => Some(PrincipalKind::Student),
            _ => None,
        }
    }
}

/// A person that can hold credentials and schedule memberships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// Employee or student
    pub kind: PrincipalKind,
    /// Datastore identifier within the kind
    pub id: i64,
}

impl Principal {
    /// An employee principal.
    #[must_use]
    pub fn employee(id: i64) -> Self {
        Self {
            kind: PrincipalKind::Employee,
            id,
        }
    }

    /// A student principal.
    #[must_use]
    pub fn student(id: i64) -> Self {
        Self {
            kind: PrincipalKind::Student,
            id,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}
