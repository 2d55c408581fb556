//! Opaque identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A UUID v4 identifying one conversation/rollout.
///
/// Wraps [`uuid::Uuid`] rather than exposing it directly so that only a
/// valid v4 can ever be constructed through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// Generate a fresh random v4 id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID, rejecting anything that isn't version 4.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConversationId`] if `uuid` is not a v4 UUID.
    pub fn from_uuid(uuid: Uuid) -> Result<Self, InvalidConversationId> {
        if uuid.get_version_num() != 4 {
            return Err(InvalidConversationId(uuid.to_string()));
        }
        Ok(Self(uuid))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = InvalidConversationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(|_| InvalidConversationId(s.to_string()))?;
        Self::from_uuid(uuid)
    }
}

/// The string was not a valid UUID v4.
#[derive(Debug, thiserror::Error)]
#[error("invalid conversation id: {0}")]
pub struct InvalidConversationId(pub String);
