//! Opaque pagination cursor for [`RolloutStore::list_conversations`].
//!
//! [`RolloutStore::list_conversations`]: https://docs.rs/rt-rollout-store (see `rt_rollout_store::RolloutStore`)

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// `{timestamp, id}`, serialized as `"<unix-ms>|<uuid>"`.
///
/// Callers must treat this as opaque; the wire format is
/// documented here only so store implementations agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub updated: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    #[must_use]
    pub fn new(updated: DateTime<Utc>, id: Uuid) -> Self {
        Self { updated, id }
    }

    /// Serialize to the wire format `"<unix-ms>|<uuid>"`.
    #[must_use]
    pub fn serialize(&self) -> String {
        format!("{}|{}", self.updated.timestamp_millis(), self.id)
    }

    /// Parse the wire format. Returns `None` on any malformed input
    /// —
    /// this never panics or errors, by design.
    #[must_use]
    pub fn deserialize(raw: &str) -> Option<Self> {
        let (ms_str, id_str) = raw.split_once('|')?;
        let ms: i64 = ms_str.parse().ok()?;
        let updated = DateTime::from_timestamp_millis(ms)?;
        let id = Uuid::parse_str(id_str).ok()?;
        Some(Self { updated, id })
    }
}
