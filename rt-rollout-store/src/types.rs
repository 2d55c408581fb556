//! Wire/storage shapes: the `rollouts` row, an `items` row, listing pages,
//! and history-resume results.

use chrono::{DateTime, Utc};
use rt_protocol::{ConversationId, Cursor, RolloutItem, SessionMeta};
use serde::{Deserialize, Serialize};

/// `rollouts.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutStatus {
    Active,
    Archived,
    Expired,
}

/// One row of the `rollouts` metadata table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutMeta {
    pub id: ConversationId,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub session_meta: SessionMeta,
    pub item_count: u64,
    pub status: RolloutStatus,
}

/// One row of the `items` log: `{rolloutId, timestamp, sequence, type, payload}`,
/// with `type`/`payload` folded into the tagged [`RolloutItem`] enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub rollout_id: ConversationId,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
    pub item: RolloutItem,
}

/// `{id, created, updated, sessionMeta, head[<=5], tail[<=5], itemCount}` —
/// one entry of [`crate::RolloutStore::list_conversations`]'s page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub session_meta: SessionMeta,
    pub head: Vec<RolloutItem>,
    pub tail: Vec<RolloutItem>,
    pub item_count: u64,
}

/// A page of [`ConversationSummary`]s, newest-`updated`-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<ConversationSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// True iff the scan cap stopped the query before
    /// `pageSize` was reached or the table was exhausted.
    pub reached_cap: bool,
}

impl Page {
    pub(crate) fn cursor_of(meta: &RolloutMeta) -> Cursor {
        Cursor::new(meta.updated, meta.id.as_uuid())
    }
}

/// The outcome of [`crate::RolloutStore::get_history`].
#[derive(Debug, Clone)]
pub enum HistoryOutcome {
    /// No rollout by that id exists; the caller should start a fresh one.
    New,
    /// All items of an existing rollout, in sequence order.
    Resumed {
        rollout_id: ConversationId,
        items: Vec<RolloutItem>,
    },
}

/// `{rolloutCount, itemCount, rolloutBytes, itemBytes}`; sizes are estimated by serialized JSON length.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StorageStats {
    pub rollout_count: u64,
    pub item_count: u64,
    pub rollout_bytes: u64,
    pub item_bytes: u64,
}
