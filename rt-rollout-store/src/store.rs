//! The [`RolloutStore`] trait and its in-memory implementation.
//!
//! A two-table, sequence-indexed model: a `rollouts` metadata table plus a
//! separately indexed `items` log, written through a per-rollout
//! [`Recorder`] that serializes concurrent appends into one write queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rt_protocol::{ConversationId, Cursor, GitInfo, RolloutItem, SessionMeta, TtlPolicy};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

use crate::error::StoreError;
use crate::policy::filter_persisted;
use crate::types::{ConversationSummary, HistoryOutcome, ItemRecord, Page, RolloutMeta, RolloutStatus, StorageStats};

/// Caps a single [`RolloutStore::list_conversations`] scan.
const LIST_SCAN_CAP: usize = 100;

/// `{originator, agentVersion, instructions?, gitInfo?, ttl}` — everything
/// [`RolloutStore::create`] needs to build the first `session_meta` item.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub originator: String,
    pub agent_version: String,
    pub instructions: Option<String>,
    pub git_info: Option<GitInfo>,
    pub ttl: TtlPolicy,
}

/// Durable, append-only persistence for a conversation's items plus
/// conversation-level listing.
///
/// A trait (rather than one concrete type) so a host can supply a
/// different backing store without this crate naming a concrete browser
/// API; the in-memory implementation below is
/// the one backend fully provided, since a durable on-disk/IndexedDB
/// backend is inherently host-specific. [`Recorder`] is tied to
/// [`InMemoryRolloutStore`] rather than generic over the trait — a host
/// backend wanting its own recorder re-implements this trait and returns
/// its own handle type from its own inherent methods.
#[async_trait]
pub trait RolloutStore: Send + Sync {
    /// Create a fresh rollout: writes the metadata row and appends a
    /// `session_meta` item at sequence 0.
    async fn create(
        &self,
        conversation_id: ConversationId,
        options: CreateOptions,
    ) -> Result<Recorder, StoreError>;

    /// Resume an existing rollout. Errors [`StoreError::RolloutNotFound`]
    /// if no metadata row exists; new writes start at `last_sequence + 1`.
    async fn resume(&self, rollout_id: ConversationId) -> Result<Recorder, StoreError>;

    /// Newest-first page of conversation summaries.
    async fn list_conversations(
        &self,
        page_size: usize,
        cursor: Option<Cursor>,
    ) -> Result<Page, StoreError>;

    /// All items of a rollout in sequence order, or [`HistoryOutcome::New`]
    /// if it doesn't exist.
    async fn get_history(&self, rollout_id: ConversationId) -> Result<HistoryOutcome, StoreError>;

    /// Delete every rollout whose `expiresAt` is in the past, plus its
    /// items. Rollouts with no `expiresAt` are never touched.
    async fn cleanup_expired(&self) -> Result<u64, StoreError>;

    /// Exact row counts; sizes estimated by serialized length.
    async fn get_storage_stats(&self) -> Result<StorageStats, StoreError>;
}

#[derive(Default)]
struct Inner {
    rollouts: HashMap<ConversationId, RolloutMeta>,
    items: HashMap<ConversationId, Vec<RolloutItem>>,
}

/// In-memory [`RolloutStore`]: `Arc<RwLock<...>>`-guarded tables, suitable
/// for tests and ephemeral sessions. No persistence across process restart
/// — a durable on-disk/IndexedDB backend is host-specific and out of scope.
#[derive(Clone, Default)]
pub struct InMemoryRolloutStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryRolloutStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn summarize(meta: &RolloutMeta, items: &[RolloutItem]) -> ConversationSummary {
    let head = items.iter().take(5).cloned().collect();
    let tail = items
        .iter()
        .rev()
        .take(5)
        .rev()
        .cloned()
        .collect::<Vec<_>>();
    ConversationSummary {
        id: meta.id,
        created: meta.created,
        updated: meta.updated,
        session_meta: meta.session_meta.clone(),
        head,
        tail,
        item_count: meta.item_count,
    }
}

#[async_trait]
impl RolloutStore for InMemoryRolloutStore {
    #[instrument(skip(self, options), fields(conversation_id = %conversation_id))]
    async fn create(
        &self,
        conversation_id: ConversationId,
        options: CreateOptions,
    ) -> Result<Recorder, StoreError> {
        let now = Utc::now();
        let expires_at = match options.ttl {
            TtlPolicy::Permanent => None,
            TtlPolicy::Days(days) => Some(now + ChronoDuration::days(i64::from(days))),
        };
        let session_meta = SessionMeta {
            id: conversation_id,
            started_at: now,
            originator: options.originator,
            agent_version: options.agent_version,
            instructions: options.instructions,
            git_info: options.git_info,
        };
        let meta = RolloutMeta {
            id: conversation_id,
            created: now,
            updated: now,
            expires_at,
            session_meta: session_meta.clone(),
            item_count: 1,
            status: RolloutStatus::Active,
        };

        let mut inner = self.inner.write().await;
        inner.rollouts.insert(conversation_id, meta);
        inner.items.insert(
            conversation_id,
            vec![RolloutItem::SessionMeta(session_meta)],
        );
        drop(inner);

        Ok(Recorder::new(conversation_id, Arc::new(self.clone()), 1))
    }

    #[instrument(skip(self), fields(rollout_id = %rollout_id))]
    async fn resume(&self, rollout_id: ConversationId) -> Result<Recorder, StoreError> {
        let inner = self.inner.read().await;
        if !inner.rollouts.contains_key(&rollout_id) {
            return Err(StoreError::RolloutNotFound(rollout_id.to_string()));
        }
        let next_sequence = inner
            .items
            .get(&rollout_id)
            .map_or(0, |items| items.len() as u64);
        drop(inner);
        Ok(Recorder::new(rollout_id, Arc::new(self.clone()), next_sequence))
    }

    #[instrument(skip(self))]
    async fn list_conversations(
        &self,
        page_size: usize,
        cursor: Option<Cursor>,
    ) -> Result<Page, StoreError> {
        if !(1..=LIST_SCAN_CAP).contains(&page_size) {
            return Err(StoreError::Database {
                operation: "list_conversations".to_string(),
                reason: format!("page_size must be in [1,{LIST_SCAN_CAP}], got {page_size}"),
            });
        }

        let inner = self.inner.read().await;
        let mut metas: Vec<&RolloutMeta> = inner.rollouts.values().collect();
        metas.sort_by(|a, b| {
            b.updated
                .cmp(&a.updated)
                .then_with(|| b.id.as_uuid().cmp(&a.id.as_uuid()))
        });

        let start = match cursor {
            None => 0,
            Some(c) => metas
                .iter()
                .position(|m| (m.updated, m.id.as_uuid()) < (c.updated, c.id))
                .unwrap_or(metas.len()),
        };
        let remaining = &metas[start..];
        let scan_window_len = remaining.len().min(LIST_SCAN_CAP);
        let scan_window = &remaining[..scan_window_len];

        let mut out = Vec::new();
        for meta in scan_window {
            if out.len() == page_size {
                break;
            }
            let items = inner.items.get(&meta.id).cloned().unwrap_or_default();
            out.push(summarize(meta, &items));
        }

        let reached_cap =
            out.len() < page_size && scan_window_len == LIST_SCAN_CAP && remaining.len() > LIST_SCAN_CAP;
        let next_cursor = if start + out.len() < metas.len() {
            out.last()
                .map(|s| Cursor::new(s.updated, s.id.as_uuid()).serialize())
        } else {
            None
        };

        Ok(Page {
            items: out,
            next_cursor,
            reached_cap,
        })
    }

    #[instrument(skip(self), fields(rollout_id = %rollout_id))]
    async fn get_history(&self, rollout_id: ConversationId) -> Result<HistoryOutcome, StoreError> {
        let inner = self.inner.read().await;
        match inner.items.get(&rollout_id) {
            None => Ok(HistoryOutcome::New),
            Some(items) => Ok(HistoryOutcome::Resumed {
                rollout_id,
                items: items.clone(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn cleanup_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let expired: Vec<ConversationId> = inner
            .rollouts
            .values()
            .filter(|meta| meta.expires_at.is_some_and(|expires| expires < now))
            .map(|meta| meta.id)
            .collect();

        let mut count = 0u64;
        for id in expired {
            inner.rollouts.remove(&id);
            inner.items.remove(&id);
            count += 1;
        }
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn get_storage_stats(&self) -> Result<StorageStats, StoreError> {
        let inner = self.inner.read().await;
        let rollout_count = inner.rollouts.len() as u64;
        let item_count = inner.items.values().map(|v| v.len() as u64).sum();
        let rollout_bytes = inner
            .rollouts
            .values()
            .map(|m| serde_json::to_vec(m).map(|v| v.len() as u64).unwrap_or(0))
            .sum();
        let item_bytes = inner
            .items
            .values()
            .flatten()
            .map(|i| serde_json::to_vec(i).map(|v| v.len() as u64).unwrap_or(0))
            .sum();

        Ok(StorageStats {
            rollout_count,
            item_count,
            rollout_bytes,
            item_bytes,
        })
    }
}

impl InMemoryRolloutStore {
    async fn append_locked(
        &self,
        rollout_id: ConversationId,
        start_sequence: u64,
        items: Vec<RolloutItem>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let current_len = inner
            .items
            .get(&rollout_id)
            .map_or(0, |v| v.len() as u64);
        if current_len != start_sequence {
            return Err(StoreError::Database {
                operation: "append".to_string(),
                reason: format!(
                    "sequence conflict: recorder expected to write at {start_sequence}, rollout is at {current_len}"
                ),
            });
        }

        let count = items.len() as u64;
        let now = Utc::now();
        inner
            .items
            .entry(rollout_id)
            .or_default()
            .extend(items);
        if let Some(meta) = inner.rollouts.get_mut(&rollout_id) {
            meta.updated = now;
            meta.item_count += count;
        }
        Ok(start_sequence + count)
    }
}

/// A handle for appending to one rollout, returned by
/// [`RolloutStore::create`]/[`RolloutStore::resume`].
///
/// Must not be shared across sessions.
/// Serializes concurrent `append` calls through an internal write-queue
/// mutex so sequence numbers stay dense and gap-free even if a caller
/// races two `append`s on the same `Recorder`.
pub struct Recorder {
    rollout_id: ConversationId,
    store: Arc<InMemoryRolloutStore>,
    write_queue: Mutex<u64>,
    closed: AtomicBool,
}

impl Recorder {
    fn new(rollout_id: ConversationId, store: Arc<InMemoryRolloutStore>, next_sequence: u64) -> Self {
        Self {
            rollout_id,
            store,
            write_queue: Mutex::new(next_sequence),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn rollout_id(&self) -> ConversationId {
        self.rollout_id
    }

    /// Filter `items` by the persistence policy, then append them in one
    /// transaction with consecutive sequence numbers. A no-op if every item is policy-rejected.
    #[instrument(skip(self, items), fields(rollout_id = %self.rollout_id))]
    pub async fn append(&self, items: Vec<RolloutItem>) -> Result<(), StoreError> {
        let persisted = filter_persisted(items);
        if persisted.is_empty() {
            return Ok(());
        }
        let mut next_sequence = self.write_queue.lock().await;
        let new_next = self
            .store
            .append_locked(self.rollout_id, *next_sequence, persisted)
            .await?;
        *next_sequence = new_next;
        Ok(())
    }

    /// Returns once all queued writes are durable. A no-op for the
    /// in-memory backend, since every write already completed synchronously
    /// under the write-queue lock.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.write_queue.lock().await;
        Ok(())
    }

    /// Flushes, then releases the underlying handle. Idempotent.
    pub async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.flush().await?;
        let mut inner = self.store.inner.write().await;
        if let Some(meta) = inner.rollouts.get_mut(&self.rollout_id) {
            meta.status = RolloutStatus::Archived;
        }
        Ok(())
    }
}
