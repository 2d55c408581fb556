//! The background quota watcher (spec §5): polls a [`StorageBackend`] at a
//! fixed cadence and, crossing the warning/critical thresholds in
//! [`QuotaThresholds`], escalates from a warning event to TTL cleanup to a
//! transient-cache clear. Persistent conversation data is never evicted by
//! this path — only [`RolloutStore::cleanup_expired`] and the backend's own
//! transient cache are touched.

use std::sync::Arc;
use std::time::Duration;

use rt_protocol::{BackgroundLevel, Event, EventMsg, QuotaThresholds, SharedEventSink, StorageBackend};
use rt_rollout_store::RolloutStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// The id background-sourced events (not tied to any submission) carry,
/// matching the convention `rt_tool_registry` uses for lifecycle events
/// emitted outside of a `execute()` call.
const BACKGROUND_SOURCE_ID: &str = "system";

/// Default poll cadence (spec §5: "checks usage at 10-minute cadence").
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(600);

/// Polls [`StorageBackend::usage_ratio`] on an interval and reacts to
/// threshold crossings. Constructed once per runtime and driven by
/// [`QuotaWatcher::run`], typically `tokio::spawn`ed alongside the
/// [`crate::Agent`] dispatch loop.
pub struct QuotaWatcher {
    store: Arc<dyn RolloutStore>,
    backend: Box<dyn StorageBackend>,
    events: SharedEventSink,
    thresholds: QuotaThresholds,
    poll_interval: Duration,
}

impl QuotaWatcher {
    #[must_use]
    pub fn new(
        store: Arc<dyn RolloutStore>,
        backend: Box<dyn StorageBackend>,
        events: SharedEventSink,
        thresholds: QuotaThresholds,
    ) -> Self {
        Self {
            store,
            backend,
            events,
            thresholds,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the default 10-minute cadence; tests use this to avoid
    /// sleeping in real time.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs until `shutdown` is cancelled. Each tick calls
    /// [`Self::check_once`]; failures in one tick never stop the next.
    #[instrument(skip(self, shutdown))]
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("quota watcher shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.check_once().await;
                }
            }
        }
    }

    /// One poll-and-react cycle. Public so callers can drive it directly in
    /// tests instead of waiting on the interval.
    #[instrument(skip(self))]
    pub async fn check_once(&mut self) {
        let ratio = self.backend.usage_ratio().await;
        if ratio < self.thresholds.warning {
            return;
        }

        if ratio >= self.thresholds.critical {
            self.emit(
                BackgroundLevel::Warning,
                format!(
                    "storage usage at {:.0}% (critical threshold {:.0}%), running TTL cleanup",
                    ratio * 100.0,
                    self.thresholds.critical * 100.0
                ),
            );
            match self.store.cleanup_expired().await {
                Ok(count) => {
                    info!(count, "quota watcher cleaned up expired rollouts");
                }
                Err(err) => {
                    warn!(error = %err, "quota watcher cleanup_expired failed");
                    self.emit(
                        BackgroundLevel::Warning,
                        format!("quota cleanup failed: {err}"),
                    );
                    return;
                }
            }

            let ratio_after = self.backend.usage_ratio().await;
            if ratio_after >= self.thresholds.warning {
                self.emit(
                    BackgroundLevel::Warning,
                    "storage still above warning threshold after TTL cleanup, clearing transient cache".to_string(),
                );
                self.backend.clear_transient_cache().await;
            }
        } else {
            self.emit(
                BackgroundLevel::Warning,
                format!(
                    "storage usage at {:.0}% (warning threshold {:.0}%)",
                    ratio * 100.0,
                    self.thresholds.warning * 100.0
                ),
            );
        }
    }

    fn emit(&self, level: BackgroundLevel, message: String) {
        self.events.emit(Event::new(
            BACKGROUND_SOURCE_ID,
            EventMsg::BackgroundEvent { level, message },
        ));
    }
}
