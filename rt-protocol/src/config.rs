//! The configuration snapshot the core consumes.
//!
//! The core never loads this from environment variables or disk itself —
//! that is the external config loader's job — it only consumes an
//! already-validated snapshot, constructed by the caller and simply read
//! here.

use serde::{Deserialize, Serialize};

/// Either a fixed TTL in days, or permanent (never expires).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlPolicy {
    Days(u32),
    Permanent,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        TtlPolicy::Days(60)
    }
}

/// Browser storage quota thresholds for the background quota watcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaThresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Default for QuotaThresholds {
    fn default() -> Self {
        Self {
            warning: 0.80,
            critical: 0.95,
        }
    }
}

/// The full set of environment/config knobs passed into the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub ttl: TtlPolicy,
    pub event_sink_capacity: usize,
    pub turn_timeout_ms: Option<u64>,
    pub tool_timeout_ms: u64,
    pub max_turns: u32,
    pub compaction_threshold: f64,
    pub quota_thresholds: QuotaThresholds,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ttl: TtlPolicy::default(),
            event_sink_capacity: 256,
            turn_timeout_ms: None,
            tool_timeout_ms: 120_000,
            max_turns: 50,
            compaction_threshold: 0.75,
            quota_thresholds: QuotaThresholds::default(),
        }
    }
}
