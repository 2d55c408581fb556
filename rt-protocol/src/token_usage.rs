//! Token usage accounting.

use serde::{Deserialize, Serialize};

/// Cumulative token usage for a turn or a task.
///
/// A 5-tuple, summed field-wise when aggregating across turns. `total_tokens`
/// is the running total the auto-compaction trigger compares against the
/// context window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Add another turn's usage into this running total, field-wise.
    pub fn accumulate(&mut self, delta: &TokenUsage) {
        self.input_tokens += delta.input_tokens;
        self.cached_input_tokens += delta.cached_input_tokens;
        self.output_tokens += delta.output_tokens;
        self.reasoning_output_tokens += delta.reasoning_output_tokens;
        self.total_tokens += delta.total_tokens;
    }

    /// Returns a new [`TokenUsage`] that is the field-wise sum of `self` and `other`.
    #[must_use]
    pub fn plus(&self, other: &TokenUsage) -> TokenUsage {
        let mut total = *self;
        total.accumulate(other);
        total
    }
}
