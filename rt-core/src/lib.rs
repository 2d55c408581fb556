#![doc = include_str!("../README.md")]

//! Re-exports every component crate behind a module named after its
//! spec component, plus a [`prelude`] for the common wiring path:
//! `RolloutStore` → `Session` → `ToolRegistry` → `Agent`.

/// Shared wire types, traits, and the error taxonomy (spec §3, §6, §7).
pub mod protocol {
    pub use rt_protocol::*;
}

/// Typed registration, schema validation, and timeout-bounded dispatch of
/// tool handlers (spec §4.2).
pub mod tool_registry {
    pub use rt_tool_registry::*;
}

/// Durable, append-only conversation storage with cursor-paginated listing
/// (spec §4.1).
pub mod rollout_store {
    pub use rt_rollout_store::*;
}

/// In-memory conversation state bridging to a durable rollout store
/// (spec §4.3).
pub mod session {
    pub use rt_session::*;
}

/// Single-turn streamed model response and tool dispatch (spec §4.4).
pub mod turn {
    pub use rt_turn::*;
}

/// Multi-turn task loop with cancellation, timeout, and auto-compaction
/// (spec §4.5).
pub mod task {
    pub use rt_task::*;
}

/// Submission queue and task dispatcher (spec §4.6).
pub mod agent {
    pub use rt_agent::*;
}

/// Common imports for wiring up an agent runtime.
pub mod prelude {
    pub use rt_protocol::{
        ApprovalPolicy, BrowserEnvPolicy, CoreError, Event, EventMsg, EventSink, InputItem,
        ModelClient, Op, QuotaThresholds, ReasoningEffort, ReasoningSummary, ResponseItem,
        RuntimeConfig, SandboxPolicy, SharedEventSink, StorageBackend, Submission, ToolContext,
        ToolDefinition, ToolHandler, ToolOutput, TtlPolicy, TurnContext,
    };

    pub use rt_rollout_store::{CreateOptions, InMemoryRolloutStore, RolloutStore};
    pub use rt_session::{BoundedEventSink, Session, Summarizer};
    pub use rt_tool_registry::ToolRegistry;
    pub use rt_task::{TaskOptions, TaskOutcome, TaskRunner};
    pub use rt_agent::{Agent, AgentHandle, QuotaWatcher};
}
