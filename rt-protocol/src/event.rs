//! Egress protocol: [`Event`] and its [`EventMsg`] variants.

use serde::{Deserialize, Serialize};

use crate::items::{ApprovalPolicy, BrowserEnvPolicy, ReasoningEffort, ReasoningSummary, SandboxPolicy, ToolsConfig};
use crate::token_usage::TokenUsage;
use crate::traits::ToolDefinition;

/// Severity attached to a [`EventMsg::BackgroundEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundLevel {
    Info,
    Warning,
    Error,
}

/// Why a task was aborted before reaching `TaskComplete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    UserInterrupt,
    AutomaticAbort,
}

/// Aggregate token usage reported on `TaskComplete`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TaskTokenUsage {
    pub total: TokenUsage,
    pub last_turn: TokenUsage,
}

/// The payload of an [`Event`].
///
/// Every terminal path emits exactly one of `TaskComplete | TurnAborted |
/// Error`; everything else is either a lifecycle notice or a
/// streamed delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventMsg {
    TaskStarted {
        submission_id: String,
        model_context_window: u64,
        model: String,
        cwd: String,
        approval_policy: ApprovalPolicy,
        sandbox_policy: SandboxPolicy,
        auto_compact: bool,
        compaction_threshold: f64,
        tools: Vec<String>,
        tools_config: ToolsConfig,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        browser_environment_policy: BrowserEnvPolicy,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning_effort: Option<ReasoningEffort>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning_summary: Option<ReasoningSummary>,
    },
    TaskComplete {
        submission_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_agent_message: Option<String>,
        turn_count: u32,
        compaction_performed: bool,
        aborted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_usage: Option<TaskTokenUsage>,
    },
    TurnAborted {
        submission_id: String,
        reason: AbortReason,
        turn_count: u32,
    },
    AgentMessage {
        message: String,
    },
    AgentReasoning {
        text: String,
    },
    ToolRegistered {
        name: String,
    },
    ToolUnregistered {
        name: String,
    },
    ToolExecutionStart {
        tool_name: String,
        session_id: String,
    },
    ToolExecutionEnd {
        tool_name: String,
        success: bool,
        duration_ms: u64,
    },
    ToolExecutionError {
        tool_name: String,
        message: String,
    },
    ToolExecutionTimeout {
        tool_name: String,
        timeout_ms: u64,
    },
    TokenCount {
        usage: TokenUsage,
    },
    BackgroundEvent {
        level: BackgroundLevel,
        message: String,
    },
    Error {
        message: String,
    },
    ExecApprovalRequest {
        call_id: String,
        command: Vec<String>,
    },
    OutputTextDelta {
        delta: String,
    },
    ReasoningSummaryDelta {
        delta: String,
    },
    ReasoningContentDelta {
        delta: String,
    },
    RateLimits {
        snapshot: serde_json::Value,
    },
    WebSearchCallBegin {
        call_id: String,
    },
    Created,
    Completed {
        response_id: String,
    },
    UserMessage {
        message: String,
    },
    EnteredReviewMode,
    ExitedReviewMode,
    SessionReset,
    /// Reply to `Op::ListTools`.
    ToolList {
        tools: Vec<ToolDefinition>,
    },
}

impl EventMsg {
    /// The tag used by the persistence policy to decide whether
    /// an `event_msg` variant is ever written to a rollout.
    #[must_use]
    pub fn persistence_tag(&self) -> &'static str {
        match self {
            EventMsg::UserMessage { .. } => "UserMessage",
            EventMsg::AgentMessage { .. } => "AgentMessage",
            EventMsg::AgentReasoning { .. } => "AgentReasoning",
            EventMsg::TokenCount { .. } => "TokenCount",
            EventMsg::EnteredReviewMode => "EnteredReviewMode",
            EventMsg::ExitedReviewMode => "ExitedReviewMode",
            EventMsg::TurnAborted { .. } => "TurnAborted",
            EventMsg::TaskStarted { .. } => "TaskStarted",
            EventMsg::TaskComplete { .. } => "TaskComplete",
            EventMsg::ToolRegistered { .. } => "ToolRegistered",
            EventMsg::ToolUnregistered { .. } => "ToolUnregistered",
            EventMsg::ToolExecutionStart { .. } => "ToolExecutionStart",
            EventMsg::ToolExecutionEnd { .. } => "ToolExecutionEnd",
            EventMsg::ToolExecutionError { .. } => "ToolExecutionError",
            EventMsg::ToolExecutionTimeout { .. } => "ToolExecutionTimeout",
            EventMsg::BackgroundEvent { .. } => "BackgroundEvent",
            EventMsg::Error { .. } => "Error",
            EventMsg::ExecApprovalRequest { .. } => "ExecApprovalRequest",
            EventMsg::OutputTextDelta { .. } => "OutputTextDelta",
            EventMsg::ReasoningSummaryDelta { .. } => "ReasoningSummaryDelta",
            EventMsg::ReasoningContentDelta { .. } => "ReasoningContentDelta",
            EventMsg::RateLimits { .. } => "RateLimits",
            EventMsg::WebSearchCallBegin { .. } => "WebSearchCallBegin",
            EventMsg::Created => "Created",
            EventMsg::Completed { .. } => "Completed",
            EventMsg::SessionReset => "SessionReset",
            EventMsg::ToolList { .. } => "ToolList",
        }
    }

    /// Terminal task-lifecycle events are never dropped by a bounded event
    /// sink, even under backpressure.
    #[must_use]
    pub fn is_never_drop(&self) -> bool {
        matches!(
            self,
            EventMsg::TaskStarted { .. }
                | EventMsg::TaskComplete { .. }
                | EventMsg::TurnAborted { .. }
                | EventMsg::Error { .. }
        )
    }
}

/// `{id (submission id), msg}` — a single unit of egress work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub msg: EventMsg,
}

impl Event {
    #[must_use]
    pub fn new(id: impl Into<String>, msg: EventMsg) -> Self {
        Self { id: id.into(), msg }
    }
}
