//! The conversation data model: [`ResponseItem`], [`RolloutItem`], [`SessionMeta`],
//! and the immutable [`TurnContext`] snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ConversationId;

/// The role of a `message` item's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A text or structured block of message content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content.
    OutputText { text: String },
    /// An input image or document reference, base64 or URL encoded.
    InputImage { source: String },
}

/// One discrete element of a conversation.
///
/// Tagged by `type`, a discriminated union over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseItem {
    Message {
        role: Role,
        content: Vec<ContentBlock>,
    },
    Reasoning {
        content: Vec<ContentBlock>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success: Option<bool>,
    },
    LocalShellCall {
        call_id: String,
        command: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    LocalShellCallOutput {
        call_id: String,
        output: String,
    },
    CustomToolCall {
        call_id: String,
        name: String,
        input: String,
    },
    CustomToolCallOutput {
        call_id: String,
        output: String,
    },
    WebSearchCall {
        call_id: String,
        query: String,
    },
}

impl ResponseItem {
    /// The `call_id` this item references, if it is a call or call-output
    /// variant. Used to enforce the call/output pairing invariant (I4).
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        match self {
            ResponseItem::FunctionCall { call_id, .. }
            | ResponseItem::FunctionCallOutput { call_id, .. }
            | ResponseItem::LocalShellCall { call_id, .. }
            | ResponseItem::LocalShellCallOutput { call_id, .. }
            | ResponseItem::CustomToolCall { call_id, .. }
            | ResponseItem::CustomToolCallOutput { call_id, .. }
            | ResponseItem::WebSearchCall { call_id, .. } => Some(call_id),
            ResponseItem::Message { .. } | ResponseItem::Reasoning { .. } => None,
        }
    }

    /// True if this item is a call that expects a matching output item.
    #[must_use]
    pub fn is_call(&self) -> bool {
        matches!(
            self,
            ResponseItem::FunctionCall { .. }
                | ResponseItem::LocalShellCall { .. }
                | ResponseItem::CustomToolCall { .. }
        )
    }

    /// True if this item is the output half of a call.
    #[must_use]
    pub fn is_call_output(&self) -> bool {
        matches!(
            self,
            ResponseItem::FunctionCallOutput { .. }
                | ResponseItem::LocalShellCallOutput { .. }
                | ResponseItem::CustomToolCallOutput { .. }
        )
    }

    /// Returns the item's persistence-policy tag, as used by
    /// [`crate::event::EventMsg`]-adjacent filtering in `rt-rollout-store`.
    #[must_use]
    pub fn persistence_tag(&self) -> &'static str {
        match self {
            ResponseItem::Message { .. } => "message",
            ResponseItem::Reasoning { .. } => "reasoning",
            ResponseItem::FunctionCall { .. } => "function_call",
            ResponseItem::FunctionCallOutput { .. } => "function_call_output",
            ResponseItem::LocalShellCall { .. } => "local_shell_call",
            ResponseItem::LocalShellCallOutput { .. } => "local_shell_call_output",
            ResponseItem::CustomToolCall { .. } => "custom_tool_call",
            ResponseItem::CustomToolCallOutput { .. } => "custom_tool_call_output",
            ResponseItem::WebSearchCall { .. } => "web_search_call",
        }
    }
}

/// `{id, startedAt, originator, agentVersion, instructions?, gitInfo?}` —
/// always the first item of a rollout, at sequence 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: ConversationId,
    pub started_at: DateTime<Utc>,
    pub originator: String,
    pub agent_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_info: Option<GitInfo>,
}

/// Optional VCS context captured at session start, for provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitInfo {
    pub commit_hash: Option<String>,
    pub branch: Option<String>,
    pub repository_url: Option<String>,
}

/// A compacted-history summary, replacing a prefix of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactedItem {
    pub message: String,
}

/// The persisted envelope around one conversation element.
///
/// One of `session_meta | response_item | compacted | turn_context | event_msg`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RolloutItem {
    SessionMeta(SessionMeta),
    ResponseItem(ResponseItem),
    Compacted(CompactedItem),
    TurnContext(TurnContext),
    EventMsg(crate::event::EventMsg),
}

impl RolloutItem {
    /// The tag used by the persistence policy to decide whether
    /// this variant (and, for `response_item`/`event_msg`, its inner tag)
    /// should ever reach storage.
    #[must_use]
    pub fn persistence_tags(&self) -> (&'static str, Option<&'static str>) {
        match self {
            RolloutItem::SessionMeta(_) => ("session_meta", None),
            RolloutItem::Compacted(_) => ("compacted", None),
            RolloutItem::TurnContext(_) => ("turn_context", None),
            RolloutItem::ResponseItem(item) => ("response_item", Some(item.persistence_tag())),
            RolloutItem::EventMsg(msg) => ("event_msg", Some(msg.persistence_tag())),
        }
    }
}

/// Approval policy for tool execution, injected by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPolicy {
    Always,
    OnRequest,
    Never,
}

/// Sandbox policy tag, injected by the host: no concrete sandbox is
/// implemented here, only the label the host attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxPolicy {
    ReadOnly,
    WorkspaceWrite,
    DangerFullAccess,
}

/// Browser environment access policy, injected by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEnvPolicy {
    Disabled,
    ActiveTabOnly,
    AllTabs,
}

/// Reasoning effort hint passed through to the model client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

/// Reasoning summary verbosity hint passed through to the model client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningSummary {
    Auto,
    Concise,
    Detailed,
}

/// Declarative tool configuration surfaced to the model (distinct from the
/// registry's own bookkeeping — this is what gets echoed into
/// `TaskStarted.tools_config`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub web_search: bool,
    pub local_shell: bool,
}

/// An immutable snapshot of the configuration a task runs under.
///
/// Captured once at task submission and never mutated mid-task: every turn within one task observes the same `TurnContext`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnContext {
    pub model: String,
    pub cwd: String,
    pub approval_policy: ApprovalPolicy,
    pub sandbox_policy: SandboxPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_summary: Option<ReasoningSummary>,
    pub tools_config: ToolsConfig,
    pub browser_env_policy: BrowserEnvPolicy,
    pub model_context_window: u64,
}

impl TurnContext {
    /// Apply a JSON-merge-patch-style partial update, producing a new
    /// snapshot. Used by `Op::Configure`: the patch only takes
    /// effect for the *next* task, never an in-flight one.
    #[must_use]
    pub fn with_patch(&self, patch: &TurnContextPatch) -> Self {
        let mut next = self.clone();
        if let Some(model) = &patch.model {
            next.model = model.clone();
        }
        if let Some(cwd) = &patch.cwd {
            next.cwd = cwd.clone();
        }
        if let Some(policy) = patch.approval_policy {
            next.approval_policy = policy;
        }
        if let Some(policy) = patch.sandbox_policy {
            next.sandbox_policy = policy;
        }
        if patch.reasoning_effort.is_some() {
            next.reasoning_effort = patch.reasoning_effort;
        }
        if patch.reasoning_summary.is_some() {
            next.reasoning_summary = patch.reasoning_summary;
        }
        if let Some(tools_config) = &patch.tools_config {
            next.tools_config = tools_config.clone();
        }
        if let Some(policy) = patch.browser_env_policy {
            next.browser_env_policy = policy;
        }
        if let Some(window) = patch.model_context_window {
            next.model_context_window = window;
        }
        next
    }
}

/// A partial update to a [`TurnContext`], as carried by `Op::Configure`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnContextPatch {
    pub model: Option<String>,
    pub cwd: Option<String>,
    pub approval_policy: Option<ApprovalPolicy>,
    pub sandbox_policy: Option<SandboxPolicy>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub reasoning_summary: Option<ReasoningSummary>,
    pub tools_config: Option<ToolsConfig>,
    pub browser_env_policy: Option<BrowserEnvPolicy>,
    pub model_context_window: Option<u64>,
}
