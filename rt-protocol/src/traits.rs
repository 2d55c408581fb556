//! The two external collaborator traits the core consumes: [`ModelClient`]
//! and [`ToolHandler`], plus the tool schema/IO shapes they share.
//!
//! Both traits use RPITIT (return-position `impl Trait` in traits) rather
//! than `async_trait` — intentionally not object-safe; callers compose via
//! generics rather than `dyn`.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::items::{ResponseItem, TurnContext};
use crate::token_usage::TokenUsage;

/// A JSON Schema object describing a tool's parameters.
pub type JsonSchema = serde_json::Value;

/// `{type, name, description, parameters | ...}` — what gets surfaced to
/// the model as an invocable tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDefinition {
    Function {
        name: String,
        description: String,
        parameters: JsonSchema,
    },
    Custom {
        name: String,
        description: String,
    },
    LocalShell,
    WebSearch,
}

impl ToolDefinition {
    /// The tool's name, if it has one (`local_shell`/`web_search` are
    /// singleton tool types and carry no name).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            ToolDefinition::Function { name, .. } | ToolDefinition::Custom { name, .. } => {
                Some(name)
            }
            ToolDefinition::LocalShell | ToolDefinition::WebSearch => None,
        }
    }
}

/// A content item within a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text { text: String },
}

/// The context a tool handler executes under.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub turn_id: String,
    pub tool_name: String,
    pub cancellation_token: CancellationToken,
}

/// The result of a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
    pub is_error: bool,
}

impl ToolOutput {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text { text: text.into() }],
            structured_content: None,
            is_error: false,
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text { text: text.into() }],
            structured_content: None,
            is_error: true,
        }
    }
}

/// `(params, context) -> Result<ToolOutput, E>` — a first-class handler
/// value, looked up by name in the registry rather than dispatched via
/// language-level types.
///
/// Boxed and type-erased so the registry can store heterogeneous handlers
/// in one map.
pub trait ToolHandler: Send + Sync {
    fn call<'a>(
        &'a self,
        params: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolHandlerError>> + Send + 'a>>;
}

impl<F, Fut> ToolHandler for F
where
    F: Fn(serde_json::Value, &ToolContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolOutput, ToolHandlerError>> + Send + 'static,
{
    fn call<'a>(
        &'a self,
        params: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolHandlerError>> + Send + 'a>> {
        Box::pin((self)(params, ctx))
    }
}

/// An error surfaced by a [`ToolHandler`] implementation. Receives no raw
/// event sink.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ToolHandlerError(pub String);

impl ToolHandlerError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An event emitted incrementally during [`ModelClient::stream`].
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    Created,
    OutputTextDelta(String),
    ReasoningSummaryDelta(String),
    ReasoningContentDelta(String),
    ReasoningSummaryPartAdded,
    OutputItemDone(ResponseItem),
    WebSearchCallBegin { call_id: String },
    RateLimits(serde_json::Value),
    Completed {
        response_id: String,
        token_usage: Option<TokenUsage>,
    },
}

/// The request shape passed to [`ModelClient::stream`].
pub struct CompletionPrompt<'a> {
    pub turn_input: Vec<ResponseItem>,
    pub tools: Vec<ToolDefinition>,
    pub turn_context: &'a TurnContext,
    pub signal: CancellationToken,
}

/// A boxed stream of [`ResponseEvent`]s.
pub type ResponseStream = Pin<Box<dyn Stream<Item = ResponseEvent> + Send>>;

/// The model-provider abstraction the core consumes.
///
/// Concrete HTTP clients for specific providers are out of scope;
/// this is the seam they plug into.
pub trait ModelClient: Send + Sync {
    fn stream(
        &self,
        prompt: CompletionPrompt<'_>,
    ) -> impl Future<Output = Result<ResponseStream, ProviderError>> + Send;
}

/// A sink for [`crate::event::Event`]s, injected into the components that
/// emit them.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: crate::event::Event);
}

/// The shared-ownership handle components actually hold, since a sink is
/// usually fanned out to more than one live component (registry, session,
/// turn manager) at once.
pub type SharedEventSink = std::sync::Arc<dyn EventSink>;

/// The host's storage-quota seam: Chrome storage, `IndexedDB`, or any other
/// browser-local quota the core itself never names (spec §5, §9's
/// "Host-API leakage" redesign flag). A background quota watcher polls
/// [`StorageBackend::usage_ratio`] and, once the critical threshold is
/// crossed and `cleanup_expired` alone did not bring usage back under the
/// warning line, calls [`StorageBackend::clear_transient_cache`].
///
/// Persistent conversation data is never evicted by this path — only the
/// rollout store's own TTL cleanup touches rollouts. Boxed-future rather
/// than RPITIT, matching [`ToolHandler`]/`Summarizer`-style host seams that
/// get stored behind a `Box<dyn _>` rather than threaded through generics.
pub trait StorageBackend: Send + Sync {
    fn usage_ratio(&self) -> Pin<Box<dyn Future<Output = f64> + Send + '_>>;

    fn clear_transient_cache(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
