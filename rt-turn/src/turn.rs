//! [`run_turn`]: a single pass over a streamed model response with inline
//! tool dispatch.
//!
//! The iteration shape (one model call, classify each completed output
//! item, dispatch tool calls inline) follows `StepIterator::next`; the
//! streaming plumbing (always consuming a `ResponseStream`, forwarding
//! deltas to a sink as they arrive) follows `run_stream`.

use std::time::Duration;

use futures::StreamExt;
use rt_protocol::{
    CompletionPrompt, ContentBlock, Event, EventMsg, ModelClient, ResponseEvent, ResponseItem,
    Role, SharedEventSink, TokenUsage, ToolDefinition, TurnContext,
};
use rt_tool_registry::{ExecuteRequest, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::TurnError;

/// One model-output item together with the response it produced, if any.
#[derive(Debug, Clone)]
pub struct ProcessedResponseItem {
    pub item: ResponseItem,
    pub response: Option<ResponseItem>,
}

/// The outcome of [`run_turn`].
#[derive(Debug, Clone, Default)]
pub struct TurnRunResult {
    pub processed_items: Vec<ProcessedResponseItem>,
    pub total_token_usage: Option<TokenUsage>,
    pub rate_limits: Option<serde_json::Value>,
    /// True if the turn stopped early because `cancellation_token` fired;
    /// the caller must not persist a partial turn's items.
    pub cancelled: bool,
}

fn extract_text(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::OutputText { text } => Some(text.as_str()),
            ContentBlock::InputImage { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

fn tool_definitions(registry: &ToolRegistry) -> Vec<ToolDefinition> {
    match registry.discover(None) {
        Ok(result) => result.tools,
        Err(_) => Vec::new(),
    }
}

/// Execute exactly one turn.
///
/// Consumes the model's stream to completion or until `cancellation_token`
/// fires. Deltas and structured lifecycle events are pushed to `sink` as
/// they arrive; the function itself returns only the accumulated result.
#[instrument(skip(model, turn_input, turn_context, registry, sink, cancellation_token), fields(session_id = %session_id, turn_id = %turn_id))]
pub async fn run_turn<M: ModelClient>(
    model: &M,
    turn_input: Vec<ResponseItem>,
    turn_context: &TurnContext,
    registry: &ToolRegistry,
    sink: &SharedEventSink,
    session_id: &str,
    turn_id: &str,
    tool_timeout: Option<Duration>,
    cancellation_token: CancellationToken,
) -> Result<TurnRunResult, TurnError> {
    let prompt = CompletionPrompt {
        turn_input,
        tools: tool_definitions(registry),
        turn_context,
        signal: cancellation_token.clone(),
    };

    let mut stream = model.stream(prompt).await?;
    let mut result = TurnRunResult::default();

    loop {
        let event = tokio::select! {
            biased;
            () = cancellation_token.cancelled() => {
                result.cancelled = true;
                break;
            }
            event = stream.next() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            ResponseEvent::Created => sink.emit(Event::new(turn_id, EventMsg::Created)),
            ResponseEvent::OutputTextDelta(delta) => {
                sink.emit(Event::new(turn_id, EventMsg::OutputTextDelta { delta }));
            }
            ResponseEvent::ReasoningSummaryDelta(delta) => {
                sink.emit(Event::new(turn_id, EventMsg::ReasoningSummaryDelta { delta }));
            }
            ResponseEvent::ReasoningContentDelta(delta) => {
                sink.emit(Event::new(turn_id, EventMsg::ReasoningContentDelta { delta }));
            }
            ResponseEvent::ReasoningSummaryPartAdded => {}
            ResponseEvent::WebSearchCallBegin { call_id } => {
                sink.emit(Event::new(turn_id, EventMsg::WebSearchCallBegin { call_id }));
            }
            ResponseEvent::RateLimits(snapshot) => {
                result.rate_limits = Some(snapshot.clone());
                sink.emit(Event::new(turn_id, EventMsg::RateLimits { snapshot }));
            }
            ResponseEvent::Completed { response_id, token_usage } => {
                result.total_token_usage = token_usage;
                sink.emit(Event::new(turn_id, EventMsg::Completed { response_id }));
                break;
            }
            ResponseEvent::OutputItemDone(item) => {
                let processed = dispatch_item(
                    item,
                    registry,
                    sink,
                    session_id,
                    turn_id,
                    tool_timeout,
                    &cancellation_token,
                )
                .await;
                result.processed_items.push(processed);
            }
        }
    }

    Ok(result)
}

async fn dispatch_item(
    item: ResponseItem,
    registry: &ToolRegistry,
    sink: &SharedEventSink,
    session_id: &str,
    turn_id: &str,
    tool_timeout: Option<Duration>,
    cancellation_token: &CancellationToken,
) -> ProcessedResponseItem {
    match item {
        ResponseItem::Message { role: Role::Assistant, ref content } => {
            sink.emit(Event::new(
                turn_id,
                EventMsg::AgentMessage { message: extract_text(content) },
            ));
            ProcessedResponseItem { item, response: None }
        }
        ResponseItem::Message { .. } => ProcessedResponseItem { item, response: None },
        ResponseItem::Reasoning { ref content } => {
            sink.emit(Event::new(
                turn_id,
                EventMsg::AgentReasoning { text: extract_text(content) },
            ));
            ProcessedResponseItem { item, response: None }
        }
        ResponseItem::FunctionCall { ref call_id, ref name, ref arguments } => {
            let parameters = serde_json::from_str(arguments).unwrap_or_else(|_| {
                serde_json::json!({ "raw": arguments })
            });
            let request = ExecuteRequest {
                tool_name: name.clone(),
                parameters,
                session_id: session_id.to_string(),
                turn_id: turn_id.to_string(),
                timeout: tool_timeout,
                cancellation_token: cancellation_token.clone(),
            };
            let outcome = registry.execute(request).await;
            let response = ResponseItem::FunctionCallOutput {
                call_id: call_id.clone(),
                output: render_output(&outcome.output),
                success: Some(outcome.success()),
            };
            ProcessedResponseItem { item, response: Some(response) }
        }
        ResponseItem::LocalShellCall { ref call_id, ref command, .. } => {
            let request = ExecuteRequest {
                tool_name: "local_shell".to_string(),
                parameters: serde_json::json!({ "command": command }),
                session_id: session_id.to_string(),
                turn_id: turn_id.to_string(),
                timeout: tool_timeout,
                cancellation_token: cancellation_token.clone(),
            };
            let outcome = registry.execute(request).await;
            let response = ResponseItem::LocalShellCallOutput {
                call_id: call_id.clone(),
                output: render_output(&outcome.output),
            };
            ProcessedResponseItem { item, response: Some(response) }
        }
        ResponseItem::CustomToolCall { ref call_id, ref name, ref input } => {
            let request = ExecuteRequest {
                tool_name: name.clone(),
                parameters: serde_json::json!({ "input": input }),
                session_id: session_id.to_string(),
                turn_id: turn_id.to_string(),
                timeout: tool_timeout,
                cancellation_token: cancellation_token.clone(),
            };
            let outcome = registry.execute(request).await;
            let response = ResponseItem::CustomToolCallOutput {
                call_id: call_id.clone(),
                output: render_output(&outcome.output),
            };
            ProcessedResponseItem { item, response: Some(response) }
        }
        ResponseItem::WebSearchCall { .. } => ProcessedResponseItem { item, response: None },
        ResponseItem::FunctionCallOutput { .. }
        | ResponseItem::LocalShellCallOutput { .. }
        | ResponseItem::CustomToolCallOutput { .. } => {
            // The model never emits an output-only item as an OutputItemDone;
            // treat defensively as a no-op record.
            ProcessedResponseItem { item, response: None }
        }
    }
}

fn render_output(output: &Result<rt_protocol::ToolOutput, rt_tool_registry::ToolError>) -> String {
    match output {
        Ok(tool_output) => tool_output
            .content
            .iter()
            .map(|item| match item {
                rt_protocol::ContentItem::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join(""),
        Err(err) => err.to_string(),
    }
}
