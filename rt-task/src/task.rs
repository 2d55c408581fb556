//! [`TaskRunner`]: the multi-turn drive loop.
//!
//! Drives the max-turns check, calls a turn, accumulates usage, and
//! decides done on each pass, with cancellation as a first-class production
//! field and auto-compaction delegated to [`rt_session::Session::compact`].

use std::time::Duration;

use rt_protocol::{
    AbortReason, BackgroundLevel, ContentBlock, Event, EventMsg, InputItem, ModelClient, Role,
    TaskTokenUsage, TokenUsage, TurnContext,
};
use rt_session::{Session, Summarizer};
use rt_tool_registry::ToolRegistry;
use rt_turn::{run_turn, TurnRunResult};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::TaskError;

/// `MAX_TURNS`.
pub const MAX_TURNS: u32 = 50;
/// `COMPACTION_THRESHOLD`, as a fraction of `modelContextWindow`.
pub const COMPACTION_THRESHOLD: f64 = 0.75;

/// Per-task knobs.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    pub timeout_ms: Option<u64>,
    pub auto_compact: bool,
    pub max_turns: u32,
    pub compaction_threshold: f64,
    pub tool_timeout: Option<Duration>,
    pub compaction_tail: usize,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            auto_compact: true,
            max_turns: MAX_TURNS,
            compaction_threshold: COMPACTION_THRESHOLD,
            tool_timeout: None,
            compaction_tail: rt_session::DEFAULT_COMPACTION_TAIL,
        }
    }
}

/// The terminal outcome of [`TaskRunner::run`]. The
/// corresponding terminal event has already been emitted into the
/// session's sink by the time this is returned.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed {
        turn_count: u32,
        last_agent_message: Option<String>,
        compaction_performed: bool,
        token_usage: TaskTokenUsage,
    },
    Aborted {
        reason: AbortReason,
        turn_count: u32,
    },
    Failed {
        message: String,
    },
}

/// Drives one task to completion.
///
/// Owns the task's cancellation signal and loop-local counters; borrows the
/// [`Session`] and a [`TurnContext`] snapshot for the duration of the task.
pub struct TaskRunner<'a, M: ModelClient> {
    session: &'a mut Session,
    turn_context: TurnContext,
    model: &'a M,
    registry: &'a ToolRegistry,
    summarizer: &'a dyn Summarizer,
    cancellation_token: CancellationToken,
}

impl<'a, M: ModelClient> TaskRunner<'a, M> {
    pub fn new(
        session: &'a mut Session,
        turn_context: TurnContext,
        model: &'a M,
        registry: &'a ToolRegistry,
        summarizer: &'a dyn Summarizer,
    ) -> Self {
        Self {
            session,
            turn_context,
            model,
            registry,
            summarizer,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// The cancellation handle a caller stores to later request
    /// interruption.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Sets the internal cancellation flag; any in-flight turn observes
    /// this via its own race.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    #[instrument(skip(self, input), fields(submission_id = %submission_id))]
    pub async fn run(
        &mut self,
        submission_id: &str,
        input: Vec<InputItem>,
        options: TaskOptions,
    ) -> Result<TaskOutcome, TaskError> {
        self.emit_task_started(submission_id, &options);

        if input.is_empty() {
            let outcome = TaskOutcome::Completed {
                turn_count: 0,
                last_agent_message: None,
                compaction_performed: false,
                token_usage: TaskTokenUsage::default(),
            };
            self.emit_task_complete(submission_id, &outcome);
            return Ok(outcome);
        }

        self.session
            .record_input_and_rollout_usermsg(input)
            .await?;

        let mut turn_count: u32 = 0;
        let mut total_usage = TokenUsage::default();
        let mut last_token_usage = TokenUsage::default();
        let mut compaction_performed = false;
        let mut compaction_attempted = false;
        let mut last_agent_message: Option<String> = None;

        let outcome = loop {
            if self.cancellation_token.is_cancelled() {
                break self.abort(submission_id, AbortReason::UserInterrupt, turn_count);
            }
            if turn_count >= options.max_turns {
                self.session.emit_event(
                    submission_id,
                    EventMsg::BackgroundEvent {
                        level: BackgroundLevel::Warning,
                        message: format!("automatic abort: reached max turns ({})", options.max_turns),
                    },
                );
                break self.abort(submission_id, AbortReason::AutomaticAbort, turn_count);
            }

            let pending = self.session.take_pending_input();
            let turn_input = self.session.build_turn_input_with_history(&pending);
            if !pending.is_empty() {
                self.session.record_conversation_items(pending);
            }

            let turn_result = match self.run_one_turn(submission_id, turn_input, &options).await {
                TurnOutcome::Ran(result) => result,
                TurnOutcome::TimedOut => {
                    if self.cancellation_token.is_cancelled() {
                        break self.abort(submission_id, AbortReason::UserInterrupt, turn_count);
                    }
                    break self.fail(submission_id, "turn timed out".to_string());
                }
                TurnOutcome::Error(err) => {
                    if self.cancellation_token.is_cancelled() {
                        break self.abort(submission_id, AbortReason::UserInterrupt, turn_count);
                    }
                    break self.fail(submission_id, err.to_string());
                }
            };

            if turn_result.cancelled {
                break self.abort(submission_id, AbortReason::UserInterrupt, turn_count);
            }

            turn_count += 1;

            let task_complete = turn_result
                .processed_items
                .iter()
                .all(|processed| processed.response.is_none());

            let mut dual_items = Vec::new();
            for processed in &turn_result.processed_items {
                dual_items.push(processed.item.clone());
                if let Some(response) = &processed.response {
                    dual_items.push(response.clone());
                }
            }
            self.session.record_conversation_items_dual(dual_items).await?;

            if let Some(text) = last_assistant_text(&turn_result) {
                last_agent_message = Some(text);
            }
            if let Some(usage) = turn_result.total_token_usage {
                total_usage.accumulate(&usage);
                last_token_usage = usage;
            }

            if options.auto_compact
                && !compaction_attempted
                && self.turn_context.model_context_window > 0
                && total_usage.total_tokens as f64
                    >= self.turn_context.model_context_window as f64 * options.compaction_threshold
            {
                compaction_attempted = true;
                match self
                    .session
                    .compact(self.summarizer, options.compaction_tail)
                    .await
                {
                    Ok(()) => {
                        compaction_performed = true;
                        info!(turn_count, "context compacted");
                        self.session.emit_event(
                            submission_id,
                            EventMsg::BackgroundEvent {
                                level: BackgroundLevel::Info,
                                message: format!("Context compacted at turn {turn_count}"),
                            },
                        );
                    }
                    Err(e) => {
                        warn!(turn_count, error = %e, "context compaction failed");
                        self.session.emit_event(
                            submission_id,
                            EventMsg::BackgroundEvent {
                                level: BackgroundLevel::Warning,
                                message: format!(
                                    "Context compaction failed at turn {turn_count}: {e}"
                                ),
                            },
                        );
                    }
                }
            }

            if task_complete {
                break TaskOutcome::Completed {
                    turn_count,
                    last_agent_message,
                    compaction_performed,
                    token_usage: TaskTokenUsage { total: total_usage, last_turn: last_token_usage },
                };
            }
        };

        self.emit_task_complete(submission_id, &outcome);
        Ok(outcome)
    }

    async fn run_one_turn(
        &self,
        submission_id: &str,
        turn_input: Vec<rt_protocol::ResponseItem>,
        options: &TaskOptions,
    ) -> TurnOutcome {
        let turn_future = run_turn(
            self.model,
            turn_input,
            &self.turn_context,
            self.registry,
            &self.session_sink(),
            &self.session.conversation_id().to_string(),
            submission_id,
            options.tool_timeout,
            self.cancellation_token.clone(),
        );

        match options.timeout_ms {
            None => match turn_future.await {
                Ok(result) => TurnOutcome::Ran(result),
                Err(e) => TurnOutcome::Error(e.into()),
            },
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), turn_future).await {
                Ok(Ok(result)) => TurnOutcome::Ran(result),
                Ok(Err(e)) => TurnOutcome::Error(e.into()),
                Err(_elapsed) => TurnOutcome::TimedOut,
            },
        }
    }

    fn session_sink(&self) -> rt_protocol::SharedEventSink {
        self.session.event_sink()
    }

    fn abort(&self, submission_id: &str, reason: AbortReason, turn_count: u32) -> TaskOutcome {
        self.session.emit_event(
            submission_id,
            EventMsg::TurnAborted { submission_id: submission_id.to_string(), reason, turn_count },
        );
        TaskOutcome::Aborted { reason, turn_count }
    }

    fn fail(&self, submission_id: &str, message: String) -> TaskOutcome {
        self.session.emit_event(submission_id, EventMsg::Error { message: message.clone() });
        TaskOutcome::Failed { message }
    }

    fn emit_task_started(&self, submission_id: &str, options: &TaskOptions) {
        let discover = self.registry.discover(None);
        let tools = discover.map(|d| d.tools).unwrap_or_default();
        self.session.emit_event(
            submission_id,
            EventMsg::TaskStarted {
                submission_id: submission_id.to_string(),
                model_context_window: self.turn_context.model_context_window,
                model: self.turn_context.model.clone(),
                cwd: self.turn_context.cwd.clone(),
                approval_policy: self.turn_context.approval_policy,
                sandbox_policy: self.turn_context.sandbox_policy,
                auto_compact: options.auto_compact,
                compaction_threshold: options.compaction_threshold,
                tools: tools.iter().filter_map(|t| t.name().map(str::to_string)).collect(),
                tools_config: self.turn_context.tools_config.clone(),
                timeout_ms: options.timeout_ms,
                browser_environment_policy: self.turn_context.browser_env_policy,
                reasoning_effort: self.turn_context.reasoning_effort,
                reasoning_summary: self.turn_context.reasoning_summary,
            },
        );
    }

    fn emit_task_complete(&self, submission_id: &str, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Completed { turn_count, last_agent_message, compaction_performed, token_usage } => {
                self.session.emit_event(
                    submission_id,
                    EventMsg::TaskComplete {
                        submission_id: submission_id.to_string(),
                        last_agent_message: last_agent_message.clone(),
                        turn_count: *turn_count,
                        compaction_performed: *compaction_performed,
                        aborted: false,
                        token_usage: Some(*token_usage),
                    },
                );
            }
            // TurnAborted was already emitted by `abort`; Error by `fail`.
            TaskOutcome::Aborted { .. } | TaskOutcome::Failed { .. } => {}
        }
    }
}

enum TurnOutcome {
    Ran(TurnRunResult),
    TimedOut,
    Error(TaskError),
}

fn last_assistant_text(result: &TurnRunResult) -> Option<String> {
    result
        .processed_items
        .iter()
        .rev()
        .find_map(|processed| match &processed.item {
            rt_protocol::ResponseItem::Message { role: Role::Assistant, content } => {
                Some(extract_text(content))
            }
            _ => None,
        })
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
