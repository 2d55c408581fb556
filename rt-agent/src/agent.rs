//! [`Agent`]: the submission queue and task dispatcher.
//!
//! A single `mpsc`-fed consumer loop owns the session exclusively. Each
//! in-flight task gets its own `CancellationToken`, and a `select!` races
//! draining the queue against awaiting the active task so `Interrupt` can
//! preempt it without a second thread. The turn-by-turn drive itself is
//! delegated to `rt_task::TaskRunner`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rt_protocol::{
    BackgroundLevel, EventMsg, ModelClient, Op, Submission, TurnContext,
};
use rt_session::{BoundedEventSink, Session, Summarizer};
use rt_task::{TaskOptions, TaskOutcome, TaskRunner};
use rt_tool_registry::ToolRegistry;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::AgentError;

/// Default bound on the submission channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// The caller-facing half of an [`Agent`]: submits ops and polls events.
///
/// Cloning an `AgentHandle` is cheap and yields another front end onto the
/// same dispatch loop and the same event sink.
#[derive(Clone)]
pub struct AgentHandle {
    submission_tx: mpsc::Sender<Submission>,
    next_id: Arc<AtomicU64>,
    events: Arc<BoundedEventSink>,
}

impl AgentHandle {
    /// Assigns a monotonic submission id and enqueues `op`. Fails with [`AgentError::QueueFull`] if the queue is at
    /// its soft cap, or [`AgentError::Closed`] if the dispatch loop has
    /// already exited.
    pub fn submit(&self, op: Op) -> Result<String, AgentError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let submission = Submission { id: id.clone(), op };
        match self.submission_tx.try_send(submission) {
            Ok(()) => Ok(id),
            Err(mpsc::error::TrySendError::Full(_)) => Err(AgentError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(AgentError::Closed),
        }
    }

    /// Returns the next buffered event, if any. A
    /// consumer polls this; it never blocks.
    #[must_use]
    pub fn next_event(&self) -> Option<rt_protocol::Event> {
        self.events.try_recv()
    }

    /// Drains every currently buffered event, in producer order.
    #[must_use]
    pub fn drain_events(&self) -> Vec<rt_protocol::Event> {
        self.events.drain()
    }
}

/// Submission queue plus task dispatcher: accepts ops in
/// arrival order and runs at most one [`TaskRunner`] at a time against one bound [`Session`].
pub struct Agent<M: ModelClient> {
    session: Session,
    model: M,
    registry: ToolRegistry,
    summarizer: Box<dyn Summarizer>,
    turn_context: TurnContext,
    options: TaskOptions,
    submission_rx: mpsc::Receiver<Submission>,
    /// Non-`Interrupt` submissions that arrived while a task was running;
    /// drained before the queue is polled again, preserving arrival order
    /// among themselves.
    deferred: VecDeque<Submission>,
    active_cancellation: Option<CancellationToken>,
    /// The same sink the session emits into, kept concrete (rather than
    /// behind the `EventSink` trait object) so the dispatch loop can poll
    /// `dropped_count()` and surface backpressure drops as a
    /// `BackgroundEvent` (spec §5).
    events: Arc<BoundedEventSink>,
    /// `events.dropped_count()` as of the last time it was surfaced.
    last_reported_drops: u64,
}

impl<M: ModelClient> Agent<M> {
    /// Build an `Agent` plus the [`AgentHandle`] used to submit ops and
    /// poll events. `session` must already share `events` as its event
    /// sink (via [`Session::new`]) for [`AgentHandle::next_event`] to see
    /// anything the session or its tasks emit.
    #[must_use]
    pub fn new(
        session: Session,
        events: Arc<BoundedEventSink>,
        model: M,
        registry: ToolRegistry,
        summarizer: Box<dyn Summarizer>,
        turn_context: TurnContext,
        options: TaskOptions,
        queue_capacity: usize,
    ) -> (Self, AgentHandle) {
        let (submission_tx, submission_rx) = mpsc::channel(queue_capacity.max(1));
        let handle = AgentHandle {
            submission_tx,
            next_id: Arc::new(AtomicU64::new(0)),
            events: events.clone(),
        };
        let agent = Self {
            session,
            model,
            registry,
            summarizer,
            turn_context,
            options,
            submission_rx,
            deferred: VecDeque::new(),
            active_cancellation: None,
            events,
            last_reported_drops: 0,
        };
        (agent, handle)
    }

    /// Drives the dispatch loop until every [`AgentHandle`] has been
    /// dropped and the queue is drained. Intended to be `tokio::spawn`ed
    /// alongside one or more live handles.
    #[instrument(skip(self))]
    pub async fn run(mut self) -> Result<(), AgentError> {
        loop {
            let submission = match self.deferred.pop_front() {
                Some(s) => s,
                None => match self.submission_rx.recv().await {
                    Some(s) => s,
                    None => break,
                },
            };
            let submission_id = submission.id.clone();
            self.dispatch(submission).await?;
            self.report_dropped_events(&submission_id);
        }
        self.session.close().await.ok();
        Ok(())
    }

    /// Surfaces any events the sink has dropped under backpressure since the
    /// last check as a `BackgroundEvent`, per spec §5 ("implementations
    /// must log \[...\] whenever a delta is dropped"). Read-then-emit
    /// rather than emitting from inside the sink itself, since `emit` would
    /// otherwise reenter its own lock.
    fn report_dropped_events(&mut self, submission_id: &str) {
        let total = self.events.dropped_count();
        let newly_dropped = total - self.last_reported_drops;
        if newly_dropped == 0 {
            return;
        }
        self.last_reported_drops = total;
        self.session.emit_event(
            submission_id,
            EventMsg::BackgroundEvent {
                level: BackgroundLevel::Warning,
                message: format!(
                    "event sink dropped {newly_dropped} event(s) under backpressure (total {total})"
                ),
            },
        );
    }

    async fn dispatch(&mut self, submission: Submission) -> Result<(), AgentError> {
        match submission.op {
            Op::UserInput { items } => {
                self.run_task(submission.id, items).await?;
            }
            Op::Interrupt => {
                if let Some(token) = &self.active_cancellation {
                    token.cancel();
                }
                // No-op if no task is active: `TurnAborted` is
                // emitted by the cancelled `TaskRunner` itself, not here.
            }
            Op::Configure { patch } => {
                // Takes effect for the next task only; never
                // touches an in-flight one.
                self.turn_context = self.turn_context.with_patch(&patch);
            }
            Op::ListTools => {
                let discover = self.registry.discover(None)?;
                self.session
                    .emit_event(&submission.id, EventMsg::ToolList { tools: discover.tools });
            }
            Op::CompactNow => {
                if let Err(e) = self
                    .session
                    .compact(self.summarizer.as_ref(), self.options.compaction_tail)
                    .await
                {
                    warn!(error = %e, "CompactNow failed");
                    self.session.emit_event(
                        &submission.id,
                        EventMsg::BackgroundEvent {
                            level: BackgroundLevel::Warning,
                            message: format!("CompactNow failed: {e}"),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Runs one task to completion, racing the queue so that an `Interrupt`
    /// arriving mid-task preempts it immediately rather than waiting in
    /// line. Every other submission observed mid-task is deferred
    /// until the task's terminal event has been emitted.
    async fn run_task(
        &mut self,
        submission_id: String,
        items: Vec<rt_protocol::InputItem>,
    ) -> Result<(), AgentError> {
        self.session.set_turn_context(self.turn_context.clone());
        let turn_context = self.turn_context.clone();
        let options = self.options.clone();

        let mut runner = TaskRunner::new(
            &mut self.session,
            turn_context,
            &self.model,
            &self.registry,
            self.summarizer.as_ref(),
        );
        let token = runner.cancellation_token();
        self.active_cancellation = Some(token.clone());

        let mut run_fut = Box::pin(runner.run(&submission_id, items, options));

        let outcome = loop {
            tokio::select! {
                biased;
                result = &mut run_fut => {
                    break result?;
                }
                maybe_sub = self.submission_rx.recv() => {
                    match maybe_sub {
                        Some(sub) if matches!(sub.op, Op::Interrupt) => {
                            info!(submission_id = %submission_id, "interrupt received mid-task, cancelling");
                            token.cancel();
                        }
                        Some(sub) => self.deferred.push_back(sub),
                        None => {
                            // All handles dropped; let the in-flight task
                            // finish, then `run`'s outer loop observes the
                            // closed channel and exits.
                        }
                    }
                }
            }
        };

        drop(run_fut);
        drop(runner);
        self.active_cancellation = None;
        log_outcome(&submission_id, &outcome);
        Ok(())
    }
}

fn log_outcome(submission_id: &str, outcome: &TaskOutcome) {
    match outcome {
        TaskOutcome::Completed { turn_count, .. } => {
            info!(submission_id, turn_count, "task completed");
        }
        TaskOutcome::Aborted { reason, turn_count } => {
            info!(submission_id, ?reason, turn_count, "task aborted");
        }
        TaskOutcome::Failed { message } => {
            warn!(submission_id, message, "task failed");
        }
    }
}
