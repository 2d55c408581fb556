use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream;
use rt_protocol::{
    AbortReason, ApprovalPolicy, BrowserEnvPolicy, CompletionPrompt, ContentBlock, InputItem,
    ProviderError, ResponseEvent, ResponseItem, ResponseStream, Role, SandboxPolicy, ToolContext,
    ToolDefinition, ToolHandler, ToolOutput, ToolsConfig, TurnContext,
};
use rt_session::{BoundedEventSink, Session, Summarizer};
use rt_task::{TaskOptions, TaskOutcome, TaskRunner};
use rt_tool_registry::ToolRegistry;

fn turn_context() -> TurnContext {
    TurnContext {
        model: "test-model".to_string(),
        cwd: "/workspace".to_string(),
        approval_policy: ApprovalPolicy::OnRequest,
        sandbox_policy: SandboxPolicy::WorkspaceWrite,
        reasoning_effort: None,
        reasoning_summary: None,
        tools_config: ToolsConfig::default(),
        browser_env_policy: BrowserEnvPolicy::ActiveTabOnly,
        model_context_window: 1_000,
    }
}

struct NoopSummarizer;
impl Summarizer for NoopSummarizer {
    fn summarize<'a>(
        &'a self,
        _history: &'a [ResponseItem],
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<String, rt_session::SessionError>> + Send + 'a>,
    > {
        Box::pin(async { Ok("summary".to_string()) })
    }
}

fn assistant_reply(text: &str) -> ResponseEvent {
    ResponseEvent::OutputItemDone(ResponseItem::Message {
        role: Role::Assistant,
        content: vec![ContentBlock::OutputText { text: text.to_string() }],
    })
}

/// Replays one fixed turn script regardless of the prompt, recording how
/// many times it has been called.
struct ScriptedModel {
    events: Vec<ResponseEvent>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn new(events: Vec<ResponseEvent>) -> Self {
        Self { events, calls: AtomicUsize::new(0) }
    }
}

impl rt_protocol::ModelClient for ScriptedModel {
    async fn stream(&self, _prompt: CompletionPrompt<'_>) -> Result<ResponseStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let boxed: ResponseStream = Box::pin(stream::iter(self.events.clone()));
        Ok(boxed)
    }
}

/// Like [`ScriptedModel`] but hangs forever on the first call, so an
/// external cancellation has something to preempt.
struct HangingModel;

impl rt_protocol::ModelClient for HangingModel {
    async fn stream(&self, _prompt: CompletionPrompt<'_>) -> Result<ResponseStream, ProviderError> {
        let tail = stream::once(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            ResponseEvent::Created
        });
        let boxed: ResponseStream = Box::pin(tail);
        Ok(boxed)
    }
}

/// Fails every call with a transport error, so the task's unhandled-error
/// path can be exercised without a real provider.
struct FailingModel;

impl rt_protocol::ModelClient for FailingModel {
    async fn stream(&self, _prompt: CompletionPrompt<'_>) -> Result<ResponseStream, ProviderError> {
        Err(ProviderError::Transport("connection reset".to_string()))
    }
}

fn echo_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let def = ToolDefinition::Function {
        name: "bump".to_string(),
        description: "increments a counter".to_string(),
        parameters: serde_json::json!({ "type": "object", "properties": {} }),
    };
    let handler: Arc<dyn ToolHandler> =
        Arc::new(|_params: serde_json::Value, _ctx: &ToolContext| async move {
            Ok(ToolOutput::text("bumped"))
        });
    registry.register(def, handler).unwrap();
    registry
}

fn tool_call_turn() -> Vec<ResponseEvent> {
    vec![
        ResponseEvent::OutputItemDone(ResponseItem::FunctionCall {
            call_id: "call-1".to_string(),
            name: "bump".to_string(),
            arguments: "{}".to_string(),
        }),
        ResponseEvent::Completed { response_id: "resp".to_string(), token_usage: None },
    ]
}

fn new_session() -> Session {
    let sink = Arc::new(BoundedEventSink::new(64));
    Session::new(rt_protocol::ConversationId::new(), turn_context(), sink, None)
}

#[tokio::test]
async fn single_turn_completes_with_the_final_assistant_message() {
    let model = ScriptedModel::new(vec![
        assistant_reply("hi"),
        ResponseEvent::Completed { response_id: "resp-1".to_string(), token_usage: None },
    ]);
    let registry = ToolRegistry::new();
    let summarizer = NoopSummarizer;
    let mut session = new_session();
    let context = turn_context();
    let mut runner = TaskRunner::new(&mut session, context, &model, &registry, &summarizer);

    let outcome = runner
        .run("sub-1", vec![InputItem::Text { text: "hello".to_string() }], TaskOptions::default())
        .await
        .unwrap();

    match outcome {
        TaskOutcome::Completed { turn_count, last_agent_message, .. } => {
            assert_eq!(turn_count, 1);
            assert_eq!(last_agent_message.as_deref(), Some("hi"));
        }
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_input_completes_with_zero_turns_and_no_model_call() {
    let model = ScriptedModel::new(vec![]);
    let registry = ToolRegistry::new();
    let summarizer = NoopSummarizer;
    let mut session = new_session();
    let context = turn_context();
    let mut runner = TaskRunner::new(&mut session, context, &model, &registry, &summarizer);

    let outcome = runner.run("sub-1", vec![], TaskOptions::default()).await.unwrap();

    match outcome {
        TaskOutcome::Completed { turn_count, .. } => assert_eq!(turn_count, 0),
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 0, "an empty submission must never call the model");
}

#[tokio::test]
async fn max_turns_triggers_an_automatic_abort_with_a_warning_background_event() {
    let model = ScriptedModel::new(tool_call_turn());
    let registry = echo_registry();
    let summarizer = NoopSummarizer;
    let mut session = new_session();
    let context = turn_context();
    let mut runner = TaskRunner::new(&mut session, context, &model, &registry, &summarizer);

    let options = TaskOptions { max_turns: 2, auto_compact: false, ..TaskOptions::default() };
    let outcome = runner
        .run("sub-1", vec![InputItem::Text { text: "go".to_string() }], options)
        .await
        .unwrap();

    match outcome {
        TaskOutcome::Aborted { reason: AbortReason::AutomaticAbort, turn_count } => {
            assert_eq!(turn_count, 2);
        }
        other => panic!("expected an automatic abort, got {other:?}"),
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 2, "each turn calls the model exactly once");
}

#[tokio::test]
async fn crossing_the_compaction_threshold_compacts_exactly_once() {
    let model = ScriptedModel::new(vec![
        assistant_reply("hi"),
        ResponseEvent::Completed {
            response_id: "resp-1".to_string(),
            token_usage: Some(rt_protocol::TokenUsage {
                input_tokens: 800,
                cached_input_tokens: 0,
                output_tokens: 0,
                reasoning_output_tokens: 0,
                total_tokens: 800,
            }),
        },
    ]);
    let registry = ToolRegistry::new();
    let summarizer = NoopSummarizer;
    let mut session = new_session();
    let context = turn_context(); // model_context_window: 1_000, so 800/1000 = 0.8 crosses the 0.75 default threshold

    let mut runner = TaskRunner::new(&mut session, context, &model, &registry, &summarizer);
    let outcome = runner
        .run("sub-1", vec![InputItem::Text { text: "hello".to_string() }], TaskOptions::default())
        .await
        .unwrap();

    match outcome {
        TaskOutcome::Completed { compaction_performed, .. } => assert!(compaction_performed),
        other => panic!("expected Completed, got {other:?}"),
    }

    let background_events: Vec<_> = session
        .history()
        .iter()
        .filter(|item| matches!(item, ResponseItem::Message { role: Role::System, .. }))
        .collect();
    assert_eq!(background_events.len(), 1, "compaction should replace history with one summary message");
}

#[tokio::test]
async fn model_transport_error_fails_the_task_and_emits_one_error_event() {
    let model = FailingModel;
    let registry = ToolRegistry::new();
    let summarizer = NoopSummarizer;
    let sink = Arc::new(BoundedEventSink::new(64));
    let mut session = Session::new(
        rt_protocol::ConversationId::new(),
        turn_context(),
        sink.clone(),
        None,
    );
    let context = turn_context();
    let mut runner = TaskRunner::new(&mut session, context, &model, &registry, &summarizer);

    let outcome = runner
        .run("sub-1", vec![InputItem::Text { text: "hello".to_string() }], TaskOptions::default())
        .await
        .unwrap();

    match outcome {
        TaskOutcome::Failed { message } => assert!(message.contains("connection reset")),
        other => panic!("expected Failed, got {other:?}"),
    }

    let events = sink.drain();
    let error_events: Vec<_> = events
        .iter()
        .filter(|e| matches!(e.msg, rt_protocol::EventMsg::Error { .. }))
        .collect();
    assert_eq!(error_events.len(), 1, "exactly one Error event must be emitted, got {events:?}");
    assert!(
        !events.iter().any(|e| matches!(
            e.msg,
            rt_protocol::EventMsg::TaskComplete { .. } | rt_protocol::EventMsg::TurnAborted { .. }
        )),
        "a failed task must not also emit TaskComplete or TurnAborted"
    );
}

#[tokio::test]
async fn cancellation_mid_task_aborts_without_persisting_the_in_flight_turn() {
    let model = HangingModel;
    let registry = ToolRegistry::new();
    let summarizer = NoopSummarizer;
    let mut session = new_session();
    let context = turn_context();
    let mut runner = TaskRunner::new(&mut session, context, &model, &registry, &summarizer);
    let token = runner.cancellation_token();

    let cancel_handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let outcome = runner
        .run("sub-1", vec![InputItem::Text { text: "long task".to_string() }], TaskOptions::default())
        .await
        .unwrap();
    cancel_handle.await.unwrap();

    match outcome {
        TaskOutcome::Aborted { reason: AbortReason::UserInterrupt, turn_count } => assert_eq!(turn_count, 0),
        other => panic!("expected a user-interrupt abort, got {other:?}"),
    }

    // The user's own message was recorded before the first turn started,
    // but no assistant/tool items from the hung turn made it into history.
    assert_eq!(session.history().len(), 1);
    assert!(matches!(
        session.history()[0],
        ResponseItem::Message { role: Role::User, .. }
    ));
}
