use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use rt_agent::Agent;
use rt_protocol::{
    ApprovalPolicy, BrowserEnvPolicy, CompletionPrompt, ContentBlock, EventMsg, InputItem, Op,
    ProviderError, ResponseEvent, ResponseItem, ResponseStream, Role, SandboxPolicy, ToolsConfig,
    TurnContext,
};
use rt_session::{BoundedEventSink, Session, Summarizer};
use rt_task::TaskOptions;
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
        model_context_window: 128_000,
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

/// Replays a fixed sequence of [`ResponseEvent`]s regardless of the prompt,
/// pausing indefinitely on the final delta if `hang` is set — used to give
/// an in-flight `Interrupt` something to preempt.
struct ScriptedModel {
    events: Mutex<Option<Vec<ResponseEvent>>>,
    hang: bool,
}

impl ScriptedModel {
    fn new(events: Vec<ResponseEvent>) -> Self {
        Self { events: Mutex::new(Some(events)), hang: false }
    }

    fn hanging(events: Vec<ResponseEvent>) -> Self {
        Self { events: Mutex::new(Some(events)), hang: true }
    }
}

impl rt_protocol::ModelClient for ScriptedModel {
    async fn stream(&self, _prompt: CompletionPrompt<'_>) -> Result<ResponseStream, ProviderError> {
        let events = self.events.lock().unwrap().take().unwrap_or_default();
        if self.hang {
            let tail = stream::once(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                ResponseEvent::Created
            });
            let boxed: ResponseStream = Box::pin(stream::iter(events).chain(tail));
            Ok(boxed)
        } else {
            let boxed: ResponseStream = Box::pin(stream::iter(events));
            Ok(boxed)
        }
    }
}

fn assistant_reply(text: &str) -> ResponseEvent {
    ResponseEvent::OutputItemDone(ResponseItem::Message {
        role: Role::Assistant,
        content: vec![ContentBlock::OutputText { text: text.to_string() }],
    })
}

async fn new_agent(
    model: ScriptedModel,
) -> (Agent<ScriptedModel>, rt_agent::AgentHandle) {
    new_agent_with_registry(model, ToolRegistry::new()).await
}

async fn new_agent_with_registry(
    model: ScriptedModel,
    registry: ToolRegistry,
) -> (Agent<ScriptedModel>, rt_agent::AgentHandle) {
    let sink = Arc::new(BoundedEventSink::new(64));
    let session = Session::new(rt_protocol::ConversationId::new(), turn_context(), sink.clone(), None);
    Agent::new(
        session,
        sink,
        model,
        registry,
        Box::new(NoopSummarizer),
        turn_context(),
        TaskOptions::default(),
        rt_agent::DEFAULT_QUEUE_CAPACITY,
    )
}

#[tokio::test]
async fn user_input_produces_task_started_and_task_complete() {
    let model = ScriptedModel::new(vec![
        assistant_reply("hi"),
        ResponseEvent::Completed { response_id: "r1".to_string(), token_usage: None },
    ]);
    let (agent, handle) = new_agent(model).await;
    let join = tokio::spawn(agent.run());

    handle
        .submit(Op::UserInput { items: vec![InputItem::Text { text: "hello".to_string() }] })
        .unwrap();

    let events = wait_for_events(&handle, 2).await;
    assert!(matches!(events[0].msg, EventMsg::TaskStarted { .. }));
    assert!(matches!(events[1].msg, EventMsg::TaskComplete { aborted: false, .. }));

    drop(handle);
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn empty_user_input_completes_with_zero_turns() {
    let model = ScriptedModel::new(vec![]);
    let (agent, handle) = new_agent(model).await;
    let join = tokio::spawn(agent.run());

    handle.submit(Op::UserInput { items: vec![] }).unwrap();

    let events = wait_for_events(&handle, 1).await;
    match &events[0].msg {
        EventMsg::TaskComplete { turn_count, .. } => assert_eq!(*turn_count, 0),
        other => panic!("expected TaskComplete, got {other:?}"),
    }

    drop(handle);
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn interrupt_mid_task_produces_turn_aborted_and_no_task_complete() {
    let model = ScriptedModel::hanging(vec![ResponseEvent::OutputTextDelta("partial".to_string())]);
    let (agent, handle) = new_agent(model).await;
    let join = tokio::spawn(agent.run());

    handle
        .submit(Op::UserInput { items: vec![InputItem::Text { text: "long task".to_string() }] })
        .unwrap();

    // Give the task a moment to start and emit its first delta, then
    // interrupt it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.submit(Op::Interrupt).unwrap();

    let events = wait_for_terminal(&handle).await;
    assert!(matches!(events[0].msg, EventMsg::TaskStarted { .. }));
    assert!(events.iter().any(|e| matches!(
        e.msg,
        EventMsg::TurnAborted { reason: rt_protocol::AbortReason::UserInterrupt, .. }
    )));
    assert!(!events.iter().any(|e| matches!(e.msg, EventMsg::TaskComplete { .. })));

    drop(handle);
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn list_tools_replies_with_tool_list_event() {
    let model = ScriptedModel::new(vec![]);
    let mut registry = ToolRegistry::new();
    let def = rt_protocol::ToolDefinition::Custom {
        name: "noop".to_string(),
        description: "does nothing".to_string(),
    };
    let handler: Arc<dyn rt_protocol::ToolHandler> =
        Arc::new(|_params: serde_json::Value, _ctx: &rt_protocol::ToolContext| async move {
            Ok(rt_protocol::ToolOutput::text("ok"))
        });
    registry.register(def, handler).unwrap();
    let (agent, handle) = new_agent_with_registry(model, registry).await;
    let join = tokio::spawn(agent.run());

    handle.submit(Op::ListTools).unwrap();

    let events = wait_for_events(&handle, 1).await;
    match &events[0].msg {
        EventMsg::ToolList { tools } => assert_eq!(tools.len(), 1),
        other => panic!("expected ToolList, got {other:?}"),
    }

    drop(handle);
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn backpressure_drops_are_surfaced_as_a_background_event() {
    let mut script: Vec<ResponseEvent> = (0..50)
        .map(|i| ResponseEvent::OutputTextDelta(format!("chunk-{i}")))
        .collect();
    script.push(assistant_reply("done"));
    script.push(ResponseEvent::Completed { response_id: "r1".to_string(), token_usage: None });
    let model = ScriptedModel::new(script);

    // A small capacity guarantees most of the 50 deltas above are dropped
    // under backpressure, while `TaskStarted`/`TaskComplete` survive.
    let sink = Arc::new(BoundedEventSink::new(4));
    let session = Session::new(rt_protocol::ConversationId::new(), turn_context(), sink.clone(), None);
    let (agent, handle) = Agent::new(
        session,
        sink,
        model,
        ToolRegistry::new(),
        Box::new(NoopSummarizer),
        turn_context(),
        TaskOptions::default(),
        rt_agent::DEFAULT_QUEUE_CAPACITY,
    );
    let join = tokio::spawn(agent.run());

    handle
        .submit(Op::UserInput { items: vec![InputItem::Text { text: "hello".to_string() }] })
        .unwrap();

    let events = wait_for_terminal(&handle).await;
    assert!(
        events.iter().any(|e| matches!(
            &e.msg,
            EventMsg::BackgroundEvent { level: rt_protocol::BackgroundLevel::Warning, message }
                if message.contains("dropped")
        )),
        "expected a BackgroundEvent reporting dropped deltas, got {events:?}"
    );

    drop(handle);
    join.await.unwrap().unwrap();
}

async fn wait_for_events(handle: &rt_agent::AgentHandle, count: usize) -> Vec<rt_protocol::Event> {
    let mut collected = Vec::new();
    for _ in 0..200 {
        collected.extend(handle.drain_events());
        if collected.len() >= count {
            return collected;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {count} events, got {collected:?}");
}

/// Drains events until one of the terminal variants (`TaskComplete` /
/// `TurnAborted` / `Error`) has been seen, returning everything collected
/// up to and including it.
async fn wait_for_terminal(handle: &rt_agent::AgentHandle) -> Vec<rt_protocol::Event> {
    let mut collected = Vec::new();
    for _ in 0..200 {
        collected.extend(handle.drain_events());
        if collected.iter().any(|e| {
            matches!(
                e.msg,
                EventMsg::TaskComplete { .. } | EventMsg::TurnAborted { .. } | EventMsg::Error { .. }
            )
        }) {
            return collected;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for a terminal event, got {collected:?}");
}
