use std::sync::Arc;

use rt_protocol::{
    ApprovalPolicy, BrowserEnvPolicy, ContentBlock, EventMsg, InputItem, ResponseItem, Role,
    SandboxPolicy, ToolsConfig, TurnContext,
};
use rt_rollout_store::{CreateOptions, InMemoryRolloutStore, RolloutStore};
use rt_session::{BoundedEventSink, Session};

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

fn create_options() -> CreateOptions {
    CreateOptions {
        originator: "test-suite".to_string(),
        agent_version: "0.0.0".to_string(),
        instructions: None,
        git_info: None,
        ttl: rt_protocol::TtlPolicy::Permanent,
    }
}

async fn new_session_with_recorder() -> (Session, Arc<BoundedEventSink>) {
    let store = InMemoryRolloutStore::new();
    let recorder = store
        .create(rt_protocol::ConversationId::new(), create_options())
        .await
        .unwrap();
    let conversation_id = recorder.rollout_id();
    let sink = Arc::new(BoundedEventSink::new(16));
    let session = Session::new(conversation_id, turn_context(), sink.clone(), Some(recorder));
    (session, sink)
}

#[tokio::test]
async fn record_input_appends_user_message_to_history_and_rollout() {
    let (mut session, _sink) = new_session_with_recorder().await;
    session
        .record_input_and_rollout_usermsg(vec![InputItem::Text {
            text: "hello".to_string(),
        }])
        .await
        .unwrap();

    assert_eq!(session.history().len(), 1);
    match &session.history()[0] {
        ResponseItem::Message { role: Role::User, content } => {
            assert_eq!(content.len(), 1);
        }
        other => panic!("expected user message, got {other:?}"),
    }
}

#[tokio::test]
async fn build_turn_input_with_history_concatenates_pending() {
    let (mut session, _sink) = new_session_with_recorder().await;
    session
        .record_input_and_rollout_usermsg(vec![InputItem::Text {
            text: "first".to_string(),
        }])
        .await
        .unwrap();

    let pending = vec![ResponseItem::Message {
        role: Role::Assistant,
        content: vec![ContentBlock::OutputText { text: "draft".to_string() }],
    }];
    let turn_input = session.build_turn_input_with_history(&pending);
    assert_eq!(turn_input.len(), 2);
}

#[tokio::test]
async fn queue_and_take_pending_input_roundtrips() {
    let (mut session, _sink) = new_session_with_recorder().await;
    assert!(session.take_pending_input().is_empty());

    session.queue_pending_input(ResponseItem::Message {
        role: Role::User,
        content: vec![ContentBlock::OutputText { text: "queued".to_string() }],
    });
    let pending = session.take_pending_input();
    assert_eq!(pending.len(), 1);
    assert!(session.take_pending_input().is_empty());
}

#[tokio::test]
async fn record_conversation_items_dual_persists_only_allow_listed_items() {
    let (mut session, _sink) = new_session_with_recorder().await;
    session
        .record_conversation_items_dual(vec![
            ResponseItem::FunctionCall {
                call_id: "call-1".to_string(),
                name: "read_file".to_string(),
                arguments: "{}".to_string(),
            },
            ResponseItem::LocalShellCallOutput {
                call_id: "call-2".to_string(),
                output: "denied by policy".to_string(),
            },
        ])
        .await
        .unwrap();

    // Both land in memory regardless of persistence policy; the recorder
    // (exercised in rt-rollout-store's own suite) is what applies the filter
    // on the way to storage.
    assert_eq!(session.history().len(), 2);
    assert!(rt_rollout_store::is_persisted(&rt_protocol::RolloutItem::ResponseItem(
        ResponseItem::FunctionCall {
            call_id: "call-1".to_string(),
            name: "read_file".to_string(),
            arguments: "{}".to_string(),
        }
    )));
    assert!(!rt_rollout_store::is_persisted(&rt_protocol::RolloutItem::ResponseItem(
        ResponseItem::LocalShellCallOutput {
            call_id: "call-2".to_string(),
            output: "denied by policy".to_string(),
        }
    )));
}

#[tokio::test]
async fn emit_event_reaches_the_sink() {
    let (session, sink) = new_session_with_recorder().await;
    session.emit_event("sub-1", EventMsg::SessionReset);
    let event = sink.try_recv().expect("event should be buffered");
    assert_eq!(event.id, "sub-1");
    assert!(matches!(event.msg, EventMsg::SessionReset));
}

#[tokio::test]
async fn reset_clears_history_and_emits_session_reset() {
    let (mut session, sink) = new_session_with_recorder().await;
    session
        .record_input_and_rollout_usermsg(vec![InputItem::Text { text: "hi".to_string() }])
        .await
        .unwrap();
    assert_eq!(session.history().len(), 1);

    session.reset("sub-2");
    assert!(session.history().is_empty());
    let event = sink.try_recv().unwrap();
    assert!(matches!(event.msg, EventMsg::SessionReset));
}

#[tokio::test]
async fn compact_preserves_call_output_pairing_across_the_split() {
    let (mut session, _sink) = new_session_with_recorder().await;

    // Build a history where a FunctionCall sits just before the naive split
    // point, and its output sits just after — a naive split would sever them.
    let mut items = Vec::new();
    for i in 0..6 {
        items.push(ResponseItem::Message {
            role: Role::User,
            content: vec![ContentBlock::OutputText { text: format!("turn {i}") }],
        });
    }
    items.push(ResponseItem::FunctionCall {
        call_id: "pair-1".to_string(),
        name: "search".to_string(),
        arguments: "{}".to_string(),
    });
    items.push(ResponseItem::FunctionCallOutput {
        call_id: "pair-1".to_string(),
        output: "result".to_string(),
        success: Some(true),
    });
    session.record_conversation_items(items);

    let summarizer = |history: &[ResponseItem]| {
        let count = history.len();
        async move { Ok::<_, rt_session::SessionError>(format!("summarized {count} items")) }
    };

    // tail_len=1 would naively put only FunctionCallOutput in the tail,
    // stranding FunctionCall on the summarized side.
    session.compact(&summarizer, 1).await.unwrap();

    let call_count = session
        .history()
        .iter()
        .filter(|item| item.call_id() == Some("pair-1"))
        .count();
    assert_eq!(call_count, 2, "both halves of the pair must survive together");
}

#[tokio::test]
async fn close_is_idempotent_and_flushes_the_recorder() {
    let (session, _sink) = new_session_with_recorder().await;
    session.close().await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
async fn session_without_recorder_still_tracks_history_in_memory() {
    let sink = Arc::new(BoundedEventSink::new(8));
    let mut session = Session::new(
        rt_protocol::ConversationId::new(),
        turn_context(),
        sink,
        None,
    );
    assert!(!session.has_recorder());
    session
        .record_input_and_rollout_usermsg(vec![InputItem::Text { text: "no store".to_string() }])
        .await
        .unwrap();
    assert_eq!(session.history().len(), 1);
    session.close().await.unwrap();
}
