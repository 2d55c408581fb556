//! The [`Session`] itself.
//!
//! Holds an id, a `history: Vec<ResponseItem>`, a `pending_input` queue, a
//! `turn_context` snapshot, and a bounded `event_sink`.

use std::collections::HashSet;

use rt_protocol::{
    ConversationId, Event, EventMsg, InputItem, ResponseItem, Role, RolloutItem, SharedEventSink,
    TurnContext,
};
use rt_rollout_store::Recorder;
use tracing::instrument;

use crate::error::SessionError;
use crate::summarizer::Summarizer;

/// How many of the most recent history items [`Session::compact`] keeps
/// verbatim after summarizing the rest.
pub const DEFAULT_COMPACTION_TAIL: usize = 10;

/// In-memory conversation state: message history, pending input queue, a
/// turn context snapshot, and an event sink; bridges to a durable
/// [`Recorder`] when persistence is enabled.
pub struct Session {
    conversation_id: ConversationId,
    history: Vec<ResponseItem>,
    pending_input: Vec<ResponseItem>,
    turn_context: TurnContext,
    event_sink: SharedEventSink,
    recorder: Option<Recorder>,
    /// `call_id`s of calls recorded without a paired output yet: a later output for one of these is accepted; an output whose
    /// `call_id` is neither here nor already paired in history is rejected.
    orphan_calls: HashSet<String>,
}

impl Session {
    #[must_use]
    pub fn new(
        conversation_id: ConversationId,
        turn_context: TurnContext,
        event_sink: SharedEventSink,
        recorder: Option<Recorder>,
    ) -> Self {
        Self {
            conversation_id,
            history: Vec::new(),
            pending_input: Vec::new(),
            turn_context,
            event_sink,
            recorder,
            orphan_calls: HashSet::new(),
        }
    }

    #[must_use]
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    #[must_use]
    pub fn history(&self) -> &[ResponseItem] {
        &self.history
    }

    #[must_use]
    pub fn turn_context(&self) -> &TurnContext {
        &self.turn_context
    }

    /// Replace the turn context snapshot. Only valid between tasks
    ///; callers must not call this while a task is running.
    pub fn set_turn_context(&mut self, turn_context: TurnContext) {
        self.turn_context = turn_context;
    }

    #[must_use]
    pub fn has_recorder(&self) -> bool {
        self.recorder.is_some()
    }

    #[must_use]
    pub fn event_sink(&self) -> SharedEventSink {
        self.event_sink.clone()
    }

    /// Convert `items` into a single `message{role: user}` item, append it
    /// to history, and — if a recorder exists — persist both the response
    /// item and a `UserMessage` event record.
    #[instrument(skip(self, items), fields(conversation_id = %self.conversation_id))]
    pub async fn record_input_and_rollout_usermsg(
        &mut self,
        items: Vec<InputItem>,
    ) -> Result<(), SessionError> {
        let text = items
            .into_iter()
            .map(|item| match item {
                InputItem::Text { text } => text,
                InputItem::Context { path } => format!("[context: {path}]"),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let message = ResponseItem::Message {
            role: Role::User,
            content: vec![rt_protocol::ContentBlock::OutputText { text: text.clone() }],
        };
        self.history.push(message.clone());

        if let Some(recorder) = &self.recorder {
            recorder
                .append(vec![
                    RolloutItem::ResponseItem(message),
                    RolloutItem::EventMsg(EventMsg::UserMessage { message: text }),
                ])
                .await?;
        }
        Ok(())
    }

    /// `history ++ pending`.
    #[must_use]
    pub fn build_turn_input_with_history(&self, pending: &[ResponseItem]) -> Vec<ResponseItem> {
        let mut turn_input = self.history.clone();
        turn_input.extend_from_slice(pending);
        turn_input
    }

    /// Remove and return the queued pending-input items.
    pub fn take_pending_input(&mut self) -> Vec<ResponseItem> {
        std::mem::take(&mut self.pending_input)
    }

    /// Queue an item as pending input for the next turn, without touching
    /// history yet.
    pub fn queue_pending_input(&mut self, item: ResponseItem) {
        self.pending_input.push(item);
    }

    /// In-memory append only, used for turn-scratch bookkeeping.
    pub fn record_conversation_items(&mut self, items: Vec<ResponseItem>) {
        self.track_call_pairing(&items);
        self.history.extend(items);
    }

    /// In-memory append plus policy-filtered persist.
    #[instrument(skip(self, items), fields(conversation_id = %self.conversation_id))]
    pub async fn record_conversation_items_dual(
        &mut self,
        items: Vec<ResponseItem>,
    ) -> Result<(), SessionError> {
        self.track_call_pairing(&items);
        self.history.extend(items.clone());
        if let Some(recorder) = &self.recorder {
            let rollout_items = items.into_iter().map(RolloutItem::ResponseItem).collect();
            recorder.append(rollout_items).await?;
        }
        Ok(())
    }

    /// A call without its output is tracked as orphaned; an output must
    /// reference a call that is either already paired in history or
    /// currently orphaned. Orphans left unresolved at the end of a task are
    /// expected (an upstream turn failed) and are simply never paired.
    fn track_call_pairing(&mut self, items: &[ResponseItem]) {
        for item in items {
            if item.is_call() {
                if let Some(call_id) = item.call_id() {
                    self.orphan_calls.insert(call_id.to_string());
                }
            } else if item.is_call_output() {
                if let Some(call_id) = item.call_id() {
                    if !self.orphan_calls.remove(call_id) {
                        tracing::warn!(
                            call_id,
                            "recording a call output with no matching pending call; dropping orphaned output tracking"
                        );
                    }
                }
            }
        }
    }

    /// Push an event into the sink; never blocks the producer.
    pub fn emit_event(&self, submission_id: &str, msg: EventMsg) {
        self.event_sink.emit(Event::new(submission_id, msg));
    }

    /// Replace a prefix of history with a model-generated summary,
    /// preserving a verbatim tail.
    ///
    /// The tail boundary is widened leftward, if needed, so no
    /// call/output pair still referenced by the tail is split across the
    /// summarized/preserved boundary.
    #[instrument(skip(self, summarizer), fields(conversation_id = %self.conversation_id))]
    pub async fn compact(
        &mut self,
        summarizer: &dyn Summarizer,
        tail_len: usize,
    ) -> Result<(), SessionError> {
        let split = pairing_safe_split(&self.history, tail_len);
        let (old, tail) = self.history.split_at(split);

        // A leading system/instructions message acts as a metadata prefix
        // that is always preserved verbatim.
        let prefix: Vec<ResponseItem> = match old.first() {
            Some(ResponseItem::Message { role: Role::System, .. }) => vec![old[0].clone()],
            _ => Vec::new(),
        };

        let message = summarizer
            .summarize(old)
            .await
            .map_err(|e| SessionError::Summarization(e.to_string()))?;

        let compacted_item = rt_protocol::CompactedItem { message: message.clone() };
        let compacted_as_message = ResponseItem::Message {
            role: Role::System,
            content: vec![rt_protocol::ContentBlock::OutputText {
                text: format!("[compacted summary]\n{message}"),
            }],
        };

        let mut new_history = prefix;
        new_history.push(compacted_as_message);
        new_history.extend_from_slice(tail);
        self.history = new_history;

        if let Some(recorder) = &self.recorder {
            recorder
                .append(vec![RolloutItem::Compacted(compacted_item)])
                .await?;
        }
        Ok(())
    }

    /// Clear history and pending input; leave the rollout intact; emit
    /// `SessionReset`.
    pub fn reset(&mut self, submission_id: &str) {
        self.history.clear();
        self.pending_input.clear();
        self.orphan_calls.clear();
        self.emit_event(submission_id, EventMsg::SessionReset);
    }

    /// Flush+close the recorder; mark metadata archived. A no-op if there is no recorder.
    pub async fn close(&self) -> Result<(), SessionError> {
        if let Some(recorder) = &self.recorder {
            recorder.close().await?;
        }
        Ok(())
    }
}

/// Widen `tail_len` leftward until no call/output pair straddles the
/// old/tail boundary.
fn pairing_safe_split(history: &[ResponseItem], tail_len: usize) -> usize {
    let mut split = history.len().saturating_sub(tail_len);
    if split == 0 {
        return 0;
    }

    loop {
        let tail = &history[split..];
        let tail_call_ids: HashSet<&str> = tail.iter().filter_map(|i| i.call_id()).collect();

        // Does the item just before the boundary pair with something in the
        // tail? If so, pull it into the tail too.
        let boundary_item = &history[split - 1];
        let Some(call_id) = boundary_item.call_id() else {
            break;
        };
        if tail_call_ids.contains(call_id) {
            split -= 1;
        } else {
            break;
        }
    }
    split
}
