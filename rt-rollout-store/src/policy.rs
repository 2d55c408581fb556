//! The persistence policy: the deterministic filter deciding
//! which [`RolloutItem`]s are ever written to a rollout.

use rt_protocol::RolloutItem;

/// True iff `item` satisfies the persistence policy and should reach
/// storage. Checked via the tag pair [`RolloutItem::persistence_tags`]
/// rather than matching the enum directly, so the rule table reads as a
/// flat list of allowed tag pairs.
#[must_use]
pub fn is_persisted(item: &RolloutItem) -> bool {
    let (outer, inner) = item.persistence_tags();
    match outer {
        "session_meta" | "compacted" | "turn_context" => true,
        "response_item" => matches!(
            inner,
            Some(
                "message"
                    | "reasoning"
                    | "local_shell_call"
                    | "function_call"
                    | "function_call_output"
                    | "custom_tool_call"
                    | "custom_tool_call_output"
                    | "web_search_call"
            )
        ),
        "event_msg" => matches!(
            inner,
            Some(
                "UserMessage"
                    | "AgentMessage"
                    | "AgentReasoning"
                    | "TokenCount"
                    | "EnteredReviewMode"
                    | "ExitedReviewMode"
                    | "TurnAborted"
            )
        ),
        _ => false,
    }
}

/// Filter a batch of items down to the ones the policy allows. Idempotent
///: filtering an already-filtered list is a no-op.
#[must_use]
pub fn filter_persisted(items: Vec<RolloutItem>) -> Vec<RolloutItem> {
    items.into_iter().filter(is_persisted).collect()
}
