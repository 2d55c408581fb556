//! Local error type for this crate.

use rt_protocol::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("task error: {0}")]
    Task(#[from] rt_task::TaskError),

    #[error("tool registry error: {0}")]
    Tool(#[from] rt_tool_registry::ToolError),

    /// A `Configure` patch (or any other submission) would have grown the
    /// submission queue past its soft cap: surfaced to the submitter rather than silently queued.
    #[error("submission queue is full")]
    QueueFull,

    /// `submit` was called after the dispatch loop (`Agent::run`) has
    /// exited.
    #[error("agent is no longer running")]
    Closed,
}

impl From<AgentError> for CoreError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Task(e) => e.into(),
            AgentError::Tool(e) => CoreError::Protocol(e.to_string()),
            AgentError::QueueFull => CoreError::Protocol("submission queue is full".to_string()),
            AgentError::Closed => CoreError::Protocol("agent is no longer running".to_string()),
        }
    }
}
