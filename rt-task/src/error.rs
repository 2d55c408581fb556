//! Local error type for this crate.

use rt_protocol::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("session error: {0}")]
    Session(#[from] rt_session::SessionError),

    #[error("turn error: {0}")]
    Turn(#[from] rt_turn::TurnError),
}

impl From<TaskError> for CoreError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Session(e) => e.into(),
            TaskError::Turn(e) => e.into(),
        }
    }
}
