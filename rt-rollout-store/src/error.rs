//! Local error type for this crate,
//! converted into [`rt_protocol::CoreError`] at the caller's seam.

use rt_protocol::CoreError;

/// A typed storage failure, carrying the operation that failed and why.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("rollout not found: {0}")]
    RolloutNotFound(String),

    #[error("invalid conversation id: {0}")]
    InvalidConversationId(String),

    #[error("database error during {operation}: {reason}")]
    Database { operation: String, reason: String },
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RolloutNotFound(id) => CoreError::NotFound(format!("rollout '{id}'")),
            StoreError::InvalidConversationId(id) => {
                CoreError::Protocol(format!("invalid conversation id: {id}"))
            }
            StoreError::Database { operation, reason } => {
                CoreError::Storage { operation, reason }
            }
        }
    }
}
