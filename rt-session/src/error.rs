//! Local error type for this crate.

use rt_protocol::CoreError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("summarization failed: {0}")]
    Summarization(String),

    #[error("storage error: {0}")]
    Storage(#[from] rt_rollout_store::StoreError),
}

impl From<SessionError> for CoreError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Summarization(msg) => CoreError::Model(rt_protocol::ProviderError::Other(msg)),
            SessionError::Storage(err) => err.into(),
        }
    }
}
