//! Local error type for this crate.

use rt_protocol::{CoreError, ProviderError};

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("model error: {0}")]
    Model(#[from] ProviderError),

    #[error("turn cancelled")]
    Cancelled,
}

impl From<TurnError> for CoreError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::Model(e) => CoreError::Model(e),
            TurnError::Cancelled => CoreError::Cancelled,
        }
    }
}
