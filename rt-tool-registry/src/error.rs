//! Local error type for this crate, converted into [`rt_protocol::CoreError`]
//! at the caller's seam.

use rt_protocol::{CoreError, ValidationIssue};

/// `{success: false, error}` — the failure half of `execute`'s result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("validation failed")]
    Validation(Vec<ValidationIssue>),

    #[error("duplicate tool name: {0}")]
    DuplicateName(String),

    #[error("invalid tool definition: {0}")]
    InvalidDefinition(String),

    #[error("handler error: {0}")]
    Execution(String),

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl From<ToolError> for CoreError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(name) => CoreError::NotFound(format!("tool '{name}'")),
            ToolError::Validation(issues) => CoreError::Validation(issues),
            ToolError::DuplicateName(name) => {
                CoreError::Protocol(format!("duplicate tool name: {name}"))
            }
            ToolError::InvalidDefinition(msg) => CoreError::Protocol(msg),
            ToolError::Execution(msg) => CoreError::Protocol(msg),
            ToolError::Timeout { timeout_ms } => {
                CoreError::Timeout(std::time::Duration::from_millis(timeout_ms))
            }
        }
    }
}
