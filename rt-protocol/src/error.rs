//! The unified error taxonomy.
//!
//! Each downstream crate keeps its own local `thiserror` enum at the
//! component seam (`rt_rollout_store::StoreError`, `rt_tool_registry::ToolError`,
//! ...) and converts into [`CoreError`] via `From`, rather than sharing one
//! mega-enum everywhere.

use thiserror::Error;

/// A structured, per-parameter validation failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    pub parameter: String,
    pub message: String,
    pub code: ValidationCode,
}

/// The machine-readable reason a [`ValidationIssue`] was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    Required,
    TypeMismatch,
    UnknownParameter,
    NullValue,
    UnknownType,
    NotFound,
}

/// The unified error taxonomy surfaced at every crate boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0:?}")]
    Validation(Vec<ValidationIssue>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("automatic abort: max turns ({0}) reached")]
    AutomaticAbort(u32),

    #[error("storage error during {operation}: {reason}")]
    Storage { operation: String, reason: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("model error: {0}")]
    Model(#[from] ProviderError),
}

/// Transport/response errors from a [`crate::traits::ModelClient`]
/// implementation.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("{0}")]
    Other(String),
}
