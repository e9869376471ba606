//! Error types for the streamgate domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all streamgate operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Upstream errors ---
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    // --- Request validation ---
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures reported by the upstream completion service or its transport.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Upstream rejected the request (status: {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl UpstreamError {
    /// HTTP status the gateway answers with when this error happens before
    /// any byte of the response has been written.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::Rejected { status, .. } => *status,
            Self::Transport(_) => 502,
            Self::Timeout(_) => 504,
        }
    }

    /// OpenAI-style error `type` label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "authentication_error",
            Self::Rejected { .. } | Self::Transport(_) => "upstream_error",
            Self::Timeout(_) => "timeout_error",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool host not started: {0}")]
    NotStarted(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    Execution { tool_name: String, reason: String },
}
