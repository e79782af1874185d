//! Error types
//!
//! Crate-wide error enum for configuration, storage, agent transport and registry
//! failures. Compiler diagnostics live in `compiler::error`; they never cross into
//! this type except as rendered strings.

use thiserror::Error;

/// Errors surfaced by panelkit services.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    /// The agent gateway could not be reached (connect failure, timeout, broken body).
    #[error("Agent transport error: {0}")]
    TransportError(String),

    /// The agent gateway answered with a non-success status.
    #[error("Agent request failed ({status}): {body}")]
    AgentRequestFailed { status: u16, body: String },

    #[error("Agent not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    /// A custom definition tried to take the id of a builtin component.
    #[error("Component id '{0}' is reserved by a builtin component")]
    ProtectedComponent(String),

    #[error("Invalid component definition: {0}")]
    InvalidDefinition(String),

    /// Authored code failed while rendering or handling an event.
    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Layout instance not found: {0}")]
    InstanceNotFound(String),

    /// A request is already being processed by the orchestrator.
    #[error("Another request is still in flight")]
    Busy,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// True for failures reaching the agent (as opposed to local failures).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApiError::TransportError(_) | ApiError::AgentRequestFailed { .. }
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::TransportError(format!("request timed out: {}", err))
        } else {
            ApiError::TransportError(err.to_string())
        }
    }
}
