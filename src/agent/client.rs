//! Agent call contract.

use crate::agent::conversation::Turn;
use crate::error::ApiError;
use async_trait::async_trait;

/// One request to the agent: the whole conversation plus the fixed preamble.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    pub turns: Vec<Turn>,
    pub model_id: String,
    pub preamble: String,
}

impl AgentRequest {
    /// Text of the newest user turn.
    pub fn latest_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == crate::agent::Role::User)
            .map(|t| t.text.as_str())
    }
}

/// Sends a request and returns the agent's reply text.
///
/// Implementations bound every call with a timeout; a timeout is reported as
/// [`ApiError::TransportError`].
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn send(&self, request: &AgentRequest) -> Result<String, ApiError>;

    /// Whether the agent is reachable and healthy.
    async fn check_status(&self) -> Result<bool, ApiError>;
}
