//! An [`AgentClient`] that replays canned replies. Used by tests and by
//! `panelkit chat --offline`, where every call fails and pasted source is
//! compiled locally.

use crate::agent::client::{AgentClient, AgentRequest};
use crate::error::ApiError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Default)]
pub struct ScriptedAgent {
    replies: Mutex<VecDeque<Result<String, ApiError>>>,
    requests: Mutex<Vec<AgentRequest>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agent = Self::new();
        for reply in replies {
            agent.push_reply(reply);
        }
        agent
    }

    /// An agent whose every call fails at the transport level.
    pub fn unreachable() -> Self {
        Self::new()
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: ApiError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl AgentClient for ScriptedAgent {
    async fn send(&self, request: &AgentRequest) -> Result<String, ApiError> {
        self.requests.lock().push(request.clone());
        self.replies.lock().pop_front().unwrap_or_else(|| {
            Err(ApiError::TransportError(
                "connection refused (no scripted reply)".to_string(),
            ))
        })
    }

    async fn check_status(&self) -> Result<bool, ApiError> {
        Ok(!self.replies.lock().is_empty())
    }
}
