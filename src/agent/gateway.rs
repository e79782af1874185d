//! HTTP gateway implementation of [`AgentClient`].

use crate::agent::client::{AgentClient, AgentRequest};
use crate::agent::profile::GatewayConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Response fields that may carry the reply text, in preference order.
const REPLY_FIELDS: [&str; 4] = ["message", "text", "reply", "content"];

pub struct GatewayClient {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    agent_id: String,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, ApiError> {
        config.validate().map_err(ApiError::ProviderNotConfigured)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::TransportError(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = config.normalized_endpoint();
        tracing::info!(endpoint = %endpoint, agent = %config.agent_id, "gateway client ready");

        Ok(Self {
            client,
            endpoint,
            token: config.token.clone().filter(|t| !t.is_empty()),
            agent_id: config.agent_id.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn request_body(&self, request: &AgentRequest) -> Value {
        let messages: Vec<Value> = request
            .turns
            .iter()
            .map(|turn| json!({"role": turn.role.to_string(), "content": turn.text}))
            .collect();
        json!({
            "model": request.model_id,
            "agentId": self.agent_id,
            "system": request.preamble,
            "messages": messages,
            "message": request.latest_user_text().unwrap_or_default(),
        })
    }
}

/// Pull the reply text out of a gateway response body.
pub fn reply_text(body: &Value) -> Option<String> {
    REPLY_FIELDS
        .iter()
        .find_map(|field| body.get(field).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl AgentClient for GatewayClient {
    async fn send(&self, request: &AgentRequest) -> Result<String, ApiError> {
        let url = format!("{}/api/chat", self.endpoint);
        tracing::debug!(url = %url, turns = request.turns.len(), model = %request.model_id, "sending agent request");

        let response = self
            .authorize(self.client.post(&url))
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::AgentRequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ApiError::TransportError(format!("Failed to parse response: {}", e)))?;
        reply_text(&body).ok_or_else(|| {
            ApiError::TransportError("Gateway response carried no reply text".to_string())
        })
    }

    async fn check_status(&self) -> Result<bool, ApiError> {
        let url = format!("{}/api/status", self.endpoint);
        let response = self.authorize(self.client.get(&url)).send().await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Turn;

    #[test]
    fn reply_text_prefers_message() {
        assert_eq!(
            reply_text(&json!({"text": "b", "message": "a"})).as_deref(),
            Some("a")
        );
        assert_eq!(reply_text(&json!({"content": "c"})).as_deref(), Some("c"));
        assert_eq!(reply_text(&json!({"message": 3})), None);
    }

    #[test]
    fn body_carries_history_and_latest_message() {
        let client = GatewayClient::new(&GatewayConfig {
            token: Some("secret".into()),
            ..GatewayConfig::default()
        })
        .unwrap();
        let request = AgentRequest {
            turns: vec![
                Turn::user("first"),
                Turn::assistant("ok"),
                Turn::user("second"),
            ],
            model_id: "m".into(),
            preamble: "rules".into(),
        };
        let body = client.request_body(&request);
        assert_eq!(body["message"], "second");
        assert_eq!(body["system"], "rules");
        assert_eq!(body["agentId"], "widget-creator");
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(client.endpoint(), "http://localhost:3577");
    }

    #[tokio::test]
    async fn unreachable_gateway_is_a_transport_error() {
        let client = GatewayClient::new(&GatewayConfig {
            endpoint: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..GatewayConfig::default()
        })
        .unwrap();
        let request = AgentRequest {
            turns: vec![Turn::user("hi")],
            model_id: "m".into(),
            preamble: String::new(),
        };
        let err = client.send(&request).await.unwrap_err();
        assert!(err.is_transport(), "{:?}", err);
    }
}
