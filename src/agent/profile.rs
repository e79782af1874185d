//! Agent gateway profile: config shape and validation.

use serde::{Deserialize, Serialize};

/// A model the gateway can route to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOption {
    pub id: String,
    pub label: String,
}

impl ModelOption {
    fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
        }
    }
}

/// Gateway connection settings (`[agent]` in the config file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL; `/api/chat` and `/api/status` are appended.
    pub endpoint: String,

    /// Bearer token, sent only when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Model id sent with each request.
    pub model: String,

    /// Agent persona requested from the gateway.
    pub agent_id: String,

    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,

    /// Models offered by `panelkit models`.
    pub models: Vec<ModelOption>,
}

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3577";
pub const DEFAULT_AGENT_ID: &str = "widget-creator";

pub fn default_models() -> Vec<ModelOption> {
    vec![
        ModelOption::new("anthropic/claude-haiku-4-5", "Haiku (fast)"),
        ModelOption::new("anthropic/claude-sonnet-4-5", "Sonnet (balanced)"),
        ModelOption::new("anthropic/claude-opus-4-6", "Opus (powerful)"),
        ModelOption::new("google-gemini-cli/gemini-3-flash-preview", "Gemini Flash"),
    ]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let models = default_models();
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            model: models[0].id.clone(),
            agent_id: DEFAULT_AGENT_ID.to_string(),
            timeout_secs: 120,
            models,
        }
    }
}

impl GatewayConfig {
    fn endpoint_has_scheme(endpoint: &str) -> bool {
        endpoint.starts_with("http://") || endpoint.starts_with("https://")
    }

    /// Endpoint with a scheme and without a trailing slash. Bare hosts get
    /// `http://` for loopback and `https://` otherwise.
    pub fn normalized_endpoint(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if Self::endpoint_has_scheme(endpoint) {
            return endpoint.to_string();
        }
        if endpoint.starts_with("localhost") || endpoint.starts_with("127.") {
            format!("http://{}", endpoint)
        } else {
            format!("https://{}", endpoint)
        }
    }

    pub fn endpoint_url_is_valid(endpoint: &str) -> bool {
        let Some(rest) = endpoint.split_once("://").map(|(_, rest)| rest) else {
            return false;
        };

        if rest.is_empty() || rest.chars().any(char::is_whitespace) {
            return false;
        }

        let authority = rest.split('/').next().unwrap_or_default();
        let host_port = authority.rsplit('@').next().unwrap_or(authority);
        if host_port.is_empty() {
            return false;
        }

        let host = if host_port.starts_with('[') {
            let Some(end_bracket) = host_port.find(']') else {
                return false;
            };
            &host_port[1..end_bracket]
        } else {
            host_port.split(':').next().unwrap_or_default()
        };

        if host.is_empty() {
            return false;
        }

        host == "localhost" || host.contains('.') || host.parse::<std::net::IpAddr>().is_ok()
    }

    /// Label for the selected model, falling back to its id.
    pub fn model_label(&self) -> &str {
        self.models
            .iter()
            .find(|m| m.id == self.model)
            .map(|m| m.label.as_str())
            .unwrap_or(&self.model)
    }

    /// Validate gateway configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if self.agent_id.trim().is_empty() {
            return Err("Agent id cannot be empty".to_string());
        }
        let endpoint = self.normalized_endpoint();
        if !Self::endpoint_url_is_valid(&endpoint) {
            return Err(format!("Invalid endpoint URL: {}", self.endpoint));
        }
        if self.timeout_secs == 0 {
            return Err("Timeout must be at least one second".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model_label(), "Haiku (fast)");
    }

    #[test]
    fn bare_hosts_get_a_scheme() {
        let mut config = GatewayConfig {
            endpoint: "localhost:3577/".to_string(),
            ..GatewayConfig::default()
        };
        assert_eq!(config.normalized_endpoint(), "http://localhost:3577");
        config.endpoint = "gateway.example.dev".to_string();
        assert_eq!(config.normalized_endpoint(), "https://gateway.example.dev");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_endpoints_and_empty_model() {
        for endpoint in ["http://", "http://exa mple.com", "not-a-host", "http://[::1"] {
            let config = GatewayConfig {
                endpoint: endpoint.to_string(),
                ..GatewayConfig::default()
            };
            assert!(config.validate().is_err(), "{} should be rejected", endpoint);
        }
        let config = GatewayConfig {
            model: "  ".to_string(),
            ..GatewayConfig::default()
        };
        assert_eq!(config.validate().unwrap_err(), "Model name cannot be empty");
    }

    #[test]
    fn unknown_model_label_falls_back_to_id() {
        let config = GatewayConfig {
            model: "local/llama".to_string(),
            ..GatewayConfig::default()
        };
        assert_eq!(config.model_label(), "local/llama");
    }
}
