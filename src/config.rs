//! Configuration
//!
//! Layered configuration for the panelkit CLI and services. Values come from
//! built-in defaults, the global `$XDG_CONFIG_HOME/panelkit/config.toml`, an
//! optional explicit file and `PANELKIT__*` environment variables, in that order.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
mod storage;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use storage::StorageConfig;

use crate::agent::GatewayConfig;
use crate::compiler::CompilerSettings;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelkitConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Agent gateway connection.
    #[serde(default)]
    pub agent: GatewayConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Execution limits for authored component code.
    #[serde(default)]
    pub compiler: CompilerSettings,
}

impl PanelkitConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        self.agent.validate().map_err(ApiError::ConfigError)?;
        if self.compiler.step_budget == 0 {
            return Err(ApiError::ConfigError(
                "compiler.step_budget must be greater than zero".to_string(),
            ));
        }
        if self.compiler.max_call_depth == 0 {
            return Err(ApiError::ConfigError(
                "compiler.max_call_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML, e.g. for `panelkit status`.
    pub fn to_toml(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(self)
            .map_err(|e| ApiError::ConfigError(format!("Failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = PanelkitConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compiler.step_budget, 1_000_000);
        assert!(config.storage.data_dir.is_none());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let mut config = PanelkitConfig::default();
        config.compiler.step_budget = 0;
        assert!(matches!(config.validate(), Err(ApiError::ConfigError(_))));
    }

    #[test]
    fn renders_as_toml() {
        let rendered = PanelkitConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[agent]"));
        assert!(rendered.contains("[compiler]"));
        let parsed: PanelkitConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.agent.model, PanelkitConfig::default().agent.model);
    }
}
