//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::PanelkitConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file and environment.
    pub fn load() -> Result<PanelkitConfig, ApiError> {
        let config = MergeService::load().map_err(|e| ApiError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with an explicit file on top.
    pub fn load_from_file(path: &Path) -> Result<PanelkitConfig, ApiError> {
        let config = MergeService::load_from_file(path)
            .map_err(|e| ApiError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// `--config` wins when given; otherwise the standard sources.
    pub fn resolve(explicit: Option<&Path>) -> Result<PanelkitConfig, ApiError> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None => Self::load(),
        }
    }

    /// Create default configuration.
    pub fn default() -> PanelkitConfig {
        PanelkitConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("panelkit.toml");
        std::fs::write(
            &path,
            "[agent]\nmodel = \"anthropic/claude-sonnet-4-5\"\n\n[compiler]\nstep_budget = 5000\n",
        )
        .unwrap();
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.agent.model, "anthropic/claude-sonnet-4-5");
        assert_eq!(config.compiler.step_budget, 5000);
        assert_eq!(
            config.compiler.max_call_depth,
            ConfigLoader::default().compiler.max_call_depth
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let result = ConfigLoader::load_from_file(&temp.path().join("absent.toml"));
        assert!(matches!(result, Err(ApiError::ConfigError(_))));
    }

    #[test]
    fn invalid_endpoint_fails_validation() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("panelkit.toml");
        std::fs::write(&path, "[agent]\nendpoint = \"not a url\"\n").unwrap();
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }
}
