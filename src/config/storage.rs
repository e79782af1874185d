//! StorageConfig: where component and layout files live.

use crate::config::xdg;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const COMPONENTS_FILE: &str = "components.json";
pub const LAYOUT_FILE: &str = "layout.json";

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Override for the data directory; `None` means `$XDG_DATA_HOME/panelkit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the data directory, creating it if needed.
    pub fn resolve_data_dir(&self) -> Result<PathBuf, ApiError> {
        match &self.data_dir {
            Some(dir) => {
                xdg::ensure_dir(dir)?;
                Ok(dir.clone())
            }
            None => xdg::panelkit_data_dir(),
        }
    }

    pub fn components_path(&self) -> Result<PathBuf, ApiError> {
        Ok(self.resolve_data_dir()?.join(COMPONENTS_FILE))
    }

    pub fn layout_path(&self) -> Result<PathBuf, ApiError> {
        Ok(self.resolve_data_dir()?.join(LAYOUT_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_data_dir_is_created() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested").join("data");
        let storage = StorageConfig {
            data_dir: Some(dir.clone()),
        };
        assert_eq!(storage.components_path().unwrap(), dir.join("components.json"));
        assert_eq!(storage.layout_path().unwrap(), dir.join("layout.json"));
        assert!(dir.is_dir());
    }
}
