//! Layout persistence port and adapters.

use crate::config::StorageConfig;
use crate::error::ApiError;
use crate::layout::LayoutItem;
use crate::storage::{read_json_file, write_json_atomic};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

pub trait LayoutRepository: Send + Sync {
    fn load(&self) -> Result<Vec<LayoutItem>, ApiError>;
    fn save(&self, items: &[LayoutItem]) -> Result<(), ApiError>;
}

/// `layout.json`: an ordered array of instances.
pub struct XdgLayoutRepository {
    path: PathBuf,
}

impl XdgLayoutRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_storage(storage: &StorageConfig) -> Result<Self, ApiError> {
        Ok(Self::new(storage.layout_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LayoutRepository for XdgLayoutRepository {
    fn load(&self) -> Result<Vec<LayoutItem>, ApiError> {
        Ok(read_json_file(&self.path)?.unwrap_or_default())
    }

    fn save(&self, items: &[LayoutItem]) -> Result<(), ApiError> {
        write_json_atomic(&self.path, items)
    }
}

#[derive(Default)]
pub struct InMemoryLayoutRepository {
    items: Mutex<Vec<LayoutItem>>,
    fail_with: Option<String>,
}

impl InMemoryLayoutRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn items(&self) -> Vec<LayoutItem> {
        self.items.lock().clone()
    }

    fn check(&self) -> Result<(), ApiError> {
        match &self.fail_with {
            Some(message) => Err(ApiError::StorageError(message.clone())),
            None => Ok(()),
        }
    }
}

impl LayoutRepository for InMemoryLayoutRepository {
    fn load(&self) -> Result<Vec<LayoutItem>, ApiError> {
        self.check()?;
        Ok(self.items())
    }

    fn save(&self, items: &[LayoutItem]) -> Result<(), ApiError> {
        self.check()?;
        *self.items.lock() = items.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Layout, Placement};
    use crate::types::Size;
    use serde_json::Map;

    #[test]
    fn layout_file_uses_camel_case_fields() {
        let temp = tempfile::tempdir().unwrap();
        let repo = XdgLayoutRepository::new(temp.path().join("layout.json"));
        let mut layout = Layout::default();
        layout.attach(
            "clock",
            Placement {
                default_size: Size::new(3, 2),
                min_size: Size::new(2, 2),
                default_config: Map::new(),
            },
        );
        repo.save(layout.items()).unwrap();

        let text = std::fs::read_to_string(repo.path()).unwrap();
        for key in ["instanceId", "definitionId", "minW", "minH", "config"] {
            assert!(text.contains(key), "missing {}", key);
        }
        assert_eq!(repo.load().unwrap(), layout.items());
    }
}
