use crate::error::ApiError;
use crate::registry::repository::{ComponentRepository, LoadedComponents, StoredComponent};
use parking_lot::Mutex;

/// In-process repository, used by tests and by `--ephemeral` runs.
#[derive(Default)]
pub struct InMemoryComponentRepository {
    records: Mutex<Vec<StoredComponent>>,
    saves: Mutex<usize>,
    fail_with: Option<String>,
}

impl InMemoryComponentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<StoredComponent>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// A store whose every operation fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<StoredComponent> {
        self.records.lock().clone()
    }

    /// Number of successful `save_all` calls.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    fn check(&self) -> Result<(), ApiError> {
        match &self.fail_with {
            Some(message) => Err(ApiError::StorageError(message.clone())),
            None => Ok(()),
        }
    }
}

impl ComponentRepository for InMemoryComponentRepository {
    fn load(&self) -> Result<LoadedComponents, ApiError> {
        self.check()?;
        Ok(LoadedComponents {
            records: self.records.lock().clone(),
            rejected: Vec::new(),
        })
    }

    fn save_all(&self, components: &[StoredComponent]) -> Result<(), ApiError> {
        self.check()?;
        *self.records.lock() = components.to_vec();
        *self.saves.lock() += 1;
        Ok(())
    }
}
