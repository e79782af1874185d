use crate::config::StorageConfig;
use crate::error::ApiError;
use crate::registry::repository::{
    ComponentRepository, LoadedComponents, RejectedRecord, StoredComponent,
};
use crate::storage::{read_json_file, write_json_atomic};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// `components.json` under the panelkit data directory: an ordered object
/// keyed by component id.
pub struct XdgComponentRepository {
    path: PathBuf,
}

impl XdgComponentRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_storage(storage: &StorageConfig) -> Result<Self, ApiError> {
        Ok(Self::new(storage.components_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ComponentRepository for XdgComponentRepository {
    fn load(&self) -> Result<LoadedComponents, ApiError> {
        let Some(root) = read_json_file::<Value>(&self.path)? else {
            return Ok(LoadedComponents::default());
        };
        let Value::Object(entries) = root else {
            return Err(ApiError::StorageError(format!(
                "{} does not contain a JSON object",
                self.path.display()
            )));
        };

        let mut loaded = LoadedComponents::default();
        for (key, value) in entries {
            if !value.is_object() {
                tracing::warn!("Skipping component record {} in {}: not an object", key, self.path.display());
                loaded.rejected.push(RejectedRecord {
                    key,
                    reason: "record is not an object".to_string(),
                });
                continue;
            }
            let mut record: StoredComponent = match serde_json::from_value(value) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Failed to decode component record {}: {}", key, e);
                    loaded.rejected.push(RejectedRecord {
                        key,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if record.id.is_empty() {
                record.id = key;
            } else if record.id != key {
                tracing::warn!(
                    "Component id mismatch in {}: key={}, record={}",
                    self.path.display(),
                    key,
                    record.id
                );
            }
            loaded.records.push(record);
        }
        Ok(loaded)
    }

    fn save_all(&self, components: &[StoredComponent]) -> Result<(), ApiError> {
        let mut entries = Map::new();
        for component in components {
            entries.insert(component.id.clone(), serde_json::to_value(component)?);
        }
        write_json_atomic(&self.path, &Value::Object(entries))?;
        tracing::debug!(
            count = components.len(),
            path = %self.path.display(),
            "component sources written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> StoredComponent {
        serde_json::from_value(json!({
            "id": id,
            "name": id.to_uppercase(),
            "source": "function Widget() { return null }"
        }))
        .unwrap()
    }

    #[test]
    fn round_trip_keeps_order_and_omits_origin() {
        let temp = tempfile::tempdir().unwrap();
        let repo = XdgComponentRepository::new(temp.path().join("components.json"));
        repo.save_all(&[record("zeta"), record("alpha")]).unwrap();

        let text = std::fs::read_to_string(repo.path()).unwrap();
        assert!(!text.contains("origin"));
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());

        let loaded = repo.load().unwrap();
        let ids: Vec<&str> = loaded.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
        assert_eq!(loaded.records[1].icon, "🧩");
    }

    #[test]
    fn bad_records_are_rejected_individually() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("components.json");
        std::fs::write(
            &path,
            r#"{"good": {"source": "x"}, "bad": 7, "worse": {"defaultSize": "big"}}"#,
        )
        .unwrap();
        let loaded = XdgComponentRepository::new(&path).load().unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].id, "good");
        let keys: Vec<&str> = loaded.rejected.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["bad", "worse"]);
    }

    #[test]
    fn unreadable_store_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("components.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(XdgComponentRepository::new(&path).load().is_err());
        std::fs::write(&path, "{not json").unwrap();
        assert!(XdgComponentRepository::new(&path).load().is_err());
    }

    #[test]
    fn missing_file_loads_empty() {
        let temp = tempfile::tempdir().unwrap();
        let loaded = XdgComponentRepository::new(temp.path().join("none.json"))
            .load()
            .unwrap();
        assert!(loaded.records.is_empty());
        assert!(loaded.rejected.is_empty());
    }
}
