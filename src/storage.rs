//! JSON file helpers shared by the component and layout repositories.

use crate::error::ApiError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Write `value` as pretty JSON through a temp file and a rename, so readers
/// never observe a half-written file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ApiError::StorageError(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ApiError::StorageError(format!("Invalid file name: {}", path.display())))?;
    let tmp_path = path.with_file_name(format!("{}.tmp.{}", file_name, std::process::id()));

    let contents = serde_json::to_string_pretty(value)?;
    std::fs::write(&tmp_path, contents).map_err(|e| {
        ApiError::StorageError(format!("Failed to write {}: {}", tmp_path.display(), e))
    })?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        ApiError::StorageError(format!("Failed to replace {}: {}", path.display(), e))
    })
}

/// Read a JSON file. A missing file is `Ok(None)`.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ApiError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ApiError::StorageError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| ApiError::StorageError(format!("Failed to parse {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("deep").join("data.json");
        write_json_atomic(&path, &json!({"a": 1})).unwrap();
        write_json_atomic(&path, &json!({"a": 2})).unwrap();

        let read: Option<Value> = read_json_file(&path).unwrap();
        assert_eq!(read, Some(json!({"a": 2})));
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn missing_or_blank_file_reads_as_none() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("absent.json");
        assert!(read_json_file::<Value>(&path).unwrap().is_none());
        std::fs::write(&path, "  \n").unwrap();
        assert!(read_json_file::<Value>(&path).unwrap().is_none());
        std::fs::write(&path, "{broken").unwrap();
        assert!(matches!(
            read_json_file::<Value>(&path),
            Err(ApiError::StorageError(_))
        ));
    }
}
