//! File-based storage backend implementation.
//!
//! Persists each value as one JSON-bytes file under
//! `<storage_path>/<namespace>/<id>`, giving durable state across restarts
//! without an external database.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use dispatch_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-based storage implementation.
pub struct FileStorage {
	/// Root directory holding one subdirectory per namespace.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage rooted at the given directory.
	pub fn new(base_path: impl Into<PathBuf>) -> Self {
		Self {
			base_path: base_path.into(),
		}
	}

	/// Splits a `namespace:id` key into a relative file path.
	///
	/// Ids are opaque but must not escape the namespace directory.
	fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
		let (namespace, id) = key
			.split_once(':')
			.ok_or_else(|| StorageError::Backend(format!("Malformed key: {}", key)))?;
		if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
			return Err(StorageError::Backend(format!("Invalid key id: {}", id)));
		}
		Ok(self.base_path.join(namespace).join(id))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.path_for(key)?;
		match fs::read(&path).await {
			Ok(bytes) => Ok(bytes),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.path_for(key)?;
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		// Write-then-rename so a crash never leaves a half-written record.
		let tmp = path.with_extension("tmp");
		fs::write(&tmp, &value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&tmp, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.path_for(key)?;
		match fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let path = self.path_for(key)?;
		Ok(fs::try_exists(&path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?)
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let namespace = prefix.strip_suffix(':').unwrap_or(prefix);
		let dir = self.base_path.join(namespace);
		if !Path::new(&dir).exists() {
			return Ok(Vec::new());
		}

		let mut keys = Vec::new();
		let mut entries = fs::read_dir(&dir)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let name = entry.file_name();
			let Some(name) = name.to_str() else { continue };
			// Skip interrupted writes.
			if name.ends_with(".tmp") {
				continue;
			}
			keys.push(format!("{}:{}", namespace, name));
		}
		Ok(keys)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("storage_path", FieldType::String)],
			vec![],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: directory where data files are stored (required)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.ok_or_else(|| StorageError::Configuration("storage_path must be a string".into()))?;

	Ok(Box::new(FileStorage::new(storage_path)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[tokio::test]
	async fn test_round_trip_and_delete() {
		let dir = tempdir().unwrap();
		let storage = FileStorage::new(dir.path());

		storage
			.set_bytes("orders:o1", b"payload".to_vec())
			.await
			.unwrap();
		assert_eq!(storage.get_bytes("orders:o1").await.unwrap(), b"payload");
		assert!(storage.exists("orders:o1").await.unwrap());

		storage.delete("orders:o1").await.unwrap();
		assert!(matches!(
			storage.get_bytes("orders:o1").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_list_keys_per_namespace() {
		let dir = tempdir().unwrap();
		let storage = FileStorage::new(dir.path());

		storage.set_bytes("orders:o1", vec![1]).await.unwrap();
		storage.set_bytes("wallet_entries:w1", vec![2]).await.unwrap();

		let keys = storage.list_keys("orders:").await.unwrap();
		assert_eq!(keys, vec!["orders:o1"]);
		assert_eq!(storage.list_keys("payouts:").await.unwrap().len(), 0);
	}

	#[tokio::test]
	async fn test_rejects_escaping_ids() {
		let dir = tempdir().unwrap();
		let storage = FileStorage::new(dir.path());

		let result = storage.set_bytes("orders:../evil", vec![1]).await;
		assert!(matches!(result, Err(StorageError::Backend(_))));
	}
}
