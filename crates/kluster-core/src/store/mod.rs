//! Backend-agnostic storage for cluster configuration documents
//!
//! A `ConfigStore` is a stateless handle for one document: the backend kind
//! plus its location parameters (file name, path, region). It owns no
//! long-lived connection, so building one per operation is cheap. Backend
//! selection is a value, not a branch in the lifecycle code.
//!
//! Operations never retry; retry policy belongs to the caller.

mod error;
mod local;
mod s3;

pub use error::{BackendSource, StoreError};

use kluster_common::naming::{DOCUMENT_EXTENSION, is_status_file};
use serde::Serialize;
use tracing::debug;

/// Storage backend kinds
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StorageKind {
    /// Directory on the local filesystem
    #[default]
    Local,
    /// S3 bucket, `path` is `bucket[/prefix]`
    S3,
}

/// Handle for one configuration document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    kind: StorageKind,
    file_name: String,
    path: String,
    region: String,
}

impl ConfigStore {
    /// Create a handle for `file_name` in the given location
    pub fn new(
        kind: StorageKind,
        file_name: impl Into<String>,
        path: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            file_name: file_name.into(),
            path: path.into(),
            region: region.into(),
        }
    }

    /// Handle for another document in the same location
    pub fn sibling(&self, file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..self.clone()
        }
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Check that the handle can address a document before anything is written
    pub fn validate_config(&self) -> Result<(), StoreError> {
        let key = &self.file_name;

        if key.is_empty() {
            return Err(StoreError::validation(key, "file name is empty"));
        }
        if !key.ends_with(DOCUMENT_EXTENSION) || key.len() == DOCUMENT_EXTENSION.len() {
            return Err(StoreError::validation(
                key,
                format!("file name must be a non-empty '*{DOCUMENT_EXTENSION}' name"),
            ));
        }
        if key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StoreError::validation(
                key,
                "file name must not contain path separators or start with '.'",
            ));
        }
        if self.path.trim().is_empty() {
            return Err(StoreError::validation(key, "storage path is empty"));
        }

        match self.kind {
            StorageKind::Local => Ok(()),
            StorageKind::S3 => s3::validate_location(key, &self.path, &self.region),
        }
    }

    /// Existence probe; a missing document is `Ok(false)`
    pub async fn check_config_exists(&self) -> Result<bool, StoreError> {
        let exists = match self.kind {
            StorageKind::Local => local::exists(&self.path, &self.file_name).await?,
            StorageKind::S3 => s3::exists(&self.path, &self.region, &self.file_name).await?,
        };
        debug!(key = %self.file_name, backend = %self.kind, exists, "Checked document");
        Ok(exists)
    }

    /// Serialize `doc` as YAML and write it under this handle's key.
    ///
    /// Backends overwrite an existing document; callers that must not
    /// overwrite check existence first.
    pub async fn create_config<T: Serialize + ?Sized>(&self, doc: &T) -> Result<(), StoreError> {
        let body = serde_yaml::to_string(doc).map_err(|source| StoreError::Encode {
            key: self.file_name.clone(),
            source,
        })?;

        match self.kind {
            StorageKind::Local => local::write(&self.path, &self.file_name, body.as_bytes()).await,
            StorageKind::S3 => {
                s3::write(&self.path, &self.region, &self.file_name, body.into_bytes()).await
            }
        }
    }

    /// Fetch the raw serialized document; the caller deserializes
    pub async fn get_config(&self) -> Result<Vec<u8>, StoreError> {
        match self.kind {
            StorageKind::Local => local::read(&self.path, &self.file_name).await,
            StorageKind::S3 => s3::read(&self.path, &self.region, &self.file_name).await,
        }
    }

    /// Remove the document; a missing document is `NotFound`
    pub async fn delete_config(&self) -> Result<(), StoreError> {
        match self.kind {
            StorageKind::Local => local::delete(&self.path, &self.file_name).await,
            StorageKind::S3 => s3::delete(&self.path, &self.region, &self.file_name).await,
        }
    }

    /// Names of configuration documents in this location starting with `prefix`.
    ///
    /// Status sidecars are excluded. Sorted for stable output.
    pub async fn list_configs(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let names = match self.kind {
            StorageKind::Local => local::list(&self.path).await?,
            StorageKind::S3 => s3::list(&self.path, &self.region, prefix).await?,
        };

        let mut names: Vec<String> = names
            .into_iter()
            .filter(|name| {
                name.starts_with(prefix)
                    && name.ends_with(DOCUMENT_EXTENSION)
                    && !is_status_file(name)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(file_name: &str) -> ConfigStore {
        ConfigStore::new(StorageKind::Local, file_name, "/var/lib/kluster", "")
    }

    #[test]
    fn storage_kind_parses() {
        assert_eq!("local".parse::<StorageKind>().ok(), Some(StorageKind::Local));
        assert_eq!("S3".parse::<StorageKind>().ok(), Some(StorageKind::S3));
        assert!("gcs".parse::<StorageKind>().is_err());
        assert_eq!(StorageKind::S3.to_string(), "s3");
    }

    #[test]
    fn validate_accepts_document_names() {
        assert!(local("aws-demo.yaml").validate_config().is_ok());
    }

    #[test]
    fn validate_rejects_bad_names() {
        for name in ["", ".yaml", "aws-demo.json", "../aws-demo.yaml", "a/b.yaml", ".hidden.yaml"] {
            let err = local(name).validate_config().unwrap_err();
            assert!(
                matches!(err, StoreError::Validation { .. }),
                "expected validation error for {name:?}"
            );
        }
    }

    #[test]
    fn validate_rejects_empty_path() {
        let store = ConfigStore::new(StorageKind::Local, "aws-demo.yaml", "  ", "");
        assert!(matches!(
            store.validate_config(),
            Err(StoreError::Validation { .. })
        ));
    }

    #[test]
    fn validate_s3_requires_region() {
        let store = ConfigStore::new(StorageKind::S3, "aws-demo.yaml", "my-bucket", "");
        assert!(store.validate_config().is_err());

        let store = store.sibling("aws-other.yaml");
        assert_eq!(store.file_name(), "aws-other.yaml");

        let store = ConfigStore::new(
            StorageKind::S3,
            "aws-demo.yaml",
            "my-bucket/clusters",
            "us-east-1",
        );
        assert!(store.validate_config().is_ok());
    }
}
