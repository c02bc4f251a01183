//! Configuration store errors

use super::StorageKind;
use thiserror::Error;

/// Boxed backend-native cause (I/O error, AWS SDK error chain)
pub type BackendSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by `ConfigStore` operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The handle or document-to-be is not well formed; nothing was written
    #[error("invalid store configuration for '{key}': {reason}")]
    Validation { key: String, reason: String },

    /// No document exists under the key
    #[error("document '{key}' not found")]
    NotFound { key: String },

    /// The storage medium failed
    #[error("failed to {operation} '{key}' on {backend} storage")]
    Backend {
        backend: StorageKind,
        operation: &'static str,
        key: String,
        #[source]
        source: BackendSource,
    },

    /// The document could not be serialized
    #[error("failed to encode document '{key}'")]
    Encode {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The stored bytes are not a valid document
    #[error("failed to decode document '{key}'")]
    Decode {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl StoreError {
    /// Create a validation error
    pub fn validation(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a backend error wrapping the native cause
    pub fn backend(
        backend: StorageKind,
        operation: &'static str,
        key: impl Into<String>,
        source: impl Into<BackendSource>,
    ) -> Self {
        Self::Backend {
            backend,
            operation,
            key: key.into(),
            source: source.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
