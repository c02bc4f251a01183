//! Status sidecar written next to each configuration document
//!
//! The configuration document is never modified after create; progress of
//! the background work is recorded here instead.

use crate::store::{ConfigStore, StoreError};
use chrono::{DateTime, Utc};
use kluster_common::ClusterStatus;
use serde::{Deserialize, Serialize};

/// Last known lifecycle state of a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    pub status: ClusterStatus,
    /// Failure detail for `failed` / `destroy_failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ClusterState {
    pub fn new(status: ClusterStatus) -> Self {
        Self {
            status,
            message: None,
            updated_at: Utc::now(),
        }
    }

    pub fn failed(status: ClusterStatus, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(status)
        }
    }
}

/// Write the state through a sidecar handle
pub(crate) async fn write_state(
    store: &ConfigStore,
    state: &ClusterState,
) -> Result<(), StoreError> {
    store.create_config(state).await
}

/// Read the state; a missing sidecar is `None`
pub(crate) async fn read_state(store: &ConfigStore) -> Result<Option<ClusterState>, StoreError> {
    let bytes = match store.get_config().await {
        Ok(bytes) => bytes,
        Err(StoreError::NotFound { .. }) => return Ok(None),
        Err(e) => return Err(e),
    };

    serde_yaml::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Decode {
            key: store.file_name().to_string(),
            source,
        })
}

/// Remove the sidecar; already gone is fine
pub(crate) async fn clear_state(store: &ConfigStore) -> Result<(), StoreError> {
    match store.delete_config().await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => other,
    }
}
