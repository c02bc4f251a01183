//! Configuration types for the cluster manager
//!
//! These are process-wide settings, resolved once from CLI flags and the
//! environment. Nothing here comes from a cluster document.

use crate::store::{ConfigStore, StorageKind};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use kluster_common::defaults::DEFAULT_STORAGE_DIR;
use std::path::PathBuf;

/// Location parameters for the configuration store backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Backend kind
    pub kind: StorageKind,
    /// Directory (local) or `bucket[/prefix]` (s3)
    pub path: String,
    /// Storage region (s3 only)
    pub region: String,
}

impl StoreSettings {
    /// Settings for a local directory
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            kind: StorageKind::Local,
            path: path.into(),
            region: String::new(),
        }
    }

    /// Settings for an S3 bucket (optionally with a key prefix)
    pub fn s3(bucket_path: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            kind: StorageKind::S3,
            path: bucket_path.into(),
            region: region.into(),
        }
    }

    /// Build a store handle for one document in this location
    pub fn handle(&self, file_name: impl Into<String>) -> ConfigStore {
        ConfigStore::new(self.kind, file_name, &self.path, &self.region)
    }
}

/// What `create` does when a document with the same key already exists
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    clap::ValueEnum,
)]
#[strum(serialize_all = "snake_case")]
pub enum OverwritePolicy {
    /// Fail with `AlreadyExists`
    #[default]
    Reject,
    /// Replace the stored document and provision again
    Replace,
}

/// Lifecycle behavior of the cluster manager
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    pub overwrite: OverwritePolicy,
}

/// Default local storage directory under the platform data dir
pub fn default_storage_path() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "kluster").context("Failed to get project directories")?;

    Ok(proj_dirs.data_local_dir().join(DEFAULT_STORAGE_DIR))
}

/// Default working directory root for command provisioners
pub fn default_work_dir() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "kluster").context("Failed to get project directories")?;

    Ok(proj_dirs.data_local_dir().join("work"))
}
