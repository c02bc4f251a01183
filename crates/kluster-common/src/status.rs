//! Canonical cluster lifecycle states
//!
//! A cluster moves through
//! `Absent -> Validated -> Persisted -> Provisioning -> (Ready | Failed)`
//! on create, and `Persisted/Ready -> Removing -> Absent` on destroy.
//! `Absent` is never stored; it is the lack of a document.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a persisted cluster
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ClusterStatus {
    /// Document passed validation but is not written yet
    #[default]
    Validated,
    /// Document is written, provisioning not started
    Persisted,
    /// Provisioner init/setup is running
    Provisioning,
    /// Provisioner setup completed
    Ready,
    /// Provisioner init or setup failed
    Failed,
    /// Provisioner destroy is running
    Removing,
    /// Provisioner destroy failed
    DestroyFailed,
}

impl ClusterStatus {
    /// Whether a background capability is currently running
    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::Provisioning | Self::Removing)
    }
}
