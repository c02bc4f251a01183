//! Lifecycle errors
//!
//! Every variant carries the cluster it concerns, so callers can log and
//! react without extra context. Failures inside background provisioning never
//! appear here; they are recorded in the cluster's status instead.

use super::{ClusterRef, DocumentError};
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// The document failed schema checks; nothing was written
    #[error("{cluster} failed validation:\n{report}")]
    Validation {
        cluster: ClusterRef,
        report: garde::Report,
    },

    /// No persisted document for the name
    #[error("no such cluster: {cluster}")]
    NotFound { cluster: ClusterRef },

    /// A document already exists and overwriting is not allowed
    #[error("{cluster} already exists")]
    AlreadyExists { cluster: ClusterRef },

    /// No provisioner registered under the provider name
    #[error("no provisioner registered for '{provisioner}' ({cluster})")]
    UnsupportedProvisioner {
        cluster: ClusterRef,
        provisioner: String,
    },

    /// Another lifecycle operation holds the cluster
    #[error("{cluster} has a lifecycle operation in progress")]
    Busy { cluster: ClusterRef },

    /// The stored document could not be decoded
    #[error("failed to decode {cluster}")]
    Decode {
        cluster: ClusterRef,
        #[source]
        source: DocumentError,
    },

    /// The storage backend failed or rejected the handle
    #[error("failed to {operation} {cluster}")]
    Store {
        cluster: ClusterRef,
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// The background executor is gone; the work was not dispatched
    #[error("provision executor is not running; {cluster} was not dispatched")]
    ExecutorClosed { cluster: ClusterRef },
}

impl ClusterError {
    pub(crate) fn store(cluster: &ClusterRef, operation: &'static str, source: StoreError) -> Self {
        match source {
            StoreError::NotFound { .. } => Self::NotFound {
                cluster: cluster.clone(),
            },
            source => Self::Store {
                cluster: cluster.clone(),
                operation,
                source,
            },
        }
    }

    /// The cluster this error concerns
    pub fn cluster(&self) -> &ClusterRef {
        match self {
            Self::Validation { cluster, .. }
            | Self::NotFound { cluster }
            | Self::AlreadyExists { cluster }
            | Self::UnsupportedProvisioner { cluster, .. }
            | Self::Busy { cluster }
            | Self::Decode { cluster, .. }
            | Self::Store { cluster, .. }
            | Self::ExecutorClosed { cluster } => cluster,
        }
    }

    /// Check if this is a "no such cluster" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Schema failure of the document or the store handle
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::Store {
                    source: StoreError::Validation { .. },
                    ..
                }
        )
    }
}
