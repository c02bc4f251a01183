//! Typed cluster configuration documents and their lifecycle
//!
//! Each provider defines a flat record implementing [`ClusterConfig`]. On
//! disk the record sits under a single top-level key equal to the provider
//! name:
//!
//! ```yaml
//! aws:
//!   clustername: demo
//!   aws_kube_master_num: 1
//! ```
//!
//! [`ClusterManager`] composes the store, the provisioner registry and the
//! executor into the Create / Destroy / Get operations.

mod aws;
mod eks;
mod error;
mod manager;
pub(crate) mod state;
mod validate;

pub use aws::AwsCluster;
pub use eks::EksCluster;
pub use error::ClusterError;
pub use manager::ClusterManager;
pub use state::ClusterState;

use kluster_common::naming::{config_file_name, status_file_name};
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A provider-specific cluster configuration record
pub trait ClusterConfig:
    Serialize
    + DeserializeOwned
    + garde::Validate<Context = ()>
    + Clone
    + fmt::Debug
    + Send
    + Sync
    + 'static
{
    /// Provider tag; also the document's top-level key and the provisioner name
    const PROVIDER: &'static str;

    /// Unique name within the provider namespace
    fn cluster_name(&self) -> &str;

    /// Identity of this cluster
    fn cluster_ref(&self) -> ClusterRef {
        ClusterRef::new(Self::PROVIDER, self.cluster_name())
    }
}

/// Provider + name identity of a cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterRef {
    pub provider: String,
    pub name: String,
}

impl ClusterRef {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
        }
    }

    /// Lock key, `<provider>-<name>`
    pub fn key(&self) -> String {
        format!("{}-{}", self.provider, self.name)
    }

    /// Configuration document key
    pub fn config_file(&self) -> String {
        config_file_name(&self.provider, &self.name)
    }

    /// Status sidecar key
    pub fn status_file(&self) -> String {
        status_file_name(&self.provider, &self.name)
    }
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cluster '{}'", self.provider, self.name)
    }
}

/// Serializes a record under its provider key
pub struct ProviderDocument<'a, C>(pub &'a C);

impl<C: ClusterConfig> Serialize for ProviderDocument<'_, C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(C::PROVIDER, self.0)?;
        map.end()
    }
}

/// Errors decoding a stored or supplied document
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid document")]
    Yaml(#[from] serde_yaml::Error),

    #[error("document has no '{provider}' section")]
    MissingSection { provider: &'static str },
}

/// Encode a record as a provider-keyed YAML document
pub fn encode_document<C: ClusterConfig>(cluster: &C) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&ProviderDocument(cluster))
}

/// Decode a provider-keyed YAML document
pub fn decode_document<C: ClusterConfig>(bytes: &[u8]) -> Result<C, DocumentError> {
    let mut sections: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_slice(bytes)?;

    match sections.remove(C::PROVIDER) {
        Some(serde_yaml::Value::Null) | None => Err(DocumentError::MissingSection {
            provider: C::PROVIDER,
        }),
        Some(section) => Ok(serde_yaml::from_value(section)?),
    }
}

/// Parse caller input: a provider-keyed document or a bare record.
///
/// YAML is a superset of JSON, so JSON input parses through the same path.
pub fn parse_cluster_input<C: ClusterConfig>(bytes: &[u8]) -> Result<C, DocumentError> {
    match decode_document(bytes) {
        Err(DocumentError::MissingSection { .. }) => Ok(serde_yaml::from_slice(bytes)?),
        other => other,
    }
}
