//! Pluggable provisioners
//!
//! A provisioner performs the actual infrastructure work for one cloud
//! backend. The lifecycle layer only ever calls the three capabilities below,
//! polymorphically, after resolving an implementation by name from a
//! [`ProvisionerRegistry`].

mod command;
mod registry;

pub use command::{CommandProvisioner, CommandProvisionerConfig, CommandSpec};
pub use registry::{ProvisionerRegistry, RegistryBuilder};

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Parameter key carrying the cluster name
pub const PARAM_CLUSTER_NAME: &str = "cluster_name";

/// Parameter key carrying the provider tag
pub const PARAM_PROVIDER: &str = "provider";

/// The three capabilities every provisioner exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Capability {
    Init,
    Setup,
    Destroy,
}

/// Optional, provisioner-defined parameter bag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionParams(BTreeMap<String, String>);

impl ProvisionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters identifying one cluster
    pub fn for_cluster(provider: &str, cluster_name: &str) -> Self {
        Self::new()
            .with(PARAM_PROVIDER, provider)
            .with(PARAM_CLUSTER_NAME, cluster_name)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn cluster_name(&self) -> Option<&str> {
        self.get(PARAM_CLUSTER_NAME)
    }

    pub fn provider(&self) -> Option<&str> {
        self.get(PARAM_PROVIDER)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Capability set of a provisioner.
///
/// Each call may run for a long time; the lifecycle layer never awaits these
/// on the caller's path.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Prepare provisioning state (working directory, credentials context)
    async fn init(&self, params: Option<&ProvisionParams>) -> Result<()>;

    /// Perform the long-running provisioning work
    async fn setup(&self, params: Option<&ProvisionParams>) -> Result<()>;

    /// Perform the long-running teardown work
    async fn destroy(&self, params: Option<&ProvisionParams>) -> Result<()>;
}
