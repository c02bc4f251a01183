//! kluster-core - cluster configuration store and provisioner dispatch
//!
//! This crate persists validated cluster configuration documents, resolves
//! the provisioner for a cluster's provider and runs provisioning work in
//! the background. The `kluster` binary is a thin CLI over
//! [`cluster::ClusterManager`].

pub mod aws;
pub mod cluster;
pub mod config;
pub mod executor;
pub mod lock;
pub mod provisioner;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
