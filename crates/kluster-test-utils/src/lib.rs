//! Shared test utilities for kluster
//!
//! This crate provides common test helpers that can be used across
//! multiple test modules without circular dependencies.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique cluster names
//! - [`harness`]: Cluster manager over a temporary local store

pub mod aws;
pub mod harness;

// Re-export commonly used items
pub use aws::{get_test_bucket, get_test_region, test_cluster_name};
pub use harness::{TestHarness, demo_aws_cluster};
pub use kluster_core::testing::{RecordingProvisioner, SetupGate};
