//! kluster-common - Shared types and utilities
//!
//! This crate provides types shared by the core library, the CLI and the
//! test helpers, without any AWS SDK dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values
//! - [`naming`]: Deterministic document keys
//! - [`status`]: Cluster lifecycle states

pub mod defaults;
pub mod naming;
pub mod status;

// Re-export commonly used types
pub use naming::{config_file_name, status_file_name};
pub use status::ClusterStatus;

