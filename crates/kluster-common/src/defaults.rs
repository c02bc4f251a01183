//! Default configuration values shared across kluster components
//!
//! These constants keep the CLI, the store settings and the provisioners in
//! agreement about where things live when nothing is configured.

/// Default storage backend kind
pub const DEFAULT_STORAGE: &str = "local";

/// Default storage region (only meaningful for object storage)
pub const DEFAULT_STORAGE_REGION: &str = "us-east-1";

/// Name of the directory, under the platform data dir, used for local storage
pub const DEFAULT_STORAGE_DIR: &str = "clusters";

/// Default provisioner command timeout in seconds (3 hours)
pub const DEFAULT_PROVISION_TIMEOUT: u64 = 10_800;

/// Default terraform-style commands run by the command provisioner
pub const DEFAULT_INIT_COMMAND: &str = "terraform init -input=false";
pub const DEFAULT_SETUP_COMMAND: &str = "terraform apply -input=false -auto-approve";
pub const DEFAULT_DESTROY_COMMAND: &str = "terraform destroy -input=false -auto-approve";

