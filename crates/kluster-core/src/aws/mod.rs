//! AWS client modules
//!
//! Thin wrappers around the AWS SDK used by the object storage backend:
//! - s3: document upload, download, listing and deletion
//! - error: classification of SDK errors by code

pub mod error;
pub mod s3;

pub use error::{AwsError, classify_aws_error, classify_sdk_error};
pub use s3::S3Client;
