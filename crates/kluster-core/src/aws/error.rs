//! AWS error classification
//!
//! Classifies S3 failures by the service error code (via
//! `ProvideErrorMetadata`) instead of string matching on Debug output.

use aws_sdk_s3::error::ProvideErrorMetadata;
use thiserror::Error;

/// AWS error categories relevant to document storage
#[derive(Debug, Error)]
pub enum AwsError {
    /// Object or bucket does not exist
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }
}

/// Known S3 error codes for "not found" conditions.
///
/// `HeadObject` carries no body, so its 404 surfaces as the bare `NotFound`.
const NOT_FOUND_CODES: &[&str] = &["NoSuchKey", "NoSuchBucket", "NotFound"];

/// Classify an AWS error from its code and message.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify any SDK error that exposes error metadata.
pub fn classify_sdk_error<E: ProvideErrorMetadata>(error: &E) -> AwsError {
    classify_aws_error(error.code(), error.message())
}
