//! AWS test utilities
//!
//! Region detection and unique names for tests that talk to real S3.

use chrono::Utc;

/// Get the AWS region for tests.
///
/// Checks `AWS_REGION`, then `AWS_DEFAULT_REGION`, then falls back to
/// us-east-2.
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-2".to_string())
}

/// Bucket (plus optional prefix) used by the S3 store tests.
///
/// Read from `KLUSTER_TEST_BUCKET`; S3 tests are skipped when unset.
pub fn get_test_bucket() -> Option<String> {
    std::env::var("KLUSTER_TEST_BUCKET")
        .ok()
        .filter(|bucket| !bucket.is_empty())
}

/// Generate a unique cluster name for test resources.
///
/// Format: `test-{timestamp_ms}-{counter}`, a valid DNS label, unique even
/// when tests start simultaneously.
///
/// # Example
///
/// ```
/// use kluster_test_utils::aws::test_cluster_name;
///
/// let name = test_cluster_name();
/// assert!(name.starts_with("test-"));
/// ```
pub fn test_cluster_name() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{ts}-{counter}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_names_are_unique() {
        let a = test_cluster_name();
        let b = test_cluster_name();
        assert_ne!(a, b);
        assert!(a.len() <= 63);
    }
}
