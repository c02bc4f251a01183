//! Deterministic document keys
//!
//! Every cluster document lives under `<provider>-<clustername>.yaml`. The
//! background worker keeps a status record next to it under
//! `<provider>-<clustername>.status.yaml`.

/// Extension of every persisted document
pub const DOCUMENT_EXTENSION: &str = ".yaml";

/// Suffix of status sidecar documents
pub const STATUS_SUFFIX: &str = ".status.yaml";

/// Key of the configuration document for a cluster
pub fn config_file_name(provider: &str, cluster_name: &str) -> String {
    format!("{provider}-{cluster_name}{DOCUMENT_EXTENSION}")
}

/// Key of the status sidecar for a cluster
pub fn status_file_name(provider: &str, cluster_name: &str) -> String {
    format!("{provider}-{cluster_name}{STATUS_SUFFIX}")
}

/// Prefix shared by all documents of one provider
pub fn provider_prefix(provider: &str) -> String {
    format!("{provider}-")
}

/// Whether a key names a status sidecar rather than a configuration document
pub fn is_status_file(file_name: &str) -> bool {
    file_name.ends_with(STATUS_SUFFIX)
}

/// Recover the cluster name from a configuration document key
///
/// Returns None for keys of another provider, status sidecars and anything
/// that is not a `.yaml` document.
pub fn cluster_name_from_file(provider: &str, file_name: &str) -> Option<String> {
    if is_status_file(file_name) {
        return None;
    }
    file_name
        .strip_prefix(&provider_prefix(provider))?
        .strip_suffix(DOCUMENT_EXTENSION)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_key_format() {
        assert_eq!(config_file_name("aws", "demo"), "aws-demo.yaml");
        assert_eq!(status_file_name("aws", "demo"), "aws-demo.status.yaml");
    }

    #[test]
    fn cluster_name_roundtrip() {
        let key = config_file_name("aws", "prod-east");
        assert_eq!(
            cluster_name_from_file("aws", &key).as_deref(),
            Some("prod-east")
        );
    }

    #[test]
    fn foreign_and_sidecar_keys_are_skipped() {
        assert!(cluster_name_from_file("aws", "eks-demo.yaml").is_none());
        assert!(cluster_name_from_file("aws", "aws-demo.status.yaml").is_none());
        assert!(cluster_name_from_file("aws", "aws-demo.json").is_none());
        assert!(cluster_name_from_file("aws", "aws-.yaml").is_none());
    }
}
