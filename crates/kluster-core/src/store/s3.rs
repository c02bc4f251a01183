//! S3 backend
//!
//! `path` is `bucket[/prefix]`; the object key is `prefix/file_name`. A client
//! is built per operation from the region, so the handle stays stateless.

use super::{StorageKind, StoreError};
use crate::aws::{AwsError, S3Client};

const CONTENT_TYPE: &str = "application/yaml";

/// Split `bucket[/prefix]` into bucket and key prefix (without trailing slash)
fn split_path(path: &str) -> (&str, &str) {
    let path = path.trim_matches('/');
    match path.split_once('/') {
        Some((bucket, prefix)) => (bucket, prefix.trim_end_matches('/')),
        None => (path, ""),
    }
}

fn object_key(prefix: &str, file_name: &str) -> String {
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{prefix}/{file_name}")
    }
}

fn backend_error(operation: &'static str, key: &str, source: anyhow::Error) -> StoreError {
    StoreError::backend(StorageKind::S3, operation, key, source)
}

pub(super) fn validate_location(
    file_name: &str,
    path: &str,
    region: &str,
) -> Result<(), StoreError> {
    let (bucket, _) = split_path(path);

    if region.trim().is_empty() {
        return Err(StoreError::validation(file_name, "storage region is empty"));
    }
    let valid_bucket = (3..=63).contains(&bucket.len())
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    if !valid_bucket {
        return Err(StoreError::validation(
            file_name,
            format!("'{bucket}' is not a valid bucket name"),
        ));
    }
    Ok(())
}

pub(super) async fn exists(path: &str, region: &str, file_name: &str) -> Result<bool, StoreError> {
    let (bucket, prefix) = split_path(path);
    S3Client::new(region)
        .await
        .object_exists(bucket, &object_key(prefix, file_name))
        .await
        .map_err(|e| backend_error("check", file_name, e))
}

pub(super) async fn write(
    path: &str,
    region: &str,
    file_name: &str,
    body: Vec<u8>,
) -> Result<(), StoreError> {
    let (bucket, prefix) = split_path(path);
    S3Client::new(region)
        .await
        .upload_bytes(bucket, &object_key(prefix, file_name), body, CONTENT_TYPE)
        .await
        .map_err(|e| backend_error("write", file_name, e))
}

pub(super) async fn read(path: &str, region: &str, file_name: &str) -> Result<Vec<u8>, StoreError> {
    let (bucket, prefix) = split_path(path);
    S3Client::new(region)
        .await
        .download_bytes(bucket, &object_key(prefix, file_name))
        .await
        .map_err(|e| backend_error("read", file_name, e))?
        .ok_or_else(|| StoreError::NotFound {
            key: file_name.to_string(),
        })
}

/// S3 deletes are silent on missing keys, so probe first to report `NotFound`
pub(super) async fn delete(path: &str, region: &str, file_name: &str) -> Result<(), StoreError> {
    let (bucket, prefix) = split_path(path);
    let key = object_key(prefix, file_name);
    let s3 = S3Client::new(region).await;

    let present = s3
        .object_exists(bucket, &key)
        .await
        .map_err(|e| backend_error("check", file_name, e))?;
    if !present {
        return Err(StoreError::NotFound {
            key: file_name.to_string(),
        });
    }

    match s3.delete_object(bucket, &key).await {
        Ok(()) => Ok(()),
        Err(e) if e.downcast_ref::<AwsError>().is_some_and(AwsError::is_not_found) => {
            Err(StoreError::NotFound {
                key: file_name.to_string(),
            })
        }
        Err(e) => Err(backend_error("delete", file_name, e)),
    }
}

/// File names (prefix stripped) of objects whose name starts with `name_prefix`
pub(super) async fn list(
    path: &str,
    region: &str,
    name_prefix: &str,
) -> Result<Vec<String>, StoreError> {
    let (bucket, prefix) = split_path(path);
    let keys = S3Client::new(region)
        .await
        .list_keys(bucket, &object_key(prefix, name_prefix))
        .await
        .map_err(|e| backend_error("list", path, e))?;

    let strip = if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}/")
    };

    Ok(keys
        .into_iter()
        .filter_map(|key| key.strip_prefix(&strip).map(str::to_string))
        .filter(|name| !name.contains('/'))
        .collect())
}
