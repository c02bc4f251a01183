//! S3 object management for configuration documents

use crate::aws::error::classify_sdk_error;
use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::{Client, primitives::ByteStream};
use tracing::debug;

/// Wrap an SDK error with its classified `AwsError` and an operation message.
///
/// The classification stays reachable with `downcast_ref::<AwsError>()`.
fn sdk_failure<E>(error: E, operation: &'static str) -> anyhow::Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let kind = classify_sdk_error(&error);
    anyhow::Error::new(error).context(kind).context(operation)
}

/// S3 client for reading and writing cluster documents
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Load SDK configuration for `region` and build a client.
    ///
    /// Credentials come from the environment, config files or an instance
    /// role, as resolved by `aws_config`.
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: Client::new(&config),
        }
    }

    /// Check whether an object exists.
    ///
    /// A missing object is `Ok(false)`; a missing bucket or any other failure
    /// is an error.
    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        debug!(bucket = %bucket, key = %key, "Checking object");

        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    return Ok(false);
                }
                Err(sdk_failure(e, "Failed to check object"))
            }
        }
    }

    /// Upload bytes to S3
    pub async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        debug!(bucket = %bucket, key = %key, size = data.len(), "Uploading bytes");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| sdk_failure(e, "Failed to upload bytes"))?;

        Ok(())
    }

    /// Download an object, returning None when the key does not exist
    pub async fn download_bytes(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        debug!(bucket = %bucket, key = %key, "Downloading object");

        let response = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(response) => response,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(sdk_failure(e, "Failed to download object"));
            }
        };

        let body = response
            .body
            .collect()
            .await
            .context("Failed to read object body")?;

        Ok(Some(body.into_bytes().to_vec()))
    }

    /// Delete a single object
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        debug!(bucket = %bucket, key = %key, "Deleting object");

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_failure(e, "Failed to delete object"))?;

        Ok(())
    }

    /// List all object keys under a prefix
    pub async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| sdk_failure(e, "Failed to list objects"))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(keys)
    }
}
