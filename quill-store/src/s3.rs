//! S3 adapter for the [`ObjectStore`] trait.
//!
//! Works against AWS proper or any S3-compatible endpoint (MinIO, R2).
//! The client is built once from an [`S3Config`] and shared across all
//! concurrent operations.

use crate::client::{ObjectMeta, ObjectStore};
use crate::config::S3Config;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Production object store backed by S3.
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Builds a client from the config. Fails with `StoreError::Config`
    /// on invalid bucket/region/credentials before any network call.
    pub fn connect(config: &S3Config) -> StoreResult<Self> {
        config.validate()?;

        let credentials = aws_credential_types::Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "quill-static",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .region(aws_types::region::Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .behavior_version_latest();

        if let Some(ref endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }

    fn meta_from_head(
        key: &str,
        size: Option<i64>,
        last_modified: Option<aws_sdk_s3::primitives::DateTime>,
    ) -> StoreResult<ObjectMeta> {
        let last_modified = last_modified
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
            .ok_or_else(|| {
                StoreError::Connection(format!("missing last-modified in head for {key}"))
            })?;
        Ok(ObjectMeta {
            size: size.unwrap_or(0).max(0) as u64,
            last_modified,
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::Connection(format!("put failed for {key}: {e}")))?;

        debug!("put {size} bytes to s3://{}/{key}", self.bucket);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Connection(format!("get failed for {key}: {service_err}"))
                }
            })?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Connection(format!("failed to read body for {key}: {e}")))?;

        let bytes = body.into_bytes().to_vec();
        debug!("got {} bytes from s3://{}/{key}", bytes.len(), self.bucket);
        Ok(bytes)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        // S3 delete is idempotent: deleting an absent key returns 204.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Connection(format!("delete failed for {key}: {e}")))?;

        debug!("deleted s3://{}/{key}", self.bucket);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Connection(format!(
                        "head failed for {key}: {service_err}"
                    )))
                }
            }
        }
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }

            let resp = req.send().await.map_err(|e| {
                StoreError::Connection(format!("list failed for prefix {prefix}: {e}"))
            })?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(|k| k.to_string())),
            );

            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    async fn list_common_prefixes(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut prefixes = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .delimiter("/");
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }

            let resp = req.send().await.map_err(|e| {
                StoreError::Connection(format!("list prefixes failed for {prefix}: {e}"))
            })?;

            prefixes.extend(
                resp.common_prefixes()
                    .iter()
                    .filter_map(|p| p.prefix().map(|s| s.to_string())),
            );

            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(prefixes)
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectMeta> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Connection(format!("head failed for {key}: {service_err}"))
                }
            })?;

        Self::meta_from_head(key, resp.content_length(), resp.last_modified().copied())
    }
}
