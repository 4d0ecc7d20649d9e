//! Object-store configuration.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};

/// Configuration for the S3 backend.
///
/// Immutable once applied; re-initializing the store replaces the whole
/// config rather than patching fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct S3Config {
    /// S3 bucket name.
    pub bucket: String,

    /// AWS region.
    pub region: String,

    /// Access key id.
    pub access_key_id: String,

    /// Secret access key.
    pub secret_access_key: String,

    /// Optional endpoint override (for MinIO or other S3-compatible stores).
    pub endpoint: Option<String>,
}

impl S3Config {
    /// Validates the config before a client is built from it.
    pub fn validate(&self) -> StoreResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(StoreError::Config("bucket must not be empty".into()));
        }
        if self.region.trim().is_empty() {
            return Err(StoreError::Config("region must not be empty".into()));
        }
        if self.access_key_id.trim().is_empty() || self.secret_access_key.trim().is_empty() {
            return Err(StoreError::Config("credentials must not be empty".into()));
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(StoreError::Config(format!(
                    "endpoint must be an http(s) URL, got {endpoint}"
                )));
            }
        }
        Ok(())
    }

    /// Creates a config for testing with MinIO.
    pub fn minio_test() -> Self {
        Self {
            bucket: "quill-notes".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: "quill-test".to_string(),
            secret_access_key: "quill-test-secret".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
        }
    }
}
