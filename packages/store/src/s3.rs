// ABOUTME: S3-compatible object store implementation using the AWS SDK
// ABOUTME: Supports MinIO and other S3-compatible endpoints via endpoint override

use crate::{ObjectStore, Result, StoreError};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for an S3-compatible store.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Custom endpoint for S3-compatible services such as MinIO.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Path-style addressing, required by MinIO.
    pub force_path_style: bool,
}

impl S3Config {
    /// Read connection settings from RUNBOX_S3_* environment variables.
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("RUNBOX_S3_ENDPOINT").ok(),
            region: std::env::var("RUNBOX_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id: std::env::var("RUNBOX_S3_ACCESS_KEY")
                .unwrap_or_else(|_| "minioadmin".to_string()),
            secret_access_key: std::env::var("RUNBOX_S3_SECRET_KEY")
                .unwrap_or_else(|_| "minioadmin".to_string()),
            force_path_style: true,
        }
    }
}

/// AWS S3 / MinIO gateway implementation.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build the client once at startup; clones share the same connection pool.
    pub async fn connect(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "runbox-store",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();

        Self {
            client: Client::from_conf(s3_config),
        }
    }

    /// Create with a pre-built client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                debug!("Bucket {} already exists", bucket);
                Ok(())
            }
            Err(_) => {
                info!("Creating bucket: {}", bucket);
                self.client
                    .create_bucket()
                    .bucket(bucket)
                    .send()
                    .await
                    .map_err(|e| {
                        StoreError::Bucket(format!("Failed to create bucket {}: {}", bucket, e))
                    })?;
                Ok(())
            }
        }
    }

    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path).await.map_err(|e| {
            StoreError::Upload(format!("Failed to read {}: {}", path.display(), e))
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type("application/octet-stream")
            .send()
            .await
            .map_err(|e| StoreError::Upload(format!("Failed to upload {}: {}", key, e)))?;

        debug!("Uploaded object: {}", key);
        Ok(())
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StoreError::Presign(format!("Invalid presign TTL: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StoreError::Presign(format!("Failed to presign {}: {}", key, e)))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_day_presign_window_is_accepted() {
        // S3 caps presigned URLs at one week; the engine's default TTL sits
        // exactly on that limit.
        let ttl = Duration::from_secs(7 * 24 * 60 * 60);
        assert!(PresigningConfig::expires_in(ttl).is_ok());
    }

    #[test]
    fn env_config_defaults_to_path_style() {
        let config = S3Config::from_env();
        assert!(config.force_path_style);
        assert!(!config.region.is_empty());
    }
}
