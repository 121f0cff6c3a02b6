// ABOUTME: Object store gateway trait for publishing workspace artifacts
// ABOUTME: Defines the narrow upload/presign interface the engine consumes

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub mod s3;

pub use s3::{S3Config, S3Store};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Bucket error: {0}")]
    Bucket(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Presign error: {0}")]
    Presign(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Narrow capability interface to durable key-addressed storage with
/// time-limited signed-URL issuance. Any conforming store (local or remote)
/// satisfies the contract; the engine never reaches past it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the bucket if it does not exist. Idempotent; called once at startup.
    async fn ensure_bucket(&self, bucket: &str) -> Result<()>;

    /// Upload a local file under the given key, replacing any existing object.
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;

    /// Issue a time-limited direct-download URL for one object key.
    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String>;
}
