// ABOUTME: Publishes files left in a workspace after execution to durable storage
// ABOUTME: Skips reserved input names and degrades per-file failures to warnings

use runbox_store::ObjectStore;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Filename reserved for downloaded input documents. Never harvested.
pub const RESERVED_INPUT_NAME: &str = "document";

/// A published output file with a time-limited download link.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub filename: String,
    pub url: String,
}

/// Upload every regular file directly under the workspace (except the
/// reserved input name) under `{session_id}/{filename}` and return
/// descriptors in directory listing order. That order is platform-dependent;
/// callers must not rely on it. An upload or presign failure drops that one
/// descriptor and leaves the rest of the harvest intact.
pub async fn harvest(
    store: &dyn ObjectStore,
    bucket: &str,
    presign_ttl: Duration,
    session_id: &str,
    workspace: &Path,
) -> std::io::Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    let mut entries = tokio::fs::read_dir(workspace).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().into_owned();
        if filename == RESERVED_INPUT_NAME {
            continue;
        }

        let key = format!("{}/{}", session_id, filename);
        if let Err(e) = store.put_file(bucket, &key, &entry.path()).await {
            warn!("Failed to upload artifact {}: {}", key, e);
            continue;
        }

        match store.presign_get(bucket, &key, presign_ttl).await {
            Ok(url) => {
                debug!("Published artifact: {}", key);
                artifacts.push(Artifact { filename, url });
            }
            Err(e) => warn!("Failed to presign artifact {}: {}", key, e),
        }
    }

    Ok(artifacts)
}
