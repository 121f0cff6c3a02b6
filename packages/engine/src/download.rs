// ABOUTME: Fetches remote documents into a session workspace over HTTP
// ABOUTME: Bounded timeout, verbatim body write, non-2xx reported as failure

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Failed to write document: {0}")]
    Write(#[from] std::io::Error),
}

/// Fetch `url` with the shared client and write the response body verbatim
/// to `{workspace}/{filename}`. Timeouts, network errors, and non-2xx
/// statuses all surface as a download failure.
pub async fn fetch_document(
    client: &reqwest::Client,
    url: &str,
    workspace: &Path,
    filename: &str,
    timeout: Duration,
) -> Result<PathBuf, DownloadError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| DownloadError::Request(e.to_string()))?;

    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status().as_u16()));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| DownloadError::Request(e.to_string()))?;

    let path = workspace.join(filename);
    tokio::fs::write(&path, &body).await?;

    info!("Downloaded {} bytes to {}", body.len(), path.display());
    Ok(path)
}
