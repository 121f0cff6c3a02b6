// ABOUTME: Maps session ids to persistent host-side workspace directories
// ABOUTME: Mints short ids, creates directories lazily, and reaps idle sessions

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};
use uuid::Uuid;

/// Resolves sessions to workspace directories under a fixed root. A session
/// id maps to the same directory for the lifetime of the process; resolve
/// never deletes anything.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a session to its workspace, minting a fresh id when none is
    /// supplied. Creation is idempotent, so files persist across requests
    /// that reuse the id.
    pub async fn resolve(&self, session_id: Option<&str>) -> std::io::Result<(String, PathBuf)> {
        let session_id = match session_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => mint_session_id(),
        };

        let dir = self.root.join(&session_id);
        tokio::fs::create_dir_all(&dir).await?;

        Ok((session_id, dir))
    }

    /// Sessions whose contents have not been touched for longer than `ttl`.
    /// Candidates only; the engine decides removal, so a session with an
    /// in-flight request is never deleted out from under its bind mount.
    pub async fn idle_sessions(&self, ttl: Duration) -> std::io::Result<Vec<String>> {
        let Some(cutoff) = SystemTime::now().checked_sub(ttl) else {
            return Ok(Vec::new());
        };

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut idle = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let session_id = entry.file_name().to_string_lossy().into_owned();
            let last_used = match newest_mtime(&entry.path()).await {
                Ok(mtime) => mtime,
                Err(e) => {
                    warn!("Skipping session {} during idle scan: {}", session_id, e);
                    continue;
                }
            };

            if last_used < cutoff {
                idle.push(session_id);
            }
        }

        Ok(idle)
    }

    /// Delete one session's directory outright.
    pub async fn remove_session(&self, session_id: &str) -> std::io::Result<()> {
        tokio::fs::remove_dir_all(self.root.join(session_id)).await?;
        info!("Removed session workspace: {}", session_id);
        Ok(())
    }
}

/// Newest modification time of the directory itself or any file directly in it.
async fn newest_mtime(dir: &Path) -> std::io::Result<SystemTime> {
    let mut newest = tokio::fs::metadata(dir).await?.modified()?;

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) {
            if modified > newest {
                newest = modified;
            }
        }
    }

    Ok(newest)
}

/// Short opaque session token. Eight hex chars of a v4 uuid gives enough
/// entropy to make collisions vanishingly unlikely at this scale.
fn mint_session_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn mints_short_id_when_none_given() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let (id, dir) = manager.resolve(None).await.unwrap();
        assert_eq!(id.len(), 8);
        assert!(dir.is_dir());

        let (other, _) = manager.resolve(Some("")).await.unwrap();
        assert_ne!(id, other);
    }

    #[tokio::test]
    async fn same_id_resolves_to_same_directory() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let (id, first) = manager.resolve(Some("sess-1")).await.unwrap();
        std::fs::write(first.join("x.txt"), b"hi").unwrap();

        let (_, second) = manager.resolve(Some(&id)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read(second.join("x.txt")).unwrap(), b"hi");
    }

    #[tokio::test]
    async fn idle_scan_reports_only_idle_sessions() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let (id, dir) = manager.resolve(Some("old")).await.unwrap();
        std::fs::write(dir.join("out.txt"), b"data").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Nothing is an hour old, so a long TTL finds no candidates.
        let idle = manager.idle_sessions(Duration::from_secs(3600)).await.unwrap();
        assert!(idle.is_empty());

        let idle = manager.idle_sessions(Duration::ZERO).await.unwrap();
        assert_eq!(idle, vec![id.clone()]);

        manager.remove_session(&id).await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn idle_scan_on_missing_root_is_empty() {
        let manager = WorkspaceManager::new("/nonexistent/runbox-test-root");
        let idle = manager.idle_sessions(Duration::ZERO).await.unwrap();
        assert!(idle.is_empty());
    }
}
