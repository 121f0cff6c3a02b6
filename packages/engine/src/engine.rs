// ABOUTME: SandboxEngine facade wiring workspaces, runner, and object store together
// ABOUTME: Serializes same-session requests and publishes output artifacts per run

use crate::config::EngineConfig;
use crate::download;
use crate::error::{EngineError, ErrorKind, Result};
use crate::harvest::{self, Artifact, RESERVED_INPUT_NAME};
use crate::runner::SandboxRunner;
use crate::workspace::WorkspaceManager;
use runbox_store::ObjectStore;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Outcome of one execute request. The exit code and log are the primary
/// success signal; a non-zero exit means the caller's program failed, not
/// the engine. Artifact order follows directory listing order.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub session_id: String,
    pub exit_code: i64,
    pub log: String,
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub session_id: String,
    pub filename: String,
}

/// The engine's explicit dependency object. Client handles are injected at
/// construction so tests can substitute fakes for the runner and the store.
pub struct SandboxEngine {
    config: EngineConfig,
    workspaces: WorkspaceManager,
    runner: Arc<dyn SandboxRunner>,
    store: Arc<dyn ObjectStore>,
    http: reqwest::Client,
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SandboxEngine {
    pub fn new(
        config: EngineConfig,
        runner: Arc<dyn SandboxRunner>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let workspaces = WorkspaceManager::new(config.workspace_root.clone());
        Self {
            config,
            workspaces,
            runner,
            store,
            http: reqwest::Client::new(),
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Create the artifact bucket if needed. Call once at startup.
    pub async fn ensure_bucket(&self) -> Result<()> {
        self.store
            .ensure_bucket(&self.config.bucket)
            .await
            .map_err(|e| EngineError::unresolved(ErrorKind::Store(e)))
    }

    /// Run code in a fresh execution environment against the session's
    /// workspace, then publish any files it produced. Requests against the
    /// same session are serialized; distinct sessions run concurrently.
    pub async fn execute(&self, code: &str, session_id: Option<&str>) -> Result<ExecutionResult> {
        let (session_id, workspace) = self.resolve(session_id).await?;
        let lock = self.session_lock(&session_id).await;
        let _guard = lock.lock().await;

        let outcome = self
            .runner
            .run(&workspace, code)
            .await
            .map_err(|e| EngineError::new(&session_id, e.into()))?;

        let artifacts = harvest::harvest(
            self.store.as_ref(),
            &self.config.bucket,
            self.config.presign_ttl,
            &session_id,
            &workspace,
        )
        .await
        .map_err(|e| EngineError::new(&session_id, ErrorKind::WorkspaceIo(e)))?;

        info!(
            "Execution finished for session {} (exit code {}, {} artifacts)",
            session_id,
            outcome.exit_code,
            artifacts.len()
        );

        Ok(ExecutionResult {
            session_id,
            exit_code: outcome.exit_code,
            log: outcome.log,
            artifacts,
        })
    }

    /// Fetch a remote document into the session workspace. The default
    /// filename is the reserved input name, which the harvester skips.
    pub async fn download(
        &self,
        document_url: &str,
        filename: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<DownloadResult> {
        let (session_id, workspace) = self.resolve(session_id).await?;
        let lock = self.session_lock(&session_id).await;
        let _guard = lock.lock().await;

        let filename = match filename {
            Some(name) if !name.is_empty() => name,
            _ => RESERVED_INPUT_NAME,
        };

        download::fetch_document(
            &self.http,
            document_url,
            &workspace,
            filename,
            self.config.download_timeout,
        )
        .await
        .map_err(|e| EngineError::new(&session_id, ErrorKind::Download(e.to_string())))?;

        Ok(DownloadResult {
            session_id,
            filename: filename.to_string(),
        })
    }

    /// Remove workspaces idle past `ttl`, returning the reaped session ids.
    /// Holding the lock map for the whole pass keeps new requests from
    /// starting against a session while its directory is coming down, and a
    /// session whose mutex is held by an in-flight execute/download is
    /// skipped rather than deleted under a live bind mount.
    pub async fn reap_idle_sessions(&self, ttl: Duration) -> Result<Vec<String>> {
        let mut locks = self.session_locks.lock().await;

        let candidates = self
            .workspaces
            .idle_sessions(ttl)
            .await
            .map_err(|e| EngineError::unresolved(ErrorKind::WorkspaceIo(e)))?;

        let mut reaped = Vec::new();
        for session_id in candidates {
            let lock = locks.entry(session_id.clone()).or_default().clone();
            let Ok(_guard) = lock.try_lock() else {
                continue;
            };
            match self.workspaces.remove_session(&session_id).await {
                Ok(()) => reaped.push(session_id),
                Err(e) => warn!("Failed to reap session {}: {}", session_id, e),
            }
        }

        for session_id in &reaped {
            locks.remove(session_id);
        }

        Ok(reaped)
    }

    /// Periodically remove workspaces idle past `ttl`. Opt-in; the engine
    /// never deletes workspaces otherwise.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        interval: Duration,
        ttl: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match engine.reap_idle_sessions(ttl).await {
                    Ok(reaped) if !reaped.is_empty() => {
                        info!("Reaped {} idle sessions", reaped.len());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Session reap pass failed: {}", e),
                }
            }
        })
    }

    async fn resolve(&self, session_id: Option<&str>) -> Result<(String, PathBuf)> {
        self.workspaces
            .resolve(session_id)
            .await
            .map_err(|e| match session_id {
                Some(id) if !id.is_empty() => EngineError::new(id, ErrorKind::WorkspaceIo(e)),
                _ => EngineError::unresolved(ErrorKind::WorkspaceIo(e)),
            })
    }

    /// One mutex per session serializes workspace mutations from concurrent
    /// execute/download calls targeting the same id.
    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        locks.entry(session_id.to_string()).or_default().clone()
    }
}
