// ABOUTME: Shared test doubles for engine integration tests
// ABOUTME: Scripted runner and in-memory object store standing in for Docker and S3
#![allow(dead_code)]

use async_trait::async_trait;
use runbox_engine::runner::{Result as RunnerResult, RunOutcome, SandboxRunner};
use runbox_engine::{EngineConfig, SandboxEngine};
use runbox_store::{ObjectStore, Result as StoreResult, StoreError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

type Script = dyn Fn(&Path, &str) -> RunnerResult<RunOutcome> + Send + Sync;

/// Runner double driven by a closure over the workspace, standing in for the
/// side effects sandboxed code would have.
pub struct ScriptedRunner {
    script: Box<Script>,
}

impl ScriptedRunner {
    pub fn new(
        script: impl Fn(&Path, &str) -> RunnerResult<RunOutcome> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
        }
    }

    /// Runner that writes one file into the workspace and exits cleanly.
    pub fn writing(filename: &str, content: &[u8]) -> Self {
        let filename = filename.to_string();
        let content = content.to_vec();
        Self::new(move |workspace, _| {
            std::fs::write(workspace.join(&filename), &content).expect("write workspace file");
            Ok(RunOutcome {
                exit_code: 0,
                log: String::new(),
            })
        })
    }

    /// Runner that prints a workspace file, mimicking the interpreter's
    /// behavior when the file is missing.
    pub fn reading(filename: &str) -> Self {
        let filename = filename.to_string();
        Self::new(move |workspace, _| match std::fs::read(workspace.join(&filename)) {
            Ok(content) => Ok(RunOutcome {
                exit_code: 0,
                log: String::from_utf8_lossy(&content).into_owned(),
            }),
            Err(_) => Ok(RunOutcome {
                exit_code: 1,
                log: format!(
                    "FileNotFoundError: [Errno 2] No such file or directory: '{}'",
                    filename
                ),
            }),
        })
    }
}

#[async_trait]
impl SandboxRunner for ScriptedRunner {
    async fn run(&self, workspace: &Path, code: &str) -> RunnerResult<RunOutcome> {
        (self.script)(workspace, code)
    }
}

/// In-memory object store. Keys are `{bucket}/{key}`; presigned URLs are
/// deterministic so tests can dereference them against `objects`.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads_for: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects uploads whose key ends with any given filename.
    pub fn failing_uploads_for(filenames: &[&str]) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            fail_uploads_for: filenames.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, key))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn ensure_bucket(&self, _bucket: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> StoreResult<()> {
        if self.fail_uploads_for.iter().any(|f| key.ends_with(f)) {
            return Err(StoreError::Upload(format!("injected failure for {}", key)));
        }
        let content = std::fs::read(path)?;
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, key), content);
        Ok(())
    }

    async fn presign_get(&self, bucket: &str, key: &str, _ttl: Duration) -> StoreResult<String> {
        Ok(format!("https://store.test/{}/{}", bucket, key))
    }
}

/// Engine wired to fakes over a temporary workspace root. The TempDir must
/// outlive the engine.
pub fn test_engine(
    runner: Arc<dyn SandboxRunner>,
    store: Arc<MemoryStore>,
) -> (Arc<SandboxEngine>, TempDir) {
    let root = TempDir::new().expect("Failed to create workspace root");
    let mut config = EngineConfig::default();
    config.workspace_root = root.path().to_path_buf();
    config.bucket = "test-bucket".to_string();
    (Arc::new(SandboxEngine::new(config, runner, store)), root)
}
