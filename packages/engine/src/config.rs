// ABOUTME: Engine configuration with environment-variable loading
// ABOUTME: Defaults mirror the sandbox image contract: /app code dir, /app/data workspace mount

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Pre-built image the execution environments are launched from.
pub const DEFAULT_IMAGE: &str = "python-sandbox";

/// In-environment path the session workspace is bound at. Code running in the
/// sandbox reads and writes its files here.
pub const DEFAULT_DATA_MOUNT: &str = "/app/data";

/// In-environment directory the entry script is injected into.
pub const DEFAULT_CODE_DIR: &str = "/app";

const DEFAULT_MEMORY_LIMIT_BYTES: i64 = 512 * 1024 * 1024;
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub image: String,
    /// Fixed command every environment runs; expects the injected entry script.
    pub entry_command: Vec<String>,
    pub data_mount: String,
    pub code_dir: String,
    /// Hard memory ceiling per environment.
    pub memory_limit_bytes: i64,
    /// Wall-clock bound on a single execution.
    pub run_timeout: Duration,
    pub download_timeout: Duration,
    /// Validity window for artifact download links.
    pub presign_ttl: Duration,
    /// Bucket all artifacts are published into, one per deployment.
    pub bucket: String,
    /// Host-side root under which all session workspaces live.
    pub workspace_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            entry_command: vec!["python".to_string(), "/app/main.py".to_string()],
            data_mount: DEFAULT_DATA_MOUNT.to_string(),
            code_dir: DEFAULT_CODE_DIR.to_string(),
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            presign_ttl: DEFAULT_PRESIGN_TTL,
            bucket: "python-outputs".to_string(),
            workspace_root: PathBuf::from("runbox_workspace"),
        }
    }
}

impl EngineConfig {
    /// Overlay defaults with RUNBOX_* environment variables. Unparseable
    /// values fall back to the default rather than failing startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(image) = get("RUNBOX_IMAGE") {
            config.image = image;
        }
        if let Some(bucket) = get("RUNBOX_BUCKET") {
            config.bucket = bucket;
        }
        if let Some(root) = get("RUNBOX_WORKSPACE_ROOT") {
            config.workspace_root = PathBuf::from(root);
        }
        if let Some(mb) = parse::<i64>(get("RUNBOX_MEMORY_LIMIT_MB")) {
            config.memory_limit_bytes = mb * 1024 * 1024;
        }
        if let Some(secs) = parse::<u64>(get("RUNBOX_RUN_TIMEOUT_SECS")) {
            config.run_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(get("RUNBOX_DOWNLOAD_TIMEOUT_SECS")) {
            config.download_timeout = Duration::from_secs(secs);
        }

        config
    }
}

fn parse<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.parse().ok())
}
