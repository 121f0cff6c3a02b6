// ABOUTME: Isolated execution orchestrator backed by Docker via bollard
// ABOUTME: One ephemeral network-disabled container per request, removed on every exit path

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, UploadToContainerOptions,
    WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::injector;

/// Label applied to every container the runner creates, so stray instances
/// can be found and tests can assert cleanup.
pub const MANAGED_LABEL: &str = "runbox.managed";

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Launch error: {0}")]
    Launch(String),

    #[error("Code transfer error: {0}")]
    Transfer(String),

    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("Container error: {0}")]
    Container(String),
}

pub type Result<T> = std::result::Result<T, RunnerError>;

/// Exit status and combined output of one sandboxed run. A non-zero exit code
/// is a normal outcome here; only orchestration failures are errors.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exit_code: i64,
    pub log: String,
}

/// Seam for the execution backend, so the engine can be driven by fakes in
/// tests without a Docker daemon.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    async fn run(&self, workspace: &Path, code: &str) -> Result<RunOutcome>;
}

/// Docker-backed runner. Every request gets a fresh container created from a
/// fixed pre-built image with networking disabled and a hard memory cap; the
/// session workspace is bound read-write at the configured mount path.
pub struct DockerRunner {
    client: Docker,
    image: String,
    entry_command: Vec<String>,
    data_mount: String,
    code_dir: String,
    memory_limit_bytes: i64,
    run_timeout: Duration,
}

impl DockerRunner {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Docker::connect_with_defaults()
            .map_err(|e| RunnerError::Connection(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    /// Create with a specific Docker connection.
    pub fn with_client(client: Docker, config: &EngineConfig) -> Self {
        Self {
            client,
            image: config.image.clone(),
            entry_command: config.entry_command.clone(),
            data_mount: config.data_mount.clone(),
            code_dir: config.code_dir.clone(),
            memory_limit_bytes: config.memory_limit_bytes,
            run_timeout: config.run_timeout,
        }
    }

    /// Check whether the Docker daemon is reachable.
    pub async fn is_available(&self) -> bool {
        match self.client.ping().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Docker not available: {}", e);
                false
            }
        }
    }

    /// Pull the configured image if it is not present locally. Intended for
    /// startup; `run` itself reports a missing image as a launch failure.
    pub async fn ensure_image(&self) -> Result<()> {
        if self.image_exists().await? {
            return Ok(());
        }

        info!("Pulling image: {}", self.image);
        let options = CreateImageOptions {
            from_image: self.image.clone(),
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            let update = progress.map_err(|e| {
                RunnerError::Launch(format!("Failed to pull image {}: {}", self.image, e))
            })?;
            if let Some(error) = update.error {
                return Err(RunnerError::Launch(format!(
                    "Failed to pull image {}: {}",
                    self.image, error
                )));
            }
        }

        Ok(())
    }

    async fn image_exists(&self) -> Result<bool> {
        match self.client.inspect_image(&self.image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(RunnerError::Connection(e.to_string())),
        }
    }

    async fn create(&self, workspace: &Path) -> Result<String> {
        let host_config = bollard::models::HostConfig {
            binds: Some(vec![format!(
                "{}:{}:rw",
                workspace.display(),
                self.data_mount
            )]),
            memory: Some(self.memory_limit_bytes),
            // Networking fully disabled; the sole isolation control against
            // exfiltration and external side effects.
            network_mode: Some("none".to_string()),
            ..Default::default()
        };

        let labels = HashMap::from([(MANAGED_LABEL.to_string(), "true".to_string())]);

        let config = Config {
            image: Some(self.image.clone()),
            cmd: Some(self.entry_command.clone()),
            working_dir: Some(self.data_mount.clone()),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: format!("runbox-{}", &Uuid::new_v4().to_string()[..8]),
            platform: None,
        };

        let container = self
            .client
            .create_container(Some(options), config)
            .await
            .map_err(|e| RunnerError::Launch(e.to_string()))?;

        debug!("Created container: {}", container.id);
        Ok(container.id)
    }

    /// Inject code, start, and wait. The container is created but not yet
    /// running when this is called: uploading the entry script first means
    /// the entry command can never start ahead of its own source.
    async fn drive(&self, container_id: &str, code: &str) -> Result<RunOutcome> {
        let archive = injector::package_code(code.as_bytes())
            .map_err(|e| RunnerError::Transfer(e.to_string()))?;

        let options = UploadToContainerOptions {
            path: self.code_dir.clone(),
            ..Default::default()
        };
        self.client
            .upload_to_container(container_id, Some(options), archive.into())
            .await
            .map_err(|e| RunnerError::Transfer(e.to_string()))?;

        self.client
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RunnerError::Launch(e.to_string()))?;

        let exit_code =
            match tokio::time::timeout(self.run_timeout, self.wait_exit(container_id)).await {
                Ok(waited) => waited?,
                Err(_) => {
                    // The wait deadline alone does not stop the process;
                    // kill it so the resource bound holds in wall-clock time.
                    self.kill(container_id).await;
                    return Err(RunnerError::Timeout(self.run_timeout));
                }
            };

        let log = self.collect_logs(container_id).await?;
        Ok(RunOutcome { exit_code, log })
    }

    async fn wait_exit(&self, container_id: &str) -> Result<i64> {
        let mut wait = self
            .client
            .wait_container(container_id, None::<WaitContainerOptions<String>>);

        match wait.next().await {
            Some(Ok(exit)) => Ok(exit.status_code),
            // bollard surfaces non-zero exits as a wait error carrying the code.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(RunnerError::Container(e.to_string())),
            None => Err(RunnerError::Container(
                "wait stream ended without a status".to_string(),
            )),
        }
    }

    async fn collect_logs(&self, container_id: &str) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stream = self.client.logs(container_id, Some(options));
        let mut log = String::new();

        while let Some(entry) = stream.next().await {
            match entry {
                Ok(LogOutput::StdOut { message })
                | Ok(LogOutput::StdErr { message })
                | Ok(LogOutput::Console { message }) => {
                    log.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => return Err(RunnerError::Container(e.to_string())),
            }
        }

        Ok(log)
    }

    async fn kill(&self, container_id: &str) {
        if let Err(e) = self
            .client
            .kill_container(container_id, None::<KillContainerOptions<String>>)
            .await
        {
            warn!("Failed to kill container {}: {}", container_id, e);
        }
    }

    /// Forced removal, run on every exit path. Failures are logged and
    /// suppressed so they never mask the primary outcome.
    async fn remove(&self, container_id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };

        match self.client.remove_container(container_id, Some(options)).await {
            Ok(()) => debug!("Removed container: {}", container_id),
            Err(e) => warn!("Failed to remove container {}: {}", container_id, e),
        }
    }
}

#[async_trait]
impl SandboxRunner for DockerRunner {
    async fn run(&self, workspace: &Path, code: &str) -> Result<RunOutcome> {
        let container_id = self.create(workspace).await?;
        let outcome = self.drive(&container_id, code).await;
        self.remove(&container_id).await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_carries_engine_config() {
        let mut config = EngineConfig::default();
        config.image = "python:3.11-alpine".to_string();
        config.run_timeout = Duration::from_secs(5);

        if let Ok(client) = Docker::connect_with_defaults() {
            let runner = DockerRunner::with_client(client, &config);
            assert_eq!(runner.image, "python:3.11-alpine");
            assert_eq!(runner.run_timeout, Duration::from_secs(5));
            assert_eq!(runner.data_mount, "/app/data");
        }
    }
}
