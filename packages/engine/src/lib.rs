// ABOUTME: Session-scoped sandboxed execution engine with artifact publication
// ABOUTME: Runs caller code in ephemeral network-disabled containers over persistent workspaces

pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod harvest;
pub mod injector;
pub mod runner;
pub mod workspace;

pub use config::EngineConfig;
pub use engine::{DownloadResult, ExecutionResult, SandboxEngine};
pub use error::{EngineError, ErrorKind};
pub use harvest::{Artifact, RESERVED_INPUT_NAME};
pub use runner::{DockerRunner, RunOutcome, RunnerError, SandboxRunner};
pub use workspace::WorkspaceManager;
