// ABOUTME: Engine-level error taxonomy for execute and download requests
// ABOUTME: Every surfaced error carries the resolved session id for retry against it

use crate::runner::RunnerError;
use thiserror::Error;

/// Failure classes the engine can surface to callers. A non-zero exit code
/// from the sandboxed program is result data, not an error.
#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("Failed to launch execution environment: {0}")]
    Launch(String),

    #[error("Failed to transfer code into execution environment: {0}")]
    CodeTransfer(String),

    #[error("Execution timed out after {0} seconds")]
    Timeout(u64),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Workspace IO error: {0}")]
    WorkspaceIo(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    Store(#[from] runbox_store::StoreError),
}

impl From<RunnerError> for ErrorKind {
    fn from(error: RunnerError) -> Self {
        match error {
            RunnerError::Timeout(elapsed) => ErrorKind::Timeout(elapsed.as_secs()),
            RunnerError::Transfer(msg) => ErrorKind::CodeTransfer(msg),
            RunnerError::Connection(msg)
            | RunnerError::Launch(msg)
            | RunnerError::Container(msg) => ErrorKind::Launch(msg),
        }
    }
}

/// An engine failure tied to the session it occurred in, so the caller can
/// retry against the same workspace. Display always names the session once
/// one has been resolved.
#[derive(Debug)]
pub struct EngineError {
    pub session_id: Option<String>,
    pub kind: ErrorKind,
}

impl EngineError {
    pub fn new(session_id: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            session_id: Some(session_id.into()),
            kind,
        }
    }

    pub fn unresolved(kind: ErrorKind) -> Self {
        Self {
            session_id: None,
            kind,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.session_id {
            Some(id) => write!(f, "[session {}] {}", id, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
