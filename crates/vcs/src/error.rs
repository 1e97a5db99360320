use std::path::Path;
use thiserror::Error;

/// Errors that can occur during VCS operations
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("No version control system detected at: {0}")]
    RepositoryNotFound(String),

    #[error("Unable to detect current branch:\n{0}")]
    BranchNotDetected(String),

    #[error("Unable to determine remote changes:\n{0}")]
    CommandFailed(String),

    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),
}

impl VcsError {
    /// Create a RepositoryNotFound error from a path
    pub fn repo_not_found(path: &Path) -> Self {
        Self::RepositoryNotFound(path.display().to_string())
    }

    /// Create a CommandFailed error carrying the full command trace
    pub fn command_failed(result: &utils::shell::CommandResult) -> Self {
        Self::CommandFailed(result.trace())
    }
}
