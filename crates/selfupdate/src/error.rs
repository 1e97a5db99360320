use thiserror::Error;
use vcs::VcsError;

/// Errors raised while performing a self-update
#[derive(Debug, Error)]
pub enum SelfUpdateError {
    #[error("Execution terminated: command is already running ({0})")]
    LockContention(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("{0}")]
    CommandExecution(String),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("Unable to flush cache '{name}': {message}")]
    Cache { name: String, message: String },

    #[error("Hook failed: {0}")]
    Hook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SelfUpdateError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Errors from a mail transport
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid mailer command: {0:?}")]
    InvalidCommand(String),

    #[error("Mailer command '{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Mailer IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Transport(String),
}
