use crate::error::SelfUpdateError;
use crate::log::UpdateLog;
use crate::runner::CheckedShell;
use std::fmt;

pub type HookFn = Box<dyn Fn(&UpdateLog) -> Result<(), String>>;

/// An action run before or after the code update
pub enum Hook {
    /// Shell command run through [`CheckedShell`]
    Command(String),
    /// In-process action; an `Err` fails the run with its message
    Callable(HookFn),
}

impl Hook {
    pub fn command(command: impl Into<String>) -> Self {
        Self::Command(command.into())
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&UpdateLog) -> Result<(), String> + 'static,
    {
        Self::Callable(Box::new(f))
    }

    pub fn validate(&self) -> Result<(), SelfUpdateError> {
        match self {
            Self::Command(command) if command.trim().is_empty() => {
                Err(SelfUpdateError::config("hook command must not be empty"))
            }
            _ => Ok(()),
        }
    }

    pub fn run(&self, shell: &CheckedShell, log: &UpdateLog) -> Result<(), SelfUpdateError> {
        match self {
            Self::Command(command) => shell.run(log, command, &[]).map(|_| ()),
            Self::Callable(f) => f(log).map_err(SelfUpdateError::Hook),
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(command) => f.debug_tuple("Command").field(command).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl From<&str> for Hook {
    fn from(command: &str) -> Self {
        Self::command(command)
    }
}

impl From<String> for Hook {
    fn from(command: String) -> Self {
        Self::Command(command)
    }
}
