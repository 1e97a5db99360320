//! Caches flushed after new code is in place.

use crate::cleanup::clear_directory;
use crate::error::SelfUpdateError;
use crate::log::UpdateLog;
use crate::runner::CheckedShell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub trait CacheFlusher {
    fn name(&self) -> &str;

    fn flush(&self, shell: &CheckedShell, log: &UpdateLog) -> Result<(), SelfUpdateError>;
}

/// A cache flushed by a shell command, e.g. `redis-cli -n 2 FLUSHDB`
#[derive(Debug, Clone)]
pub struct CommandCache {
    name: String,
    command: String,
}

impl CommandCache {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }
}

impl CacheFlusher for CommandCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn flush(&self, shell: &CheckedShell, log: &UpdateLog) -> Result<(), SelfUpdateError> {
        shell
            .run(log, &self.command, &[])
            .map(|_| ())
            .map_err(|err| SelfUpdateError::Cache {
                name: self.name.clone(),
                message: err.to_string(),
            })
    }
}

/// A file cache whose directory contents are removed
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    name: String,
    directory: PathBuf,
}

impl DirectoryCache {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
        }
    }
}

impl CacheFlusher for DirectoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn flush(&self, _shell: &CheckedShell, _log: &UpdateLog) -> Result<(), SelfUpdateError> {
        if !self.directory.is_dir() {
            return Ok(());
        }
        clear_directory(&self.directory).map_err(|err| SelfUpdateError::Cache {
            name: self.name.clone(),
            message: format!("{}: {err}", self.directory.display()),
        })
    }
}

/// Cache entry as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheConfig {
    Command { name: String, command: String },
    Directory { name: String, directory: String },
}
