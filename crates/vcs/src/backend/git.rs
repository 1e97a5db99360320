//! Git backend driven through the `git` command line.
//!
//! Remote changes are detected by fetching the configured remote and diffing
//! `HEAD` against `<remote>/<current branch>`; any numstat output means the
//! working copy is behind. Changes are applied with a merge.

use crate::error::VcsError;
use crate::factory::VcsBackendType;
use crate::traits::VersionControlSystem;
use crate::types::{ApplyResult, RemoteStatus};
use std::path::Path;
use tracing::debug;
use utils::shell;

/// Git implementation of the VCS backend
#[derive(Debug, Clone)]
pub struct Git {
    bin_path: String,
    remote_name: String,
}

impl Git {
    pub fn new(bin_path: impl Into<String>, remote_name: impl Into<String>) -> Self {
        Self {
            bin_path: bin_path.into(),
            remote_name: remote_name.into(),
        }
    }

    pub fn bin_path(&self) -> &str {
        &self.bin_path
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// Name of the branch checked out at `root`
    pub fn current_branch(&self, root: &Path) -> Result<String, VcsError> {
        let root = root.to_string_lossy();
        let result = shell::execute(
            "(cd {projectRoot}; {binPath} branch)",
            &[("{projectRoot}", &*root), ("{binPath}", self.bin_path.as_str())],
        );
        if !result.is_ok() {
            return Err(VcsError::BranchNotDetected(result.trace()));
        }
        parse_current_branch(&result.output_lines)
            .ok_or_else(|| VcsError::BranchNotDetected(result.trace()))
    }
}

impl Default for Git {
    fn default() -> Self {
        Self::new("git", "origin")
    }
}

/// Pick the `* name` line from `git branch` output. Detached heads yield `None`.
fn parse_current_branch(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("* "))
        .map(str::trim)
        .find(|name| !name.is_empty() && !name.starts_with('('))
        .map(String::from)
}

impl VersionControlSystem for Git {
    fn backend_type(&self) -> VcsBackendType {
        VcsBackendType::Git
    }

    fn has_remote_changes(&self, root: &Path) -> Result<RemoteStatus, VcsError> {
        let branch = self.current_branch(root)?;
        let root = root.to_string_lossy();
        let placeholders = [
            ("{binPath}", self.bin_path.as_str()),
            ("{projectRoot}", &*root),
            ("{remote}", self.remote_name.as_str()),
            ("{branch}", branch.as_str()),
        ];

        let fetch = shell::execute("(cd {projectRoot}; {binPath} fetch {remote})", &placeholders);
        if !fetch.is_ok() {
            return Err(VcsError::command_failed(&fetch));
        }

        // the remote-tracking ref is one word, so the quoted halves are adjacent
        let diff = shell::execute(
            "(cd {projectRoot}; {binPath} diff --numstat HEAD {remote}/{branch})",
            &placeholders,
        );
        if !diff.is_ok() {
            return Err(VcsError::command_failed(&diff));
        }

        let has_changes = !diff.is_output_empty();
        debug!(%branch, remote = %self.remote_name, has_changes, "git remote check");
        Ok(RemoteStatus {
            has_changes,
            log: format!("{}\n{}", fetch.trace(), diff.trace()),
        })
    }

    fn apply_remote_changes(&self, root: &Path) -> Result<ApplyResult, VcsError> {
        let branch = self.current_branch(root)?;
        let root = root.to_string_lossy();
        let result = shell::execute(
            "(cd {projectRoot}; {binPath} merge {remote}/{branch})",
            &[
                ("{binPath}", self.bin_path.as_str()),
                ("{projectRoot}", &*root),
                ("{remote}", self.remote_name.as_str()),
                ("{branch}", branch.as_str()),
            ],
        );

        Ok(ApplyResult {
            applied: result.is_ok(),
            log: result.trace(),
        })
    }

    fn description(&self) -> String {
        format!("Git backend ({}, remote '{}')", self.bin_path, self.remote_name)
    }
}
