//! Mercurial backend driven through the `hg` command line.
//!
//! `hg incoming` exits 0 when the default path has changesets we lack and 1
//! when it has none; any other status is an error.

use crate::error::VcsError;
use crate::factory::VcsBackendType;
use crate::traits::VersionControlSystem;
use crate::types::{ApplyResult, RemoteStatus};
use std::path::Path;
use tracing::debug;
use utils::shell;

const INCOMING_NONE_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone)]
pub struct Mercurial {
    bin_path: String,
}

impl Mercurial {
    pub fn new(bin_path: impl Into<String>) -> Self {
        Self {
            bin_path: bin_path.into(),
        }
    }

    pub fn bin_path(&self) -> &str {
        &self.bin_path
    }
}

impl Default for Mercurial {
    fn default() -> Self {
        Self::new("hg")
    }
}

impl VersionControlSystem for Mercurial {
    fn backend_type(&self) -> VcsBackendType {
        VcsBackendType::Mercurial
    }

    fn has_remote_changes(&self, root: &Path) -> Result<RemoteStatus, VcsError> {
        let root = root.to_string_lossy();
        let result = shell::execute(
            "{binPath} incoming --repository {projectRoot}",
            &[("{binPath}", self.bin_path.as_str()), ("{projectRoot}", &*root)],
        );

        debug!(exit_code = result.exit_code, "hg incoming finished");
        match result.exit_code {
            0 => Ok(RemoteStatus {
                has_changes: true,
                log: result.output(),
            }),
            INCOMING_NONE_EXIT_CODE => Ok(RemoteStatus {
                has_changes: false,
                log: result.output(),
            }),
            _ => Err(VcsError::command_failed(&result)),
        }
    }

    fn apply_remote_changes(&self, root: &Path) -> Result<ApplyResult, VcsError> {
        let root = root.to_string_lossy();
        let result = shell::execute(
            "(cd {projectRoot}; {binPath} pull -u)",
            &[("{binPath}", self.bin_path.as_str()), ("{projectRoot}", &*root)],
        );

        Ok(ApplyResult {
            applied: result.is_ok(),
            log: result.output(),
        })
    }

    fn description(&self) -> String {
        format!("Mercurial backend ({})", self.bin_path)
    }
}
