use crate::error::VcsError;
use crate::factory::VcsBackendType;
use crate::types::{ApplyResult, RemoteStatus};
use std::path::Path;

/// The capability a backend must offer to drive a self-update.
///
/// Each backend keeps its own notion of "changes present"; callers must not
/// assume Git and Mercurial agree on what triggers an update.
pub trait VersionControlSystem: Send {
    /// Get backend type
    fn backend_type(&self) -> VcsBackendType;

    /// Check whether the remote holds changes missing from the working copy at `root`
    fn has_remote_changes(&self, root: &Path) -> Result<RemoteStatus, VcsError>;

    /// Pull remote changes into the working copy at `root`
    ///
    /// A command that runs but fails yields `applied == false` rather than an error.
    fn apply_remote_changes(&self, root: &Path) -> Result<ApplyResult, VcsError>;

    /// Get a human-readable description of this backend
    fn description(&self) -> String {
        format!("{:?} backend", self.backend_type())
    }
}
