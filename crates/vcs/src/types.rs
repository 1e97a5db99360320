/// Answer to "does the remote hold changes we don't have"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStatus {
    pub has_changes: bool,
    /// Output of the commands used to decide, for the run log
    pub log: String,
}

/// Result of pulling remote changes into the working copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    pub applied: bool,
    pub log: String,
}
