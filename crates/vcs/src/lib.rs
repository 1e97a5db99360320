//! VCS Abstraction Layer
//!
//! This crate answers the two questions a self-update needs from version
//! control: "is the remote ahead of us" and "pull it in". Git and Mercurial
//! backends drive their command-line tools through [`utils::shell`].
//!
//! # Example
//!
//! ```no_run
//! use vcs::{VcsFactory, VcsMarker};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = Path::new("/path/to/project");
//! let vcs = VcsFactory::auto_detect(root, &VcsMarker::defaults())?;
//! let status = vcs.has_remote_changes(root)?;
//! if status.has_changes {
//!     vcs.apply_remote_changes(root)?;
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod factory;
mod traits;
mod types;

pub use backend::git::Git;
pub use backend::mercurial::Mercurial;
pub use error::VcsError;
pub use factory::{VcsBackendType, VcsConfig, VcsFactory, VcsMarker, VcsRegistry};
pub use traits::VersionControlSystem;
pub use types::{ApplyResult, RemoteStatus};
