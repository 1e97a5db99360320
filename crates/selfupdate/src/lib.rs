//! Pull-based self-update for deployed projects.
//!
//! A scheduled `selfupdate perform` checks the project's VCS remote and,
//! when it is ahead, takes the site offline behind a stub, applies the
//! changes, reinstalls dependencies, flushes caches and mails a report.
//!
//! ```no_run
//! use selfupdate::{FileLockProvider, Reporter, UpdateOrchestrator};
//! use vcs::{VcsMarker, VcsRegistry};
//!
//! let report = UpdateOrchestrator::new(
//!     "/srv/app",
//!     Box::new(FileLockProvider::new("/var/lock/selfupdate")),
//!     VcsRegistry::from_markers(&VcsMarker::defaults()),
//!     Reporter::new(vec!["ops@example.com".to_string()]),
//! )
//! .after_update("php bin/console cache:warmup")
//! .perform()?;
//! assert!(report.outcome.is_success());
//! # Ok::<(), selfupdate::SelfUpdateError>(())
//! ```

pub mod cache;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod hooks;
pub mod log;
pub mod mutex;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod web_paths;

pub use cache::{CacheConfig, CacheFlusher, CommandCache, DirectoryCache};
pub use config::SelfUpdateConfig;
pub use error::{MailError, SelfUpdateError};
pub use hooks::Hook;
pub use log::UpdateLog;
pub use mutex::{FileLockProvider, LockProvider};
pub use orchestrator::{DependencyInstaller, RunOutcome, RunReport, UpdateOrchestrator};
pub use report::{Mailer, ReportMessage, Reporter, SendmailMailer};
pub use runner::CheckedShell;
pub use web_paths::WebPath;
