//! The self-update run.
//!
//! A run takes a host-local lock, asks the project's VCS whether the remote
//! is ahead and, if so, serves the stub while it pulls, installs
//! dependencies, flushes caches, clears temp directories and runs hooks.
//! The first failing step ends the run. Web paths are not switched back to
//! live on failure, so half-updated code is never served.

use crate::cache::CacheFlusher;
use crate::cleanup::clear_directory;
use crate::error::SelfUpdateError;
use crate::hooks::Hook;
use crate::log::UpdateLog;
use crate::mutex::LockProvider;
use crate::report::{Reporter, FAILURE_PREFIX, SUCCESS_PREFIX};
use crate::runner::CheckedShell;
use crate::web_paths::WebPath;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use utils::shell::{build_option_string, ShellOption};
use vcs::{VcsRegistry, VersionControlSystem};

/// Lock name for the `perform` action
pub const PERFORM_LOCK_NAME: &str = "selfupdate::perform";

/// Flag always passed to the dependency installer
pub const NON_INTERACTIVE_OPTION: &str = "no-interaction";

/// Dependency installer (Composer) invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInstaller {
    pub bin_path: String,
    pub options: Vec<ShellOption>,
    pub root_paths: Vec<PathBuf>,
}

impl DependencyInstaller {
    pub fn default_options() -> Vec<ShellOption> {
        vec![
            ShellOption::flag("prefer-dist"),
            ShellOption::flag("no-dev"),
            ShellOption::flag("optimize-autoloader"),
        ]
    }

    /// Configured options plus the non-interactive flag
    pub fn option_string(&self) -> String {
        let mut options = self.options.clone();
        let forced = ShellOption::flag(NON_INTERACTIVE_OPTION);
        if !options
            .iter()
            .any(|opt| opt.name().trim_start_matches('-') == NON_INTERACTIVE_OPTION)
        {
            options.push(forced);
        }
        build_option_string(&options)
    }
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Remote changes were applied and every step succeeded
    Updated,
    /// The remote had nothing new; no step after the check ran
    UpToDate,
    Failed(SelfUpdateError),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Result of [`UpdateOrchestrator::perform`]
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Every line logged during the run
    pub log_lines: Vec<String>,
}

pub struct UpdateOrchestrator {
    project_root: PathBuf,
    lock: Box<dyn LockProvider>,
    lock_name: String,
    vcs: VcsRegistry,
    web_paths: Vec<WebPath>,
    before_update: Vec<Hook>,
    after_update: Vec<Hook>,
    installer: Option<DependencyInstaller>,
    caches: Vec<Box<dyn CacheFlusher>>,
    tmp_directories: Vec<PathBuf>,
    shell: CheckedShell,
    reporter: Reporter,
    log: UpdateLog,
}

impl UpdateOrchestrator {
    pub fn new(
        project_root: impl Into<PathBuf>,
        lock: Box<dyn LockProvider>,
        vcs: VcsRegistry,
        reporter: Reporter,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            lock,
            lock_name: PERFORM_LOCK_NAME.to_string(),
            vcs,
            web_paths: Vec::new(),
            before_update: Vec::new(),
            after_update: Vec::new(),
            installer: None,
            caches: Vec::new(),
            tmp_directories: Vec::new(),
            shell: CheckedShell::default(),
            reporter,
            log: UpdateLog::new(false),
        }
    }

    pub fn with_lock_name(mut self, name: impl Into<String>) -> Self {
        self.lock_name = name.into();
        self
    }

    pub fn with_web_paths(mut self, web_paths: Vec<WebPath>) -> Self {
        self.web_paths = web_paths;
        self
    }

    pub fn before_update(mut self, hook: impl Into<Hook>) -> Self {
        self.before_update.push(hook.into());
        self
    }

    pub fn after_update(mut self, hook: impl Into<Hook>) -> Self {
        self.after_update.push(hook.into());
        self
    }

    pub fn with_installer(mut self, installer: DependencyInstaller) -> Self {
        self.installer = Some(installer);
        self
    }

    pub fn with_cache(mut self, cache: Box<dyn CacheFlusher>) -> Self {
        self.caches.push(cache);
        self
    }

    pub fn with_tmp_directories(mut self, dirs: Vec<PathBuf>) -> Self {
        self.tmp_directories = dirs;
        self
    }

    pub fn with_error_keywords(mut self, keywords: Vec<String>) -> Self {
        self.shell = CheckedShell::new(keywords);
        self
    }

    /// Echo log lines to stdout as they are recorded
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.log = UpdateLog::new(echo);
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn lock_name(&self) -> &str {
        &self.lock_name
    }

    /// Run the update under the lock.
    ///
    /// Only lock problems are returned as `Err`; everything that happens
    /// while the lock is held ends up in [`RunReport::outcome`].
    pub fn perform(&self) -> Result<RunReport, SelfUpdateError> {
        if !self.lock.acquire(&self.lock_name)? {
            warn!(lock = %self.lock_name, "self-update already running");
            return Err(SelfUpdateError::LockContention(self.lock_name.clone()));
        }
        info!(lock = %self.lock_name, root = %self.project_root.display(), "self-update started");

        let outcome = match self.run() {
            Ok(RunOutcome::UpToDate) => RunOutcome::UpToDate,
            Ok(_) => {
                self.log.log("Update completed successfully.");
                RunOutcome::Updated
            }
            Err(err) => {
                error!(error = %err, "self-update failed");
                self.log.log(err.to_string());
                RunOutcome::Failed(err)
            }
        };

        let log_lines = self.log.flush();
        match outcome {
            RunOutcome::Updated => {
                self.reporter.report(SUCCESS_PREFIX, &log_lines);
            }
            RunOutcome::Failed(_) => {
                self.reporter.report(FAILURE_PREFIX, &log_lines);
            }
            RunOutcome::UpToDate => {}
        }

        if let Err(err) = self.lock.release(&self.lock_name) {
            warn!(error = %err, lock = %self.lock_name, "unable to release lock");
        }
        info!(success = outcome.is_success(), "self-update finished");

        Ok(RunReport { outcome, log_lines })
    }

    fn run(&self) -> Result<RunOutcome, SelfUpdateError> {
        self.validate()?;
        let vcs = self.detect_vcs()?;
        let root = self.project_root.as_path();

        let status = vcs.has_remote_changes(root)?;
        if !status.has_changes {
            self.log.log("No changes detected. Project is already up-to-date.");
            return Ok(RunOutcome::UpToDate);
        }
        self.log.log(format!("Remote changes detected:\n{}", status.log));

        self.link_web_stubs()?;
        self.execute_hooks(&self.before_update)?;

        let applied = vcs.apply_remote_changes(root)?;
        if !applied.applied {
            return Err(SelfUpdateError::CommandExecution(format!(
                "Unable to apply remote changes:\n{}",
                applied.log
            )));
        }
        self.log.log(applied.log);
        self.log.log("Remote changes applied.");

        self.update_dependencies()?;
        self.flush_caches()?;
        self.clear_tmp_directories()?;
        self.execute_hooks(&self.after_update)?;
        self.link_web_paths()?;

        Ok(RunOutcome::Updated)
    }

    fn validate(&self) -> Result<(), SelfUpdateError> {
        for web_path in &self.web_paths {
            web_path.validate()?;
        }
        for hook in self.before_update.iter().chain(&self.after_update) {
            hook.validate()?;
        }
        if !self.project_root.is_dir() {
            return Err(SelfUpdateError::config(format!(
                "project root '{}' is not a directory.",
                self.project_root.display()
            )));
        }
        Ok(())
    }

    fn detect_vcs(&self) -> Result<&dyn VersionControlSystem, SelfUpdateError> {
        let vcs = self.vcs.detect(&self.project_root).map_err(|err| {
            SelfUpdateError::config(format!(
                "{err} (looked for: {})",
                self.vcs.markers().collect::<Vec<_>>().join(", ")
            ))
        })?;
        info!(backend = %vcs.description(), "version control system detected");
        Ok(vcs)
    }

    fn link_web_stubs(&self) -> Result<(), SelfUpdateError> {
        if self.web_paths.is_empty() {
            return Ok(());
        }
        for web_path in &self.web_paths {
            web_path.link_stub()?;
        }
        self.log.log("Web paths linked to stubs.");
        Ok(())
    }

    fn link_web_paths(&self) -> Result<(), SelfUpdateError> {
        if self.web_paths.is_empty() {
            return Ok(());
        }
        for web_path in &self.web_paths {
            web_path.link_live()?;
        }
        self.log.log("Web paths linked to live directories.");
        Ok(())
    }

    fn execute_hooks(&self, hooks: &[Hook]) -> Result<(), SelfUpdateError> {
        for hook in hooks {
            hook.run(&self.shell, &self.log)?;
        }
        Ok(())
    }

    fn update_dependencies(&self) -> Result<(), SelfUpdateError> {
        let Some(installer) = &self.installer else {
            return Ok(());
        };
        let template = format!(
            "(cd {{composerRoot}}; {{composer}} install {})",
            installer.option_string()
        );
        for root in &installer.root_paths {
            let root = root.to_string_lossy();
            self.shell.run(
                &self.log,
                &template,
                &[
                    ("{composerRoot}", &*root),
                    ("{composer}", installer.bin_path.as_str()),
                ],
            )?;
        }
        Ok(())
    }

    fn flush_caches(&self) -> Result<(), SelfUpdateError> {
        for cache in &self.caches {
            cache.flush(&self.shell, &self.log)?;
            self.log.log(format!("Cache '{}' flushed.", cache.name()));
        }
        Ok(())
    }

    fn clear_tmp_directories(&self) -> Result<(), SelfUpdateError> {
        for dir in &self.tmp_directories {
            if !dir.is_dir() {
                self.log.log(format!("Directory '{}' does not exist, skipped.", dir.display()));
                continue;
            }
            clear_directory(dir)?;
            self.log.log(format!("Directory '{}' cleared.", dir.display()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for UpdateOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOrchestrator")
            .field("project_root", &self.project_root)
            .field("lock_name", &self.lock_name)
            .field("vcs", &self.vcs)
            .field("web_paths", &self.web_paths)
            .field("before_update", &self.before_update)
            .field("after_update", &self.after_update)
            .field("installer", &self.installer)
            .field("caches", &self.caches.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("tmp_directories", &self.tmp_directories)
            .field("reporter", &self.reporter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installer_forces_non_interactive() {
        let installer = DependencyInstaller {
            bin_path: "composer".into(),
            options: DependencyInstaller::default_options(),
            root_paths: vec![],
        };
        assert_eq!(
            installer.option_string(),
            "--prefer-dist --no-dev --optimize-autoloader --no-interaction"
        );
    }

    #[test]
    fn test_installer_does_not_duplicate_non_interactive() {
        let installer = DependencyInstaller {
            bin_path: "composer".into(),
            options: vec!["--no-interaction".into(), ShellOption::value("working-dir", "/srv/app")],
            root_paths: vec![],
        };
        assert_eq!(
            installer.option_string(),
            "--no-interaction --working-dir='/srv/app'"
        );
    }

    #[test]
    fn test_outcome_success() {
        assert!(RunOutcome::Updated.is_success());
        assert!(RunOutcome::UpToDate.is_success());
        assert!(!RunOutcome::Failed(SelfUpdateError::config("x")).is_success());
    }
}
