//! TOML configuration for the `selfupdate` binary.

use crate::cache::{CacheConfig, CacheFlusher, CommandCache, DirectoryCache};
use crate::error::SelfUpdateError;
use crate::mutex::FileLockProvider;
use crate::orchestrator::{DependencyInstaller, UpdateOrchestrator};
use crate::report::{Reporter, SendmailMailer, DEFAULT_SENDMAIL_COMMAND};
use crate::runner::default_error_keywords;
use crate::web_paths::WebPath;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utils::shell::ShellOption;
use vcs::{VcsMarker, VcsRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelfUpdateConfig {
    /// Report recipients; no mail is sent when empty
    pub emails: Vec<String>,
    /// Preferred transport, e.g. `msmtp -t`
    pub mailer_command: Option<String>,
    /// Fallback transport
    pub sendmail_command: String,
    pub lock_dir: String,
    pub project_root_path: String,
    pub web_paths: Vec<WebPath>,
    pub cache: Vec<CacheConfig>,
    pub tmp_directories: Vec<String>,
    pub before_update_commands: Vec<String>,
    pub after_update_commands: Vec<String>,
    pub shell_response_error_keywords: Vec<String>,
    pub version_control_systems: Vec<VcsMarker>,
    pub composer_bin_path: String,
    pub composer_options: Vec<ShellOption>,
    /// `None` means the project root; an empty list skips the installer
    pub composer_root_paths: Option<Vec<String>>,
}

impl Default for SelfUpdateConfig {
    fn default() -> Self {
        Self {
            emails: Vec::new(),
            mailer_command: None,
            sendmail_command: DEFAULT_SENDMAIL_COMMAND.to_string(),
            lock_dir: default_lock_dir(),
            project_root_path: ".".to_string(),
            web_paths: Vec::new(),
            cache: Vec::new(),
            tmp_directories: Vec::new(),
            before_update_commands: Vec::new(),
            after_update_commands: Vec::new(),
            shell_response_error_keywords: default_error_keywords(),
            version_control_systems: VcsMarker::defaults(),
            composer_bin_path: "composer".to_string(),
            composer_options: DependencyInstaller::default_options(),
            composer_root_paths: None,
        }
    }
}

fn default_lock_dir() -> String {
    std::env::temp_dir()
        .join("selfupdate")
        .to_string_lossy()
        .into_owned()
}

impl SelfUpdateConfig {
    /// Read and parse a config file, expanding `~` and `$VAR` in paths
    pub fn load(path: &Path) -> Result<Self, SelfUpdateError> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            SelfUpdateError::config(format!("unable to read '{}': {err}", path.display()))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|err| SelfUpdateError::config(format!("{}: {err}", path.display())))?;
        config.expanded()
    }

    pub fn parse(content: &str) -> Result<Self, SelfUpdateError> {
        let config: Self =
            toml::from_str(content).map_err(|err| SelfUpdateError::config(err.to_string()))?;
        config.expanded()
    }

    fn expanded(mut self) -> Result<Self, SelfUpdateError> {
        self.lock_dir = expand(&self.lock_dir)?;
        self.project_root_path = expand(&self.project_root_path)?;
        for web_path in &mut self.web_paths {
            web_path.path = expand_path(&web_path.path)?;
            web_path.link = expand_path(&web_path.link)?;
            web_path.stub = expand_path(&web_path.stub)?;
        }
        for cache in &mut self.cache {
            if let CacheConfig::Directory { directory, .. } = cache {
                *directory = expand(directory)?;
            }
        }
        for dir in &mut self.tmp_directories {
            *dir = expand(dir)?;
        }
        if let Some(roots) = &mut self.composer_root_paths {
            for root in roots.iter_mut() {
                *root = expand(root)?;
            }
        }
        Ok(self)
    }

    pub fn composer_roots(&self) -> Vec<PathBuf> {
        match &self.composer_root_paths {
            Some(roots) => roots.iter().map(PathBuf::from).collect(),
            None => vec![PathBuf::from(&self.project_root_path)],
        }
    }

    pub fn reporter(&self) -> Reporter {
        let reporter = Reporter::new(self.emails.iter().cloned())
            .with_fallback(Box::new(SendmailMailer::new(self.sendmail_command.clone())));
        match &self.mailer_command {
            Some(command) if !command.trim().is_empty() => {
                reporter.with_mailer(Box::new(SendmailMailer::new(command.clone())))
            }
            _ => reporter,
        }
    }

    pub fn into_orchestrator(self) -> UpdateOrchestrator {
        let reporter = self.reporter();
        let installer = DependencyInstaller {
            bin_path: self.composer_bin_path.clone(),
            options: self.composer_options.clone(),
            root_paths: self.composer_roots(),
        };

        let mut orchestrator = UpdateOrchestrator::new(
            &self.project_root_path,
            Box::new(FileLockProvider::new(&self.lock_dir)),
            VcsRegistry::from_markers(&self.version_control_systems),
            reporter,
        )
        .with_web_paths(self.web_paths)
        .with_tmp_directories(self.tmp_directories.into_iter().map(PathBuf::from).collect())
        .with_error_keywords(self.shell_response_error_keywords)
        .with_installer(installer);

        for cache in self.cache {
            let flusher: Box<dyn CacheFlusher> = match cache {
                CacheConfig::Command { name, command } => Box::new(CommandCache::new(name, command)),
                CacheConfig::Directory { name, directory } => {
                    Box::new(DirectoryCache::new(name, directory))
                }
            };
            orchestrator = orchestrator.with_cache(flusher);
        }
        for command in self.before_update_commands {
            orchestrator = orchestrator.before_update(command);
        }
        for command in self.after_update_commands {
            orchestrator = orchestrator.after_update(command);
        }
        orchestrator
    }
}

fn expand(value: &str) -> Result<String, SelfUpdateError> {
    shellexpand::full(value)
        .map(|expanded| expanded.into_owned())
        .map_err(|err| SelfUpdateError::config(format!("unable to expand '{value}': {err}")))
}

fn expand_path(path: &Path) -> Result<PathBuf, SelfUpdateError> {
    expand(&path.to_string_lossy()).map(PathBuf::from)
}

/// Commented template written by `selfupdate config`
pub fn config_template() -> &'static str {
    r#"# selfupdate configuration
# Every key is optional. Paths may use ~ and $VARIABLES.

# Who receives run reports. No mail is sent when empty.
emails = []
# Preferred mail transport; sendmail_command is used when it fails.
# mailer_command = "msmtp -t"
sendmail_command = "sendmail -t -i"

# Directory for the lock file that keeps runs from overlapping
# lock_dir = "/var/lock/selfupdate"

# Working copy that is updated
project_root_path = "."

# Served symlinks switched to a stub while updating
# [[web_paths]]
# path = "/srv/app/public"
# link = "/srv/www/app"
# stub = "/srv/app/maintenance"

# Caches flushed after the update, by command or by directory
# [[cache]]
# name = "redis"
# command = "redis-cli -n 2 FLUSHDB"
#
# [[cache]]
# name = "twig"
# directory = "/srv/app/var/cache/twig"

# Directories emptied after the update (.gitignore, .gitkeep, .hgignore and .hgkeep are kept)
tmp_directories = []

before_update_commands = []
after_update_commands = []

# Command output containing any of these (case-insensitive) fails the step
shell_response_error_keywords = ["error", "exception", "ошибка"]

# Dependency installer
composer_bin_path = "composer"
composer_options = ["prefer-dist", "no-dev", "optimize-autoloader"]
# Defaults to project_root_path; set to [] to skip the install step
# composer_root_paths = ["/srv/app"]

[[version_control_systems]]
marker = ".git"
type = "git"
bin_path = "git"
remote_name = "origin"

[[version_control_systems]]
marker = ".hg"
type = "mercurial"
bin_path = "hg"

"#
}

/// Write the template to `path`, replacing any existing file
pub fn write_template(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config_template())
}
