use crate::backend::{git::Git, mercurial::Mercurial};
use crate::error::VcsError;
use crate::traits::VersionControlSystem;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Type of VCS backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsBackendType {
    Git,
    Mercurial,
}

/// Configuration for a VCS backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VcsConfig {
    Git {
        #[serde(default = "default_git_bin")]
        bin_path: String,
        #[serde(default = "default_remote_name")]
        remote_name: String,
    },
    Mercurial {
        #[serde(default = "default_hg_bin")]
        bin_path: String,
    },
}

impl VcsConfig {
    pub fn git() -> Self {
        Self::Git {
            bin_path: default_git_bin(),
            remote_name: default_remote_name(),
        }
    }

    pub fn mercurial() -> Self {
        Self::Mercurial {
            bin_path: default_hg_bin(),
        }
    }

    pub fn backend_type(&self) -> VcsBackendType {
        match self {
            Self::Git { .. } => VcsBackendType::Git,
            Self::Mercurial { .. } => VcsBackendType::Mercurial,
        }
    }
}

fn default_git_bin() -> String {
    "git".to_string()
}

fn default_hg_bin() -> String {
    "hg".to_string()
}

fn default_remote_name() -> String {
    "origin".to_string()
}

/// Marker directory paired with the backend that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsMarker {
    /// Directory name looked up under the project root, e.g. `.git`
    pub marker: String,
    #[serde(flatten)]
    pub config: VcsConfig,
}

impl VcsMarker {
    pub fn new(marker: impl Into<String>, config: VcsConfig) -> Self {
        Self {
            marker: marker.into(),
            config,
        }
    }

    /// `.git` → Git, then `.hg` → Mercurial
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(".git", VcsConfig::git()),
            Self::new(".hg", VcsConfig::mercurial()),
        ]
    }
}

/// Factory for creating VCS backends
pub struct VcsFactory;

impl VcsFactory {
    /// Create a backend based on configuration
    pub fn create(config: &VcsConfig) -> Box<dyn VersionControlSystem> {
        match config {
            VcsConfig::Git {
                bin_path,
                remote_name,
            } => Box::new(Git::new(bin_path.clone(), remote_name.clone())),
            VcsConfig::Mercurial { bin_path } => Box::new(Mercurial::new(bin_path.clone())),
        }
    }

    /// Detect which marker is present under `path`; the first match in `markers` wins
    pub fn detect<'a>(path: &Path, markers: &'a [VcsMarker]) -> Result<&'a VcsMarker, VcsError> {
        markers
            .iter()
            .find(|m| path.join(&m.marker).is_dir())
            .ok_or_else(|| VcsError::repo_not_found(path))
    }

    /// Create a backend by auto-detecting the type
    pub fn auto_detect(
        path: &Path,
        markers: &[VcsMarker],
    ) -> Result<Box<dyn VersionControlSystem>, VcsError> {
        let marker = Self::detect(path, markers)?;
        Ok(Self::create(&marker.config))
    }
}

/// Priority-ordered backends keyed by marker directory.
///
/// Unlike [`VcsFactory::auto_detect`] this holds constructed backends, so
/// callers can register their own [`VersionControlSystem`] implementations.
#[derive(Default)]
pub struct VcsRegistry {
    entries: Vec<(String, Box<dyn VersionControlSystem>)>,
}

impl VcsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_markers(markers: &[VcsMarker]) -> Self {
        let mut registry = Self::new();
        for m in markers {
            registry.register(m.marker.clone(), VcsFactory::create(&m.config));
        }
        registry
    }

    /// Append a backend; earlier registrations take priority
    pub fn register(&mut self, marker: impl Into<String>, backend: Box<dyn VersionControlSystem>) {
        self.entries.push((marker.into(), backend));
    }

    pub fn markers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(marker, _)| marker.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn detect(&self, path: &Path) -> Result<&dyn VersionControlSystem, VcsError> {
        self.entries
            .iter()
            .find(|(marker, _)| path.join(marker).is_dir())
            .map(|(_, backend)| backend.as_ref())
            .ok_or_else(|| VcsError::repo_not_found(path))
    }
}

impl std::fmt::Debug for VcsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.markers()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_first_match_wins() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        std::fs::create_dir(temp.path().join(".hg")).unwrap();

        let markers = VcsMarker::defaults();
        let found = VcsFactory::detect(temp.path(), &markers).unwrap();
        assert_eq!(found.config.backend_type(), VcsBackendType::Git);

        let reversed: Vec<_> = markers.into_iter().rev().collect();
        let found = VcsFactory::detect(temp.path(), &reversed).unwrap();
        assert_eq!(found.config.backend_type(), VcsBackendType::Mercurial);
    }

    #[test]
    fn test_detect_requires_directory() {
        let temp = TempDir::new().unwrap();
        // a `.git` file (worktree pointer) is not a marker directory
        std::fs::write(temp.path().join(".git"), "gitdir: elsewhere").unwrap();

        let err = VcsFactory::detect(temp.path(), &VcsMarker::defaults()).unwrap_err();
        assert!(matches!(err, VcsError::RepositoryNotFound(_)));
    }

    #[test]
    fn test_registry_detect() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".hg")).unwrap();

        let registry = VcsRegistry::from_markers(&VcsMarker::defaults());
        assert_eq!(registry.markers().collect::<Vec<_>>(), vec![".git", ".hg"]);
        let backend = registry.detect(temp.path()).unwrap();
        assert_eq!(backend.backend_type(), VcsBackendType::Mercurial);

        let empty = VcsRegistry::new();
        assert!(empty.detect(temp.path()).is_err());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        #[derive(Deserialize)]
        struct Wrapper {
            version_control_systems: Vec<VcsMarker>,
        }

        let parsed: Wrapper = serde_json::from_str(
            r#"{"version_control_systems": [
                {"marker": ".git", "type": "git", "remote_name": "upstream"},
                {"marker": ".hg", "type": "mercurial", "bin_path": "/usr/bin/hg"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.version_control_systems,
            vec![
                VcsMarker::new(
                    ".git",
                    VcsConfig::Git {
                        bin_path: "git".into(),
                        remote_name: "upstream".into(),
                    }
                ),
                VcsMarker::new(
                    ".hg",
                    VcsConfig::Mercurial {
                        bin_path: "/usr/bin/hg".into(),
                    }
                ),
            ]
        );
    }
}
