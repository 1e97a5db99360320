//! Web root symlinks that are pointed at a maintenance stub during updates.

use crate::error::SelfUpdateError;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// A served path (`link`) that is a symlink to either the live web root or a stub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPath {
    /// Live web root
    pub path: PathBuf,
    /// Symlink the web server serves
    pub link: PathBuf,
    /// Maintenance stub served while updating
    pub stub: PathBuf,
}

impl WebPath {
    pub fn new(path: impl Into<PathBuf>, link: impl Into<PathBuf>, stub: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            link: link.into(),
            stub: stub.into(),
        }
    }

    /// Check that both targets are directories and `link` currently points at one of them
    pub fn validate(&self) -> Result<(), SelfUpdateError> {
        if !self.path.is_dir() {
            return Err(SelfUpdateError::config(format!(
                "'{}' is not a directory.",
                self.path.display()
            )));
        }
        if !self.stub.is_dir() {
            return Err(SelfUpdateError::config(format!(
                "'{}' is not a directory.",
                self.stub.display()
            )));
        }
        if !is_symlink(&self.link) {
            return Err(SelfUpdateError::config(format!(
                "'{}' is not a symbolic link.",
                self.link.display()
            )));
        }
        let target = fs::read_link(&self.link)?;
        if target != self.path && target != self.stub {
            return Err(SelfUpdateError::config(format!(
                "'{}' does not point to the web or stub directory (points to '{}').",
                self.link.display(),
                target.display()
            )));
        }
        Ok(())
    }

    pub fn link_stub(&self) -> io::Result<()> {
        relink(&self.link, &self.stub)
    }

    pub fn link_live(&self) -> io::Result<()> {
        relink(&self.link, &self.path)
    }

    /// Where `link` currently points, if it is a symlink
    pub fn current_target(&self) -> Option<PathBuf> {
        fs::read_link(&self.link).ok()
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

fn relink(link: &Path, target: &Path) -> io::Result<()> {
    if is_symlink(link) {
        fs::remove_file(link)?;
    }
    std::os::unix::fs::symlink(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(temp: &TempDir) -> WebPath {
        let web = WebPath::new(
            temp.path().join("web"),
            temp.path().join("httpdocs"),
            temp.path().join("webstub"),
        );
        fs::create_dir(&web.path).unwrap();
        fs::create_dir(&web.stub).unwrap();
        std::os::unix::fs::symlink(&web.path, &web.link).unwrap();
        web
    }

    #[test]
    fn test_validate_accepts_live_and_stub_targets() {
        let temp = TempDir::new().unwrap();
        let web = setup(&temp);
        web.validate().unwrap();

        web.link_stub().unwrap();
        web.validate().unwrap();
        assert_eq!(web.current_target(), Some(web.stub.clone()));

        web.link_live().unwrap();
        assert_eq!(web.current_target(), Some(web.path.clone()));
    }

    #[test]
    fn test_validate_rejects_plain_directory() {
        let temp = TempDir::new().unwrap();
        let web = setup(&temp);
        fs::remove_file(&web.link).unwrap();
        fs::create_dir(&web.link).unwrap();

        let err = web.validate().unwrap_err();
        assert!(err.to_string().contains("is not a symbolic link"), "{err}");
    }

    #[test]
    fn test_validate_rejects_foreign_target() {
        let temp = TempDir::new().unwrap();
        let web = setup(&temp);
        let other = temp.path().join("other");
        fs::create_dir(&other).unwrap();
        fs::remove_file(&web.link).unwrap();
        std::os::unix::fs::symlink(&other, &web.link).unwrap();

        let err = web.validate().unwrap_err();
        assert!(matches!(err, SelfUpdateError::Configuration(_)));
        assert!(err.to_string().contains("does not point"), "{err}");
    }

    #[test]
    fn test_validate_rejects_missing_stub() {
        let temp = TempDir::new().unwrap();
        let web = setup(&temp);
        fs::remove_dir(&web.stub).unwrap();
        assert!(web.validate().is_err());
    }

    #[test]
    fn test_relink_creates_missing_link() {
        let temp = TempDir::new().unwrap();
        let web = setup(&temp);
        fs::remove_file(&web.link).unwrap();
        web.link_stub().unwrap();
        assert_eq!(web.current_target(), Some(web.stub.clone()));
    }
}
