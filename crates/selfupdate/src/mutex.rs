//! Host-local named locks guarding a self-update run.

use std::{
    cell::RefCell,
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{self, Write},
    os::unix::io::AsRawFd,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Non-blocking named mutual exclusion.
pub trait LockProvider {
    /// Try to take the lock; `Ok(false)` means someone else holds it
    fn acquire(&self, name: &str) -> io::Result<bool>;

    /// Release a lock taken by [`LockProvider::acquire`]. Releasing an unheld name is a no-op.
    fn release(&self, name: &str) -> io::Result<()>;
}

/// `flock(2)`-based locks, one file per name under a directory.
///
/// The kernel drops the lock when the holding process exits, so a killed run
/// does not leave the next one locked out. Lock files are left in place.
#[derive(Debug)]
pub struct FileLockProvider {
    dir: PathBuf,
    held: RefCell<HashMap<String, File>>,
}

impl FileLockProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            held: RefCell::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock_path(&self, name: &str) -> PathBuf {
        let file_name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.lock"))
    }
}

impl LockProvider for FileLockProvider {
    fn acquire(&self, name: &str) -> io::Result<bool> {
        if self.held.borrow().contains_key(name) {
            return Ok(false);
        }

        std::fs::create_dir_all(&self.dir)?;
        let path = self.lock_path(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        // LOCK_NB: fail immediately rather than queue behind the holder
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                debug!(path = %path.display(), "lock is held elsewhere");
                return Ok(false);
            }
            return Err(err);
        }

        file.set_len(0)?;
        let mut writer = &file;
        let _ = writer.write_all(std::process::id().to_string().as_bytes());

        debug!(path = %path.display(), "lock acquired");
        self.held.borrow_mut().insert(name.to_string(), file);
        Ok(true)
    }

    fn release(&self, name: &str) -> io::Result<()> {
        if let Some(file) = self.held.borrow_mut().remove(name) {
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
            if result != 0 {
                return Err(io::Error::last_os_error());
            }
            debug!(name, "lock released");
        }
        Ok(())
    }
}
