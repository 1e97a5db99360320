use std::{fs, io, path::Path};

/// Entries kept when a directory is cleared, so ignore markers survive
pub const PRESERVED_FILE_NAMES: &[&str] = &[".gitignore", ".gitkeep", ".hgignore", ".hgkeep"];

/// Remove everything inside `dir` except [`PRESERVED_FILE_NAMES`].
///
/// Subdirectories are removed whole. Symlinks are removed, never followed.
pub fn clear_directory(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if PRESERVED_FILE_NAMES.iter().any(|keep| name == *keep) {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
