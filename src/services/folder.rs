//! Emptying the target folder before a new release is installed.

use crate::error::{Result, SyncError};
use camino::Utf8Path;
use std::fs;

/// Remove every entry inside `path`, keeping `path` itself.
///
/// Files and symbolic links are unlinked (a link is never followed), and
/// subdirectories are removed recursively. Stops at the first failure and
/// returns it; entries already removed stay removed.
///
/// Only call this on a folder that passed
/// [`PathPolicy::is_valid_target`](crate::services::PathPolicy::is_valid_target).
///
/// # Returns
/// Number of direct entries removed
pub fn clear_folder(path: &Utf8Path) -> Result<usize> {
    let result = remove_entries(path);

    match &result {
        Ok(count) => tracing::info!("Cleared folder {} ({} entries)", path, count),
        Err(e) => tracing::error!("Failed to clear folder {}: {}", path, e),
    }

    result
}

fn remove_entries(path: &Utf8Path) -> Result<usize> {
    let entries = path
        .read_dir_utf8()
        .map_err(|e| SyncError::filesystem(path, e))?;

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::filesystem(path, e))?;
        let entry_path = entry.path();
        let file_type = fs::symlink_metadata(entry_path)
            .map_err(|e| SyncError::filesystem(entry_path, e))?
            .file_type();

        let removal = if file_type.is_dir() {
            fs::remove_dir_all(entry_path)
        } else {
            remove_file_or_link(entry_path)
        };
        removal.map_err(|e| SyncError::filesystem(entry_path, e))?;

        tracing::debug!("Removed {}", entry_path);
        removed += 1;
    }

    Ok(removed)
}

#[cfg(windows)]
fn remove_file_or_link(path: &Utf8Path) -> std::io::Result<()> {
    // Directory symlinks and junctions must be removed with remove_dir
    fs::remove_file(path).or_else(|_| fs::remove_dir(path))
}

#[cfg(not(windows))]
fn remove_file_or_link(path: &Utf8Path) -> std::io::Result<()> {
    fs::remove_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn temp_utf8() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_clear_mixed_contents() {
        let (_temp_dir, root) = temp_utf8();
        fs::write(root.join("a.jar"), b"jar").unwrap();
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::write(root.join("nested/deeper/b.cfg"), b"cfg").unwrap();
        fs::create_dir(root.join("empty")).unwrap();

        let removed = clear_folder(&root).unwrap();

        assert_eq!(removed, 3);
        assert!(root.exists());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn test_clear_empty_folder() {
        let (_temp_dir, root) = temp_utf8();
        assert_eq!(clear_folder(&root).unwrap(), 0);
        assert!(root.exists());
    }

    #[test]
    fn test_missing_folder_is_filesystem_error() {
        let (_temp_dir, root) = temp_utf8();
        let err = clear_folder(&root.join("missing")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Filesystem);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_is_unlinked_not_followed() {
        let (_outside_dir, outside) = temp_utf8();
        fs::write(outside.join("keep.txt"), b"keep").unwrap();

        let (_temp_dir, root) = temp_utf8();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();
        std::os::unix::fs::symlink(outside.join("keep.txt"), root.join("file-link")).unwrap();

        clear_folder(&root).unwrap();

        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
        assert!(outside.join("keep.txt").exists());
    }
}
