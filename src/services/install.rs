//! Extracting a downloaded release archive into the target folder.
//!
//! Every entry name is checked before anything is written: names that are
//! absolute, carry a drive prefix, or climb out of the target through `..`
//! reject the whole archive. When an entry collides with an existing path of
//! the other kind (file vs. directory) the existing path is replaced.
//!
//! When the archive itself sits inside the target, entries naming its path
//! (or a path below it) are skipped with a warning, since writing them would
//! truncate or replace the file being read.

use crate::error::{Result, SyncError};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io;
use zip::ZipArchive;

/// Extract `archive_path` into `target_dir`, then delete the archive.
///
/// On failure the archive and anything already extracted are left in place.
///
/// # Returns
/// Number of files extracted
pub fn install_archive(archive_path: &Utf8Path, target_dir: &Utf8Path) -> Result<usize> {
    tracing::info!("Extracting {} into {}", archive_path, target_dir);

    let extracted = match extract(archive_path, target_dir) {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("Failed to extract {}: {}", archive_path, e);
            return Err(e);
        }
    };

    tracing::info!("Extracted {} files into {}", extracted, target_dir);

    // Cleanup retries this if it fails here
    if let Err(e) = fs::remove_file(archive_path) {
        tracing::warn!("Could not remove archive {}: {}", archive_path, e);
    }

    Ok(extracted)
}

fn extract(archive_path: &Utf8Path, target_dir: &Utf8Path) -> Result<usize> {
    let file = File::open(archive_path)
        .map_err(|e| SyncError::Archive(format!("cannot open {}: {}", archive_path, e)))?;
    let mut archive = ZipArchive::new(file)?;
    let reserved = archive_path.strip_prefix(target_dir).ok();

    let mut plan = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let relative = safe_relative_path(entry.name()).ok_or_else(|| {
            SyncError::Archive(format!("unsafe entry path {:?}", entry.name()))
        })?;
        plan.push((i, relative, entry.is_dir()));
    }

    let mut extracted = 0;
    for (index, relative, is_dir) in plan {
        if relative.as_str().is_empty() {
            continue;
        }
        if reserved.is_some_and(|reserved| shadows(&relative, reserved)) {
            tracing::warn!("Skipping entry {} that would overwrite the archive", relative);
            continue;
        }

        if is_dir {
            make_dirs(target_dir, &relative)?;
            continue;
        }

        if let Some(parent) = relative.parent() {
            make_dirs(target_dir, parent)?;
        }

        let out_path = target_dir.join(&relative);
        if out_path.is_dir() && !out_path.is_symlink() {
            fs::remove_dir_all(&out_path).map_err(|e| write_error(&out_path, e))?;
        }

        let mut entry = archive.by_index(index)?;
        let mut out_file = File::create(&out_path).map_err(|e| write_error(&out_path, e))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| write_error(&out_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))
                    .map_err(|e| write_error(&out_path, e))?;
            }
        }

        tracing::debug!("Extracted {}", relative);
        extracted += 1;
    }

    Ok(extracted)
}

/// Create `relative` under `root`, replacing any file standing in the way
fn make_dirs(root: &Utf8Path, relative: &Utf8Path) -> Result<()> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.is_dir() => continue,
            Ok(_) => fs::remove_file(&current).map_err(|e| write_error(&current, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(write_error(&current, e)),
        }
        fs::create_dir(&current).map_err(|e| write_error(&current, e))?;
    }
    Ok(())
}

/// Whether `relative` is `reserved` or lies below it, ignoring ASCII case
fn shadows(relative: &Utf8Path, reserved: &Utf8Path) -> bool {
    let mut relative = relative.components();
    reserved.components().all(|want| {
        relative
            .next()
            .is_some_and(|got| got.as_str().eq_ignore_ascii_case(want.as_str()))
    })
}

fn write_error(path: &Utf8Path, e: io::Error) -> SyncError {
    SyncError::Archive(format!("failed to write {}: {}", path, e))
}

/// Turn an archive entry name into a path that stays inside the target.
///
/// Both `/` and `\` count as separators. `.` segments are dropped and `..`
/// segments are resolved; returns `None` if the name is rooted, has a drive
/// or NUL, or would leave the target. An empty result means the target itself.
pub fn safe_relative_path(name: &str) -> Option<Utf8PathBuf> {
    if name.starts_with(['/', '\\']) || name.contains('\0') {
        return None;
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in name.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s if s.contains(':') => return None,
            s => segments.push(s),
        }
    }

    let path: Utf8PathBuf = segments.iter().collect();
    debug_assert!(path.components().all(|c| matches!(c, Utf8Component::Normal(_))));
    Some(path)
}
