//! Target folder policy.
//!
//! modsync only ever writes into one folder: the `mods` folder of the default
//! Minecraft launcher profile, `<profile root>/AppData/Roaming/.minecraft/mods`.
//! This is a single-tenant rule, not a general path-safety check; a
//! subfolder of `.minecraft` or a look-alike elsewhere on disk is rejected.
//!
//! Comparison is lexical: case-insensitive, `/` and `\` treated the same,
//! redundant separators and `.` segments dropped. Symlinks are not resolved,
//! so a candidate containing a `..` segment is rejected outright: lexically
//! collapsing it could name a different folder than the filesystem does.

use camino::{Utf8Path, Utf8PathBuf};

/// Segments appended to the profile root to form the only accepted target
const MODS_SEGMENTS: [&str; 4] = ["AppData", "Roaming", ".minecraft", "mods"];

/// Policy deciding which local folder may be replaced by a sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPolicy {
    profile_root: Utf8PathBuf,
}

impl PathPolicy {
    /// Policy for an explicit user profile root (e.g. `C:\Users\steve`)
    pub fn new(profile_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            profile_root: profile_root.into(),
        }
    }

    /// Policy for the current user.
    ///
    /// Uses `USERPROFILE`, falling back to the home directory. Returns `None`
    /// if neither is available or the path is not valid UTF-8.
    pub fn from_env() -> Option<Self> {
        let root = std::env::var("USERPROFILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Utf8PathBuf::from)
            .or_else(|| dirs::home_dir().and_then(|p| Utf8PathBuf::from_path_buf(p).ok()))?;

        tracing::debug!("Using profile root {}", root);
        Some(Self::new(root))
    }

    pub fn profile_root(&self) -> &Utf8Path {
        &self.profile_root
    }

    /// The single folder this policy accepts
    pub fn canonical_target(&self) -> Utf8PathBuf {
        MODS_SEGMENTS
            .iter()
            .fold(self.profile_root.clone(), |path, segment| path.join(segment))
    }

    /// Check whether `candidate` is the accepted target folder.
    ///
    /// Never errors; every decision is written to the operational log.
    pub fn is_valid_target(&self, candidate: impl AsRef<str>) -> bool {
        let candidate = candidate.as_ref();
        let expected = self.canonical_target();

        let valid = !candidate.trim().is_empty()
            && !has_parent_segment(candidate)
            && normalize_path(candidate) == normalize_path(expected.as_str());

        if valid {
            tracing::info!("Folder {} is a valid target", candidate);
        } else {
            tracing::warn!("Folder {} does not match required path {}", candidate, expected);
        }

        valid
    }
}

/// Lexically normalize a path for policy comparison.
///
/// The result is lowercase, uses `/` as the only separator, and has no empty,
/// `.` or resolvable `..` segments. A leading separator is kept so rooted and
/// relative paths never compare equal.
pub fn normalize_path(path: &str) -> String {
    let rooted = path.starts_with(['/', '\\']);
    let mut segments: Vec<String> = Vec::new();

    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if last != ".." && !is_drive(last) => {
                    segments.pop();
                }
                Some(last) if is_drive(last) => {}
                _ if rooted => {}
                _ => segments.push("..".to_string()),
            },
            other => segments.push(other.to_lowercase()),
        }
    }

    let joined = segments.join("/");
    if rooted { format!("/{}", joined) } else { joined }
}

/// Whether any `/` or `\` separated segment of `path` is `..`
fn has_parent_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}

fn is_drive(segment: &str) -> bool {
    segment.len() == 2 && segment.ends_with(':')
}
