/// A labeled version of the mod set and the archive it lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    pub label: &'static str,
    pub remote_path: &'static str,
}

/// Releases offered to the user, in display order
pub const RELEASES: &[Release] = &[
    Release {
        label: "1.7.10",
        remote_path: "/Minecraft/1.7.10/mods.zip",
    },
    Release {
        label: "1.12.2",
        remote_path: "/Minecraft/1.12.2/mods.zip",
    },
    Release {
        label: "1.19.2",
        remote_path: "/Minecraft/1.19.2/mods.zip",
    },
    Release {
        label: "1.20.1",
        remote_path: "/Minecraft/1.20.1/mods.zip",
    },
];

/// Release selected when the user has not picked one
pub const DEFAULT_RELEASE: &str = "1.7.10";

/// Look up a release by its label
pub fn find_release(label: &str) -> Option<&'static Release> {
    RELEASES.iter().find(|r| r.label == label.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_known_release() {
        let release = find_release("1.12.2").unwrap();
        assert_eq!(release.remote_path, "/Minecraft/1.12.2/mods.zip");
    }

    #[test]
    fn test_find_unknown_release() {
        assert!(find_release("1.8.9").is_none());
    }

    #[test]
    fn test_default_release_exists() {
        assert!(find_release(DEFAULT_RELEASE).is_some());
    }
}
