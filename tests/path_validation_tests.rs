//! Integration tests for target folder validation
//!
//! These tests verify the caller-facing check through the public API,
//! with Windows-style and Unix-style profile roots.

use modsync::SyncOrchestrator;
use modsync::error::Result;
use modsync::services::{PathPolicy, RemoteObject, RemoteStore, normalize_path};
use std::sync::Arc;

struct NoStore;

#[async_trait::async_trait]
impl RemoteStore for NoStore {
    async fn open(&self, _remote_path: &str) -> Result<RemoteObject> {
        panic!("validation must not contact the store")
    }
}

#[test]
fn test_windows_profile() {
    let policy = PathPolicy::new(r"C:\Users\Steve");

    let accepted = [
        r"C:\Users\Steve\AppData\Roaming\.minecraft\mods",
        r"c:\users\steve\appdata\roaming\.minecraft\mods\",
        "C:/Users/Steve/AppData/Roaming/.minecraft/mods",
    ];
    for path in accepted {
        assert!(policy.is_valid_target(path), "{} should be accepted", path);
    }

    let rejected = [
        r"C:\Temp\mods",
        r"D:\Users\Steve\AppData\Roaming\.minecraft\mods",
        r"C:\Users\Steve\AppData\Roaming\.minecraft",
        r"C:\Users\Steve\AppData\Roaming\.minecraft\mods\sub",
        r"Users\Steve\AppData\Roaming\.minecraft\mods",
        r"C:\Users\Steve\AppData\Local\..\Roaming\.minecraft\mods",
        r"C:\Users\Steve\AppData\Roaming\.minecraft\mods\..\mods",
        "   ",
    ];
    for path in rejected {
        assert!(!policy.is_valid_target(path), "{} should be rejected", path);
    }
}

#[test]
fn test_unix_profile() {
    let policy = PathPolicy::new("/home/steve");

    assert!(policy.is_valid_target("/home/steve/AppData/Roaming/.minecraft/mods"));
    assert!(policy.is_valid_target("//home//steve/./AppData/Roaming/.minecraft/mods/"));
    assert!(!policy.is_valid_target("home/steve/AppData/Roaming/.minecraft/mods"));
    assert!(!policy.is_valid_target("/home/steve/.minecraft/mods"));
}

#[test]
fn test_orchestrator_uses_its_policy() {
    let orchestrator = SyncOrchestrator::new(PathPolicy::new(r"C:\Users\Alex"), Arc::new(NoStore));

    assert!(orchestrator.is_valid_target(r"C:\Users\Alex\AppData\Roaming\.minecraft\mods"));
    assert!(!orchestrator.is_valid_target(r"C:\Users\Steve\AppData\Roaming\.minecraft\mods"));
}

#[test]
fn test_normalize_is_idempotent_on_examples() {
    for path in [
        r"C:\Users\Steve\..\Alex\mods",
        "/a/b/../../..",
        "relative/../../x",
        r"\\server\share\.\dir",
    ] {
        let once = normalize_path(path);
        assert_eq!(normalize_path(&once), once, "{}", path);
    }
}
