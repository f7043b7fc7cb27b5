//! End-to-end tests for SyncOrchestrator
//!
//! These tests drive a full run against an in-memory object store and verify:
//! - A valid target ends up holding exactly the archive's tree
//! - An invalid target is never touched and the store is never contacted
//! - A transfer failing mid-stream leaves the target empty with no archive
//! - A target spelled through `..` is rejected even when it resolves elsewhere
//! - An archive entry named like the temporary archive cannot clobber it

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use modsync::error::Result;
use modsync::progress::NoProgress;
use modsync::services::{PathPolicy, RemoteObject, RemoteStore};
use modsync::sync::ARCHIVE_FILE_NAME;
use modsync::{ErrorKind, SyncError, SyncOrchestrator, SyncStage, SyncState};
use std::fs;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Serves one archive, optionally failing after `fail_after` bytes
struct FakeStore {
    archive: Vec<u8>,
    fail_after: Option<usize>,
    opens: AtomicUsize,
}

impl FakeStore {
    fn serving(archive: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            archive,
            fail_after: None,
            opens: AtomicUsize::new(0),
        })
    }

    fn failing_after(archive: Vec<u8>, bytes: usize) -> Arc<Self> {
        Arc::new(Self {
            archive,
            fail_after: Some(bytes),
            opens: AtomicUsize::new(0),
        })
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn open(&self, _remote_path: &str) -> Result<RemoteObject> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let size = self.archive.len() as u64;

        let reader: Box<dyn tokio::io::AsyncRead + Send + Unpin> = match self.fail_after {
            None => Box::new(Cursor::new(self.archive.clone())),
            Some(n) => Box::new(
                tokio_test::io::Builder::new()
                    .read(&self.archive[..n])
                    .read_error(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        "connection reset",
                    ))
                    .build(),
            ),
        };

        Ok(RemoteObject { size, reader })
    }
}

struct Profile {
    _temp_dir: TempDir,
    policy: PathPolicy,
    mods: Utf8PathBuf,
}

fn create_profile() -> Profile {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let policy = PathPolicy::new(root);
    let mods = policy.canonical_target();
    fs::create_dir_all(&mods).unwrap();
    Profile {
        _temp_dir: temp_dir,
        policy,
        mods,
    }
}

fn build_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    // Stored, so the archive is at least as large as its contents
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

fn tree(root: &Utf8Path) -> Vec<String> {
    fn walk(dir: &Utf8Path, root: &Utf8Path, out: &mut Vec<String>) {
        for entry in dir.read_dir_utf8().unwrap() {
            let entry = entry.unwrap();
            let relative = entry.path().strip_prefix(root).unwrap().as_str().replace('\\', "/");
            if entry.file_type().unwrap().is_dir() {
                out.push(format!("{}/", relative));
                walk(entry.path(), root, out);
            } else {
                out.push(relative);
            }
        }
    }

    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

#[tokio::test]
async fn test_sync_replaces_stale_files() {
    let profile = create_profile();
    fs::write(profile.mods.join("OldMod-1.0.jar"), "old").unwrap();
    fs::create_dir_all(profile.mods.join("config/old")).unwrap();
    fs::write(profile.mods.join("config/old/settings.cfg"), "old").unwrap();

    // Large enough to need several chunks
    let big = vec![7u8; 20_000];
    let archive = build_archive(&[
        ("NewMod-2.0.jar", b"new mod".as_slice()),
        ("libs/", b"".as_slice()),
        ("libs/core.jar", big.as_slice()),
    ]);
    let store = FakeStore::serving(archive);
    let orchestrator = SyncOrchestrator::new(profile.policy.clone(), store.clone());

    let seen = Mutex::new(Vec::new());
    let sink = |fraction: f64| seen.lock().unwrap().push(fraction);

    let summary = orchestrator
        .run_release(&profile.mods, "1.20.1", &sink)
        .await
        .unwrap();

    assert_eq!(summary.remote_path, "/Minecraft/1.20.1/mods.zip");
    assert_eq!(
        tree(&profile.mods),
        vec!["NewMod-2.0.jar", "libs/", "libs/core.jar"]
    );
    assert_eq!(fs::read(profile.mods.join("libs/core.jar")).unwrap(), big);
    assert_eq!(store.opens(), 1);

    let seen = seen.lock().unwrap();
    assert!(seen.len() > 1);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last(), Some(&1.0));

    assert_eq!(
        orchestrator.state().history(),
        vec![
            SyncState::Running(SyncStage::Idle),
            SyncState::Running(SyncStage::Validating),
            SyncState::Running(SyncStage::Clearing),
            SyncState::Running(SyncStage::Downloading),
            SyncState::Running(SyncStage::Extracting),
            SyncState::Running(SyncStage::Cleanup),
            SyncState::Running(SyncStage::Done),
        ]
    );
}

#[tokio::test]
async fn test_invalid_target_is_never_touched() {
    let profile = create_profile();
    let temp_mods = profile.policy.profile_root().join("Temp").join("mods");
    fs::create_dir_all(&temp_mods).unwrap();
    fs::write(temp_mods.join("keep.jar"), "keep").unwrap();

    let store = FakeStore::serving(build_archive(&[("a.jar", b"a".as_slice())]));
    let orchestrator = SyncOrchestrator::new(profile.policy.clone(), store.clone());

    let abort = orchestrator
        .run(&temp_mods, "/Minecraft/1.7.10/mods.zip", &NoProgress)
        .await
        .unwrap_err();

    assert_eq!(abort.kind(), ErrorKind::InvalidTarget);
    assert_eq!(abort.stage, SyncStage::Validating);
    assert_eq!(store.opens(), 0);
    assert_eq!(tree(&temp_mods), vec!["keep.jar"]);
}

#[tokio::test]
async fn test_windows_style_foreign_path_is_rejected() {
    let profile = create_profile();
    let store = FakeStore::serving(Vec::new());
    let orchestrator = SyncOrchestrator::new(profile.policy.clone(), store.clone());

    let abort = orchestrator
        .run(Utf8Path::new(r"C:\Temp\mods"), "/x.zip", &NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(abort.error, SyncError::InvalidTarget(_)));
    assert_eq!(store.opens(), 0);
}

#[tokio::test]
async fn test_transfer_error_leaves_target_empty() {
    let profile = create_profile();
    fs::write(profile.mods.join("stale.jar"), "stale").unwrap();

    let archive = build_archive(&[("a.jar", vec![1u8; 10_000].as_slice())]);
    let store = FakeStore::failing_after(archive, 4096);
    let orchestrator = SyncOrchestrator::new(profile.policy.clone(), store.clone());

    let abort = orchestrator
        .run(&profile.mods, "/Minecraft/1.7.10/mods.zip", &NoProgress)
        .await
        .unwrap_err();

    assert_eq!(abort.kind(), ErrorKind::Transfer);
    assert_eq!(abort.stage, SyncStage::Downloading);
    assert!(abort.to_string().starts_with("download failed: "));
    assert!(tree(&profile.mods).is_empty());
    assert!(!profile.mods.join(ARCHIVE_FILE_NAME).exists());
    assert!(matches!(
        orchestrator.state().snapshot(),
        SyncState::Aborted {
            stage: SyncStage::Downloading,
            ..
        }
    ));
}

#[tokio::test]
async fn test_escaping_archive_is_rejected_before_writing() {
    let profile = create_profile();
    let archive = build_archive(&[
        ("ok.jar", b"ok".as_slice()),
        ("../../evil.jar", b"evil".as_slice()),
    ]);
    let store = FakeStore::serving(archive);
    let orchestrator = SyncOrchestrator::new(profile.policy.clone(), store);

    let abort = orchestrator
        .run(&profile.mods, "/x.zip", &NoProgress)
        .await
        .unwrap_err();

    assert_eq!(abort.kind(), ErrorKind::Archive);
    assert!(!profile.mods.join("ok.jar").exists());
    assert!(!profile.policy.profile_root().join("AppData/Roaming/evil.jar").exists());
}

#[tokio::test]
async fn test_second_run_after_abort() {
    let profile = create_profile();
    let store = FakeStore::serving(build_archive(&[("a.jar", b"a".as_slice())]));
    let orchestrator = SyncOrchestrator::new(profile.policy.clone(), store.clone());

    let elsewhere = profile.policy.profile_root().join("mods");
    assert!(orchestrator.run(&elsewhere, "/x.zip", &NoProgress).await.is_err());

    orchestrator
        .run(&profile.mods, "/x.zip", &NoProgress)
        .await
        .unwrap();

    assert_eq!(tree(&profile.mods), vec!["a.jar"]);
    assert_eq!(store.opens(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_parent_segment_through_symlink_is_rejected() {
    let profile = create_profile();
    let other_dir = TempDir::new().unwrap();
    let other = Utf8PathBuf::try_from(other_dir.path().to_path_buf()).unwrap();

    // <root>/link points at <other>/sub, so <root>/link/.. is <other> on disk
    fs::create_dir_all(other.join("sub")).unwrap();
    let victim_mods = other.join("AppData/Roaming/.minecraft/mods");
    fs::create_dir_all(&victim_mods).unwrap();
    fs::write(victim_mods.join("victim.txt"), "keep").unwrap();
    let root = profile.policy.profile_root();
    std::os::unix::fs::symlink(other.join("sub"), root.join("link")).unwrap();

    let store = FakeStore::serving(build_archive(&[("a.jar", b"a".as_slice())]));
    let orchestrator = SyncOrchestrator::new(profile.policy.clone(), store.clone());
    let target = root.join("link/../AppData/Roaming/.minecraft/mods");

    let abort = orchestrator
        .run(&target, "/x.zip", &NoProgress)
        .await
        .unwrap_err();

    assert_eq!(abort.kind(), ErrorKind::InvalidTarget);
    assert_eq!(store.opens(), 0);
    assert_eq!(tree(&victim_mods), vec!["victim.txt"]);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_accepted_spelling_installs_into_canonical_folder() {
    let profile = create_profile();
    fs::write(profile.mods.join("stale.jar"), "stale").unwrap();
    let shouting = profile.policy.profile_root().join("APPDATA/Roaming/.minecraft/MODS");

    let store = FakeStore::serving(build_archive(&[("a.jar", b"a".as_slice())]));
    let orchestrator = SyncOrchestrator::new(profile.policy.clone(), store);

    let summary = orchestrator
        .run(&shouting, "/x.zip", &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.target, profile.mods);
    assert_eq!(tree(&profile.mods), vec!["a.jar"]);
    assert!(!shouting.exists());
}

#[tokio::test]
async fn test_entry_named_like_temp_archive_does_not_break_sync() {
    let profile = create_profile();
    let archive = build_archive(&[
        ("a.jar", b"a".as_slice()),
        (ARCHIVE_FILE_NAME, vec![0u8; 8_192].as_slice()),
        ("z.jar", b"z".as_slice()),
    ]);
    let store = FakeStore::serving(archive);
    let orchestrator = SyncOrchestrator::new(profile.policy.clone(), store);

    let summary = orchestrator
        .run(&profile.mods, "/x.zip", &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.files_extracted, 2);
    assert_eq!(tree(&profile.mods), vec!["a.jar", "z.jar"]);
}
