//! End-to-end pipeline tests: live watch, dispatch, local store, and
//! restart seeding against real temporary directories.

use arca_core::event::watch_name;
use arca_core::Signature;
use arca_engine::config::{
    Config, LocalStorageConfig, SchedulerConfig, StorageConfig, WatchConfig,
};
use arca_engine::Engine;
use arca_snapshot::SnapshotStore;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

fn config_for(watch_root: &Path, backup_root: &Path) -> Config {
    Config {
        watches: vec![WatchConfig {
            path: watch_root.to_path_buf(),
            active: true,
        }],
        storage: StorageConfig {
            local: Some(LocalStorageConfig {
                active: true,
                path: backup_root.to_path_buf(),
            }),
            remote: None,
        },
        scheduler: SchedulerConfig {
            flush_interval_secs: 1,
            ..SchedulerConfig::default()
        },
        ..Config::default()
    }
}

async fn wait_for_file(path: &Path, secs: u64) -> bool {
    for _ in 0..(secs * 10) {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn created_file_lands_in_the_backup_directory() {
    let watch_root = TempDir::new().unwrap();
    let backup_root = TempDir::new().unwrap();

    let engine = Engine::new(config_for(watch_root.path(), backup_root.path()));
    let running = engine.start().await.unwrap();
    assert_eq!(running.active_watches(), 1);
    let mut progress = running.subscribe_progress();

    // Let the watch settle before producing the change.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let source = watch_root.path().join("report.txt");
    std::fs::write(&source, b"quarterly numbers").unwrap();

    let mut final_percent = 0.0;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    while final_percent < 100.0 {
        let report = timeout(deadline - tokio::time::Instant::now(), progress.recv())
            .await
            .expect("no progress before deadline")
            .expect("progress stream closed");
        if report.absolute_path == source {
            final_percent = report.percent;
        }
    }

    let copied = backup_root
        .path()
        .join(watch_name(watch_root.path()))
        .join("report.txt");
    assert!(wait_for_file(&copied, 10).await, "backup copy missing");
    assert_eq!(std::fs::read(&copied).unwrap(), b"quarterly numbers");

    running.shutdown();
}

#[tokio::test]
async fn known_root_reseeds_its_backlog_on_startup() {
    let watch_root = TempDir::new().unwrap();
    let backup_root = TempDir::new().unwrap();

    let source = watch_root.path().join("left-over.txt");
    std::fs::write(&source, b"unfinished business").unwrap();

    // A previous run tracked the file; the database survives the restart.
    {
        let store = SnapshotStore::open(watch_root.path()).unwrap();
        store.put(&source, &Signature::new(100, 18)).unwrap();
    }

    let engine = Engine::new(config_for(watch_root.path(), backup_root.path()));
    let running = engine.start().await.unwrap();

    let copied: PathBuf = backup_root
        .path()
        .join(watch_name(watch_root.path()))
        .join("left-over.txt");
    assert!(wait_for_file(&copied, 15).await, "backlog entry was not re-stored");
    assert_eq!(std::fs::read(&copied).unwrap(), b"unfinished business");

    running.shutdown();
}

#[tokio::test]
async fn new_root_with_existing_files_is_rescanned() {
    let watch_root = TempDir::new().unwrap();
    let backup_root = TempDir::new().unwrap();

    std::fs::create_dir_all(watch_root.path().join("docs")).unwrap();
    std::fs::write(watch_root.path().join("docs/pre-existing.txt"), b"old file").unwrap();

    let engine = Engine::new(config_for(watch_root.path(), backup_root.path()));
    let running = engine.start().await.unwrap();

    let copied = backup_root
        .path()
        .join(watch_name(watch_root.path()))
        .join("docs/pre-existing.txt");
    assert!(wait_for_file(&copied, 15).await, "pre-existing file was not stored");

    running.shutdown();
}

#[tokio::test]
async fn engine_refuses_to_run_without_any_usable_root() {
    let backup_root = TempDir::new().unwrap();
    let config = config_for(Path::new("/definitely/not/here"), backup_root.path());
    let err = Engine::new(config).start().await.unwrap_err();
    assert!(matches!(err, arca_engine::EngineError::NoWatchRoots));
}
