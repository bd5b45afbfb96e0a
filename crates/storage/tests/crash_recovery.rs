//! Simulated crashes around checkpoint saves.

use std::fs;

use benchplan_storage::{CheckpointStore, SessionRepository, StorageConfig, StorageError};
use tempfile::TempDir;

fn repository(dir: &TempDir) -> SessionRepository {
    SessionRepository::new(&StorageConfig {
        base_dir: dir.path().to_path_buf(),
    })
}

#[test]
fn crash_mid_write_keeps_previous_checkpoint() {
    let dir = TempDir::new().unwrap();
    let repo = repository(&dir);
    let storage = repo.create("crash-", chrono::Utc::now()).unwrap();
    storage.save_checkpoint(b"before the crash").unwrap();

    // A writer died after creating and partially filling the next file.
    fs::write(storage.next_file(), b"after th").unwrap();

    // A fresh process reopens the session and sees the old bytes.
    let reopened = repo.open(storage.id()).unwrap();
    assert_eq!(reopened.load_checkpoint().unwrap(), b"before the crash");
    assert!(matches!(
        reopened.save_checkpoint(b"next"),
        Err(StorageError::Locked(_))
    ));
}

#[test]
fn consecutive_saves_release_the_lock() {
    let dir = TempDir::new().unwrap();
    let storage = repository(&dir).create("seq-", chrono::Utc::now()).unwrap();
    for round in 0..5u8 {
        let payload = vec![round; 64 * (round as usize + 1)];
        storage.save_checkpoint(&payload).unwrap();
        assert!(!storage.next_file().exists());
        assert_eq!(storage.load_checkpoint().unwrap(), payload);
    }
}

#[test]
fn never_saved_session_loads_empty() {
    let dir = TempDir::new().unwrap();
    let storage = repository(&dir).create("fresh-", chrono::Utc::now()).unwrap();
    assert!(storage.load_checkpoint().unwrap().is_empty());
}

#[test]
fn break_lock_allows_recovery() {
    let dir = TempDir::new().unwrap();
    let storage = repository(&dir).create("lock-", chrono::Utc::now()).unwrap();
    fs::write(storage.next_file(), b"stale").unwrap();
    storage.break_lock().unwrap();
    storage.save_checkpoint(b"recovered").unwrap();
    assert_eq!(storage.load_checkpoint().unwrap(), b"recovered");
}
