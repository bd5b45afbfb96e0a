//! Crash-safe checkpoint storage for one session directory.
//!
//! A save goes through an exclusively created `session.next` file which is
//! fsynced and then renamed over `session`; the directory is fsynced last so
//! the rename itself is durable. The exclusive create doubles as a lock
//! between processes: a leftover `session.next` means an earlier save never
//! finished and nothing is written until the operator breaks the lock.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use benchplan_core::SessionId;

use super::{CheckpointStore, Result, StorageError};

/// Name of the authoritative checkpoint file.
pub const SESSION_FILE: &str = "session";

/// Name of the transient file used during a save.
pub const NEXT_FILE: &str = "session.next";

/// Suffix of session directories.
pub const SESSION_DIR_SUFFIX: &str = ".session";

/// Storage for a single session, rooted at its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStorage {
    id: SessionId,
    location: PathBuf,
}

impl SessionStorage {
    /// Wrap an existing session directory.
    pub fn open(location: impl Into<PathBuf>) -> Self {
        let location = location.into();
        let name = location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = name.strip_suffix(SESSION_DIR_SUFFIX).unwrap_or(&name).to_string();
        Self {
            id: SessionId::new(id),
            location,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Session directory.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Path of the authoritative checkpoint.
    pub fn session_file(&self) -> PathBuf {
        self.location.join(SESSION_FILE)
    }

    /// Path of the transient save file.
    pub fn next_file(&self) -> PathBuf {
        self.location.join(NEXT_FILE)
    }

    /// Directory for captured job output.
    pub fn io_logs(&self) -> PathBuf {
        self.location.join("io-logs")
    }

    /// Whether an interrupted save left a lock behind.
    pub fn is_locked(&self) -> bool {
        self.next_file().exists()
    }

    /// Delete the session directory and everything in it.
    pub fn remove(self) -> Result<()> {
        tracing::debug!(location = %self.location.display(), "removing session storage");
        fs::remove_dir_all(&self.location)?;
        Ok(())
    }

    fn write_next(&self, next: &Path, data: &[u8]) -> Result<()> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(next) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::warn!(path = %next.display(), "cannot save checkpoint, storage is locked");
                return Err(StorageError::Locked(next.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let result = (|| -> Result<()> {
            let written = file.write(data)?;
            tracing::debug!(written, expected = data.len(), "wrote checkpoint bytes");
            if written != data.len() {
                return Err(StorageError::PartialWrite {
                    written,
                    expected: data.len(),
                });
            }
            file.sync_all()?;
            tracing::debug!(path = %next.display(), "fsynced next checkpoint");
            Ok(())
        })();
        drop(file);

        if let Err(e) = result {
            tracing::warn!(path = %next.display(), error = %e, "save failed, unlinking next file");
            if let Err(unlink) = fs::remove_file(next) {
                tracing::error!(path = %next.display(), error = %unlink, "cannot unlink next file");
            }
            return Err(e);
        }
        Ok(())
    }
}

impl CheckpointStore for SessionStorage {
    fn load_checkpoint(&self) -> Result<Vec<u8>> {
        let path = self.session_file();
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no checkpoint yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let expected = file.metadata()?.len() as usize;
        let mut data = vec![0u8; expected];
        let read = if expected == 0 { 0 } else { file.read(&mut data)? };
        if read != expected {
            return Err(StorageError::PartialRead { read, expected });
        }
        tracing::debug!(path = %path.display(), bytes = read, "loaded checkpoint");
        Ok(data)
    }

    fn save_checkpoint(&self, data: &[u8]) -> Result<()> {
        let next = self.next_file();
        let current = self.session_file();
        tracing::debug!(path = %next.display(), bytes = data.len(), "saving checkpoint");

        self.write_next(&next, data)?;

        fs::rename(&next, &current)?;
        tracing::debug!(from = %next.display(), to = %current.display(), "renamed checkpoint");

        sync_dir(&self.location)?;
        tracing::debug!(location = %self.location.display(), "fsynced session directory");
        Ok(())
    }

    fn break_lock(&self) -> Result<()> {
        let next = self.next_file();
        match fs::remove_file(&next) {
            Ok(()) => {
                tracing::warn!(path = %next.display(), "broke storage lock");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
