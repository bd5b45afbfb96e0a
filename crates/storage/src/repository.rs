//! Session repository: the directory that holds all stored sessions.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use benchplan_core::{SessionId, Time};
use serde::{Deserialize, Serialize};

use super::session_storage::{SessionStorage, SESSION_DIR_SUFFIX};
use super::{Result, StorageError};

/// Where sessions live on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory; sessions go under `<base_dir>/sessions`
    pub base_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/var/tmp/benchplan"),
        }
    }
}

/// Creates, enumerates and opens session storages.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    base_dir: PathBuf,
}

impl SessionRepository {
    /// Create a repository handle. Nothing is touched on disk yet.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
        }
    }

    /// Directory holding the session directories.
    pub fn sessions_dir(&self) -> PathBuf {
        self.base_dir.join("sessions")
    }

    /// Directory of a given session.
    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.sessions_dir()
            .join(format!("{}{}", id, SESSION_DIR_SUFFIX))
    }

    /// Create a fresh session named `<prefix><timestamp>`, adding a
    /// `_(n)` counter if that name is taken.
    pub fn create(&self, prefix: &str, now: Time) -> Result<SessionStorage> {
        create_dir(&self.sessions_dir())?;

        let base_id = SessionId::timestamped(prefix, now);
        let mut id = base_id.clone();
        let mut uniq = 1;
        loop {
            let dir = self.session_dir(&id);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    set_mode(&dir)?;
                    break;
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    id = base_id.with_counter(uniq);
                    uniq += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let storage = SessionStorage::open(self.session_dir(&id));
        create_dir(&storage.io_logs())?;
        tracing::debug!(location = %storage.location().display(), "created new storage");
        Ok(storage)
    }

    /// Open an existing session.
    pub fn open(&self, id: &SessionId) -> Result<SessionStorage> {
        let dir = self.session_dir(id);
        if !dir.is_dir() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(SessionStorage::open(dir))
    }

    /// All stored sessions, youngest first. A missing repository is empty.
    pub fn list(&self) -> Result<Vec<SessionStorage>> {
        let repo = self.sessions_dir();
        tracing::debug!(path = %repo.display(), "enumerating sessions");
        let entries = match fs::read_dir(&repo) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // symlink_metadata so links are never followed
            let meta = fs::symlink_metadata(entry.path())?;
            if name.starts_with('.') || !name.ends_with(SESSION_DIR_SUFFIX) || !meta.is_dir() {
                continue;
            }
            let modified = meta.modified()?;
            found.push((modified, SessionStorage::open(entry.path())));
        }
        found.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(found.into_iter().map(|(_, storage)| storage).collect())
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        set_mode(dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_dir: &Path) -> Result<()> {
    Ok(())
}
