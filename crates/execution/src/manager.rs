//! Session manager: a session state bound to its storage.

use std::sync::Arc;

use benchplan_core::{JobDefinition, SessionId, Time};
use benchplan_storage::{CheckpointStore, SessionRepository, SessionStorage};
use tracing::{debug, info};

use crate::error::Result;
use crate::job_state::DEFAULT_ATTEMPTS;
use crate::metadata::SessionMetadata;
use crate::snapshot::SessionSnapshot;
use crate::state::SessionState;

/// Owns the state of one session and checkpoints it to disk.
#[derive(Debug)]
pub struct SessionManager {
    storage: SessionStorage,
    state: SessionState,
    default_attempts: u32,
}

impl SessionManager {
    /// Create a new session in `repository`.
    pub fn create(
        repository: &SessionRepository,
        prefix: &str,
        now: Time,
        job_list: Vec<Arc<JobDefinition>>,
    ) -> Result<Self> {
        let storage = repository.create(prefix, now)?;
        info!(session_id = %storage.id(), "created session");
        Ok(Self {
            storage,
            state: SessionState::new(job_list),
            default_attempts: DEFAULT_ATTEMPTS,
        })
    }

    /// Load a stored session. A never-checkpointed session comes back fresh.
    /// Jobs without saved attempts get `default_attempts`.
    pub fn load(
        storage: SessionStorage,
        job_list: Vec<Arc<JobDefinition>>,
        default_attempts: u32,
    ) -> Result<Self> {
        let data = storage.load_checkpoint()?;
        let state = if data.is_empty() {
            debug!(session_id = %storage.id(), "empty checkpoint, starting fresh");
            let mut state = SessionState::new(job_list);
            state.reset_attempts(default_attempts);
            state
        } else {
            SessionSnapshot::from_bytes(&data)?.restore(job_list, default_attempts)?
        };
        info!(session_id = %storage.id(), "loaded session");
        Ok(Self {
            storage,
            state,
            default_attempts,
        })
    }

    /// Read only the metadata of a stored session.
    pub fn peek_metadata(storage: &SessionStorage) -> Result<Option<SessionMetadata>> {
        let data = storage.load_checkpoint()?;
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(SessionSnapshot::from_bytes(&data)?.metadata))
    }

    /// Set the attempts every job starts with.
    pub fn set_default_attempts(&mut self, attempts: u32) {
        self.default_attempts = attempts;
        self.state.reset_attempts(attempts);
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        self.storage.id()
    }

    /// Backing storage.
    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    /// Session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Mutable session state.
    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Write the current state to disk.
    pub fn checkpoint(&self) -> Result<()> {
        let data = SessionSnapshot::capture(&self.state, self.default_attempts).to_bytes()?;
        self.storage.save_checkpoint(&data)?;
        debug!(session_id = %self.storage.id(), bytes = data.len(), "checkpoint saved");
        Ok(())
    }

    /// Delete the session from disk.
    pub fn destroy(self) -> Result<()> {
        info!(session_id = %self.storage.id(), "destroying session");
        self.storage.remove()?;
        Ok(())
    }
}
