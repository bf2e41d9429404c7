//! Session storage.
//!
//! A session is saved whenever it suspends for approval and deleted when it
//! terminates or is reset. Two backends are provided:
//!
//! - [`MemorySessionStore`]: process-local, for tests and one-shot runs.
//! - [`FileSessionStore`]: one JSON document per session, `<dir>/<id>.json`,
//!   so a suspended session survives a restart of the CLI.
//!
//! Both keep the state serialized so that anything that could not survive a
//! round trip through JSON fails here rather than on resume.

use crate::state::WorkflowState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Listing entry for a stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub phase: String,
    pub device: String,
    pub steps_completed: usize,
    pub steps_remaining: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkflowState> for SessionInfo {
    fn from(state: &WorkflowState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            phase: state.phase.label().to_string(),
            device: state.target.key(),
            steps_completed: state.plan.history().len(),
            steps_remaining: state.plan.remaining().len(),
            updated_at: state.updated_at,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, state: &WorkflowState) -> Result<(), StoreError>;

    async fn load(&self, session_id: &str) -> Result<Option<WorkflowState>, StoreError>;

    /// Returns whether a session was removed.
    async fn delete(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Stored sessions, most recently updated first.
    async fn list(&self) -> Result<Vec<SessionInfo>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid session id '{0}'. Use only letters, digits, '_' or '-'.")]
    InvalidSessionId(String),

    #[error("session store lock poisoned")]
    LockError,
}

/// Session ids become file names, so they are restricted to `[A-Za-z0-9_-]`.
pub fn validate_session_id(session_id: &str) -> Result<(), StoreError> {
    if session_id.is_empty()
        || !session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(StoreError::InvalidSessionId(session_id.to_string()));
    }
    Ok(())
}

fn sort_newest_first(sessions: &mut [SessionInfo]) {
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, state: &WorkflowState) -> Result<(), StoreError> {
        validate_session_id(&state.session_id)?;
        let json = serde_json::to_string(state)?;
        self.sessions
            .write()
            .map_err(|_| StoreError::LockError)?
            .insert(state.session_id.clone(), json);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<WorkflowState>, StoreError> {
        validate_session_id(session_id)?;
        let sessions = self.sessions.read().map_err(|_| StoreError::LockError)?;
        sessions
            .get(session_id)
            .map(|json| serde_json::from_str(json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        validate_session_id(session_id)?;
        Ok(self
            .sessions
            .write()
            .map_err(|_| StoreError::LockError)?
            .remove(session_id)
            .is_some())
    }

    async fn list(&self) -> Result<Vec<SessionInfo>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::LockError)?;
        let mut infos = Vec::with_capacity(sessions.len());
        for json in sessions.values() {
            let state: WorkflowState = serde_json::from_str(json)?;
            infos.push(SessionInfo::from(&state));
        }
        sort_newest_first(&mut infos);
        Ok(infos)
    }
}

/// One JSON file per session.
#[derive(Debug)]
pub struct FileSessionStore {
    directory: PathBuf,
}

impl FileSessionStore {
    /// Create the store, creating `directory` if it does not exist.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, StoreError> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.directory.join(format!("{session_id}.json"))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, state: &WorkflowState) -> Result<(), StoreError> {
        validate_session_id(&state.session_id)?;
        let json = serde_json::to_vec_pretty(state)?;

        // Write then rename so a crash never leaves a half-written session.
        let path = self.session_path(&state.session_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(session_id = %state.session_id, path = %path.display(), "Saved session");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<WorkflowState>, StoreError> {
        validate_session_id(session_id)?;
        match tokio::fs::read(self.session_path(session_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        validate_session_id(session_id)?;
        match tokio::fs::remove_file(self.session_path(session_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<SessionInfo>, StoreError> {
        let mut infos = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<WorkflowState>(&bytes) {
                Ok(state) => infos.push(SessionInfo::from(&state)),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable session file"
                    );
                }
            }
        }
        sort_newest_first(&mut infos);
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;
    use netmend_core::{
        ActionPlan, DeviceFacts, DeviceTarget, FaultSummary, TroubleshootingStep,
        WorkflowSettings,
    };

    fn suspended(id: &str) -> WorkflowState {
        let mut s = WorkflowState::new(
            id,
            "alert",
            FaultSummary::default(),
            DeviceTarget::new("r1", "cisco_ios"),
            DeviceFacts::from_device_type("r1", "cisco_ios"),
            WorkflowSettings::default(),
        );
        s.plan = ActionPlan::new(vec![
            TroubleshootingStep::diagnostic("one", ["show one"]),
            TroubleshootingStep::diagnostic("two", ["show two"]),
        ]);
        s.plan.dequeue().unwrap();
        s.phase = Phase::AwaitingApproval {
            prompt: "Approve?".into(),
        };
        s
    }

    #[test]
    fn session_id_validation() {
        assert!(validate_session_id("abc-123_X").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("../etc/passwd").is_err());
        assert!(validate_session_id("a b").is_err());
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let state = suspended("s1");
        store.save(&state).await.unwrap();

        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(store.load("missing").await.unwrap().is_none());

        assert!(store.delete("s1").await.unwrap());
        assert!(!store.delete("s1").await.unwrap());
    }

    #[tokio::test]
    async fn file_store_round_trip_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("sessions")).unwrap();

        let a = suspended("a");
        let mut b = suspended("b");
        b.updated_at = a.updated_at + chrono::Duration::seconds(5);
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();

        assert_eq!(store.load("a").await.unwrap().unwrap(), a);

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].session_id, "b");
        assert_eq!(list[0].phase, "awaiting_approval");
        assert_eq!(list[0].steps_remaining, 1);

        assert!(store.delete("a").await.unwrap());
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.load("../x").await,
            Err(StoreError::InvalidSessionId(_))
        ));
    }
}
