//! Session state, storage, and lifecycle management (engine components C6/C7).

use crate::error::{Error, Result};
use crate::types::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cumulative token usage across a session's assistant messages.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CumulativeUsage {
    pub input: u64,
    pub output: u64,
}

/// The persisted, cloneable state of a session (C6).
///
/// `extra` absorbs any JSON fields this version doesn't recognize so snapshots written by
/// a newer or differently-configured build round-trip without data loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub messages: Vec<Message>,
    pub usage: CumulativeUsage,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl SessionState {
    pub fn new(id: impl Into<String>, now: impl Into<String>) -> Self {
        let now = now.into();
        Self {
            id: id.into(),
            parent_id: None,
            messages: Vec::new(),
            usage: CumulativeUsage::default(),
            metadata: HashMap::new(),
            created_at: now.clone(),
            updated_at: now,
            extra: HashMap::new(),
        }
    }

    pub fn add_usage(&mut self, input: u64, output: u64) {
        self.usage.input += input;
        self.usage.output += output;
    }
}

// ============================================================================
// STORAGE
// ============================================================================

/// Pluggable persistence backend for session snapshots.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save(&self, state: &SessionState) -> Result<()>;
    async fn load(&self, id: &str) -> Result<Option<SessionState>>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list(&self) -> Result<Vec<String>>;
}

/// An in-memory storage backend. Deep-copies on both save and load so callers can never
/// mutate a session's state through an aliased reference into the store.
#[derive(Default)]
pub struct InMemoryStorage {
    states: RwLock<HashMap<String, SessionState>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save(&self, state: &SessionState) -> Result<()> {
        self.states.write().await.insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<SessionState>> {
        Ok(self.states.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.states.write().await.remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.states.read().await.keys().cloned().collect())
    }
}

/// A file-backed storage backend: one JSON file per session at `{dir}/{id}.json`.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn save(&self, state: &SessionState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(self.path_for(&state.id), bytes).await?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<SessionState>> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::Io(err)),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Io(err)),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(err) => return Err(Error::Io(err)),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}

// ============================================================================
// SESSION MANAGER
// ============================================================================

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Configuration controlling how `SessionManager::create` resolves a session.
#[derive(Debug, Clone, Default)]
pub struct CreateConfig {
    pub resume: Option<String>,
    pub fork: Option<String>,
}

/// Owns the set of live sessions by id and coordinates with a [`Storage`] backend for
/// snapshots (C7). Does not itself run turn loops; `client.rs` mutates the `SessionState`
/// it hands out.
pub struct SessionManager {
    storage: Arc<dyn Storage>,
    active: RwLock<HashMap<String, Arc<RwLock<SessionState>>>>,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            active: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, config: CreateConfig) -> Result<Arc<RwLock<SessionState>>> {
        if let Some(id) = config.resume {
            return self.resume(&id).await;
        }
        if let Some(id) = config.fork {
            return self.fork(&id).await;
        }

        let state = SessionState::new(new_session_id(), now_rfc3339());
        self.storage.save(&state).await?;
        let handle = Arc::new(RwLock::new(state));
        self.active.write().await.insert(handle.read().await.id.clone(), handle.clone());
        Ok(handle)
    }

    pub async fn resume(&self, id: &str) -> Result<Arc<RwLock<SessionState>>> {
        if let Some(handle) = self.active.read().await.get(id).cloned() {
            return Ok(handle);
        }

        let state = self
            .storage
            .load(id)
            .await?
            .ok_or_else(|| Error::session_not_found(id))?;
        let handle = Arc::new(RwLock::new(state));
        self.active.write().await.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    pub async fn fork(&self, id: &str) -> Result<Arc<RwLock<SessionState>>> {
        let parent = self
            .storage
            .load(id)
            .await?
            .ok_or_else(|| Error::session_not_found(id))?;

        let mut forked = parent.clone();
        forked.id = new_session_id();
        forked.parent_id = Some(id.to_string());
        let now = now_rfc3339();
        forked.created_at = now.clone();
        forked.updated_at = now;

        self.storage.save(&forked).await?;
        let handle = Arc::new(RwLock::new(forked));
        self.active
            .write()
            .await
            .insert(handle.read().await.id.clone(), handle.clone());
        Ok(handle)
    }

    pub async fn close(&self, id: &str) -> Result<()> {
        let handle = self.active.write().await.remove(id);
        if let Some(handle) = handle {
            let state = handle.read().await;
            self.storage.save(&state).await?;
        }
        Ok(())
    }

    /// Close every active session concurrently.
    pub async fn close_all(&self) -> Result<()> {
        let ids: Vec<String> = self.active.read().await.keys().cloned().collect();
        let results = futures::future::join_all(ids.iter().map(|id| self.close(id))).await;
        for result in results {
            result?;
        }
        Ok(())
    }

    pub async fn is_active(&self, id: &str) -> bool {
        self.active.read().await.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_storage_round_trips() {
        let storage = InMemoryStorage::new();
        let state = SessionState::new("s1", "2026-01-01T00:00:00Z");
        storage.save(&state).await.unwrap();

        let loaded = storage.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.id, "s1");
        assert!(storage.load("missing").await.unwrap().is_none());

        storage.delete("s1").await.unwrap();
        assert!(storage.load("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_storage_save_does_not_alias() {
        let storage = InMemoryStorage::new();
        let mut state = SessionState::new("s1", "2026-01-01T00:00:00Z");
        storage.save(&state).await.unwrap();

        state.usage.input = 999;
        let loaded = storage.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.usage.input, 0);
    }

    #[tokio::test]
    async fn file_storage_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let state = SessionState::new("s1", "2026-01-01T00:00:00Z");
        storage.save(&state).await.unwrap();

        assert!(dir.path().join("s1.json").exists());
        let loaded = storage.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.id, "s1");

        let ids = storage.list().await.unwrap();
        assert_eq!(ids, vec!["s1".to_string()]);

        storage.delete("s1").await.unwrap();
        assert!(storage.load("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_storage_missing_file_returns_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(storage.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn manager_create_then_resume_returns_same_live_session() {
        let manager = SessionManager::new(Arc::new(InMemoryStorage::new()));
        let created = manager.create(CreateConfig::default()).await.unwrap();
        let id = created.read().await.id.clone();

        let resumed = manager.resume(&id).await.unwrap();
        assert!(Arc::ptr_eq(&created, &resumed));
    }

    #[tokio::test]
    async fn manager_resume_missing_snapshot_errors() {
        let manager = SessionManager::new(Arc::new(InMemoryStorage::new()));
        let err = manager.resume("ghost").await.unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn manager_fork_sets_parent_id_and_new_id() {
        let manager = SessionManager::new(Arc::new(InMemoryStorage::new()));
        let created = manager.create(CreateConfig::default()).await.unwrap();
        let id = created.read().await.id.clone();
        manager.close(&id).await.unwrap();

        let forked = manager.fork(&id).await.unwrap();
        let forked_state = forked.read().await;
        assert_eq!(forked_state.parent_id.as_deref(), Some(id.as_str()));
        assert_ne!(forked_state.id, id);
    }

    #[tokio::test]
    async fn manager_close_removes_from_active_and_persists() {
        let storage = Arc::new(InMemoryStorage::new());
        let manager = SessionManager::new(storage.clone());
        let created = manager.create(CreateConfig::default()).await.unwrap();
        let id = created.read().await.id.clone();

        manager.close(&id).await.unwrap();
        assert!(!manager.is_active(&id).await);
        assert!(storage.load(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn manager_close_all_closes_every_active_session() {
        let manager = SessionManager::new(Arc::new(InMemoryStorage::new()));
        manager.create(CreateConfig::default()).await.unwrap();
        manager.create(CreateConfig::default()).await.unwrap();

        manager.close_all().await.unwrap();
        assert_eq!(manager.active.read().await.len(), 0);
    }

    #[test]
    fn session_state_extra_round_trips_unknown_fields() {
        let json = serde_json::json!({
            "id": "s1",
            "messages": [],
            "usage": {"input": 0, "output": 0},
            "metadata": {},
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
            "future_field": "kept"
        });
        let state: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(
            state.extra.get("future_field").and_then(|v| v.as_str()),
            Some("kept")
        );
    }
}
