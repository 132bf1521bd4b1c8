//! Keyed persistence of investigation records for stepwise execution.
//!
//! A session associates one id with one investigation record. The store owns
//! the one mutual-exclusion boundary the orchestrator requires: concurrent
//! stepwise requests against the same session are serialized through
//! [`SessionStore::lock`], while distinct sessions stay fully independent.
//!
//! Two backings are provided: an in-process map for tests and embedding, and
//! a file-per-session store so stepwise mode works across separate CLI
//! invocations. Expiry is the backing store's concern; sessions live until
//! deleted and may be garbage-collected externally.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::Investigation;

/// Errors from session storage.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(Uuid),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Keyed store of investigation records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a fresh record; the record's own id becomes the session id.
    async fn create(&self, record: Investigation) -> Result<Uuid, SessionError>;

    async fn get(&self, id: Uuid) -> Result<Investigation, SessionError>;

    async fn put(&self, id: Uuid, record: Investigation) -> Result<(), SessionError>;

    async fn delete(&self, id: Uuid) -> Result<(), SessionError>;

    async fn list(&self) -> Result<Vec<Uuid>, SessionError>;

    /// Acquire the per-session execution lock. Held across a whole stepwise
    /// execute+merge+put so interleaved merges cannot corrupt the record.
    async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()>;
}

/// Per-session async locks, shared by both store implementations.
///
/// Lock entries are created on demand and live for the process lifetime;
/// they guard in-process access only.
#[derive(Default)]
struct SessionLocks {
    inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// In-process session store backed by a map.
#[derive(Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<Uuid, Investigation>>,
    locks: SessionLocks,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, record: Investigation) -> Result<Uuid, SessionError> {
        let id = record.id;
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, record);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Investigation, SessionError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    async fn put(&self, id: Uuid, record: Investigation) -> Result<(), SessionError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, record);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), SessionError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .map(|_| ())
            .ok_or(SessionError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<Uuid>, SessionError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect())
    }

    async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        self.locks.acquire(id).await
    }
}

/// File-backed session store: one pretty-printed JSON file per session.
pub struct FileSessionStore {
    root: PathBuf,
    locks: SessionLocks,
}

impl FileSessionStore {
    /// Open a store rooted at a sessions directory (created on first write).
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: SessionLocks::default(),
        }
    }

    fn session_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    async fn write_record(&self, id: Uuid, record: &Investigation) -> Result<(), SessionError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SessionError::Storage(format!("creating {}: {e}", self.root.display())))?;

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| SessionError::Storage(format!("serializing session {id}: {e}")))?;

        fs::write(self.session_path(id), json)
            .await
            .map_err(|e| SessionError::Storage(format!("writing session {id}: {e}")))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self, record: Investigation) -> Result<Uuid, SessionError> {
        let id = record.id;
        self.write_record(id, &record).await?;
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Investigation, SessionError> {
        let path = self.session_path(id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(id));
            }
            Err(e) => return Err(SessionError::Storage(format!("reading session {id}: {e}"))),
        };

        serde_json::from_str(&content)
            .map_err(|e| SessionError::Storage(format!("parsing session {id}: {e}")))
    }

    async fn put(&self, id: Uuid, record: Investigation) -> Result<(), SessionError> {
        self.write_record(id, &record).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), SessionError> {
        match fs::remove_file(self.session_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SessionError::NotFound(id)),
            Err(e) => Err(SessionError::Storage(format!("deleting session {id}: {e}"))),
        }
    }

    async fn list(&self) -> Result<Vec<Uuid>, SessionError> {
        let mut sessions = Vec::new();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sessions),
            Err(e) => return Err(SessionError::Storage(format!("listing sessions: {e}"))),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::Storage(format!("listing sessions: {e}")))?
        {
            let name = entry.file_name();
            if let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) {
                if let Ok(id) = Uuid::parse_str(stem) {
                    sessions.push(id);
                }
            }
        }

        Ok(sessions)
    }

    async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        self.locks.acquire(id).await
    }
}
