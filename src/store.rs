//! Key-value store seam.
//!
//! The registry persists items as flat id → JSON mappings grouped into
//! named keyspaces. The trait keeps the backend swappable; everything the
//! crate knows about persistence goes through it.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Backend for one or more flat key → value keyspaces.
///
/// Values are opaque strings (the registry stores serialized JSON).
/// Any backend failure surfaces as [`Error::Store`] so the failure
/// guard can count it.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a single value. Missing keys are `None`, not an error.
    async fn get(&self, space: &str, key: &str) -> Result<Option<String>>;

    /// Write one value, creating the keyspace on first use.
    async fn put(&self, space: &str, key: &str, value: &str) -> Result<()>;

    /// Write several values as one grouped operation. Used by batch
    /// updates; a failure leaves none of the chunk's writes guaranteed.
    async fn put_many(&self, space: &str, entries: &[(String, String)]) -> Result<()>;

    /// Remove a key. Removing a missing key is a no-op.
    async fn delete(&self, space: &str, key: &str) -> Result<()>;

    /// Enumerate all keys in a keyspace.
    async fn keys(&self, space: &str) -> Result<Vec<String>>;
}

type Spaces = HashMap<String, HashMap<String, String>>;

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Ephemeral in-memory backend (tests and demos).
#[derive(Default)]
pub struct MemoryStore {
    spaces: RwLock<Spaces>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, space: &str, key: &str) -> Result<Option<String>> {
        let spaces = self.spaces.read().await;
        Ok(spaces.get(space).and_then(|s| s.get(key)).cloned())
    }

    async fn put(&self, space: &str, key: &str, value: &str) -> Result<()> {
        let mut spaces = self.spaces.write().await;
        spaces
            .entry(space.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn put_many(&self, space: &str, entries: &[(String, String)]) -> Result<()> {
        let mut spaces = self.spaces.write().await;
        let s = spaces.entry(space.to_string()).or_default();
        for (key, value) in entries {
            s.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, space: &str, key: &str) -> Result<()> {
        let mut spaces = self.spaces.write().await;
        if let Some(s) = spaces.get_mut(space) {
            s.remove(key);
        }
        Ok(())
    }

    async fn keys(&self, space: &str) -> Result<Vec<String>> {
        let spaces = self.spaces.read().await;
        Ok(spaces
            .get(space)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// JSON-snapshot backend: the whole keyspace map lives in one file,
/// rewritten after every mutation. Suited to the operator CLI and small
/// datasets, not high write volume.
pub struct FileStore {
    path: PathBuf,
    spaces: RwLock<Spaces>,
}

impl FileStore {
    /// Open or create a store file at the given path.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let spaces = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::Store(format!("corrupt store file {}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Spaces::new(),
            Err(e) => return Err(Error::Store(format!("read {}: {e}", path.display()))),
        };
        Ok(Self {
            path,
            spaces: RwLock::new(spaces),
        })
    }

    /// Write the snapshot to a sibling temp file and rename it over the
    /// old one. A crash mid-write leaves the previous snapshot intact.
    async fn persist(&self, spaces: &Spaces) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(spaces)
            .map_err(|e| Error::Store(format!("serialize store: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| Error::Store(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Store(format!("rename {}: {e}", self.path.display())))
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, space: &str, key: &str) -> Result<Option<String>> {
        let spaces = self.spaces.read().await;
        Ok(spaces.get(space).and_then(|s| s.get(key)).cloned())
    }

    async fn put(&self, space: &str, key: &str, value: &str) -> Result<()> {
        let mut spaces = self.spaces.write().await;
        spaces
            .entry(space.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.persist(&spaces).await
    }

    async fn put_many(&self, space: &str, entries: &[(String, String)]) -> Result<()> {
        let mut spaces = self.spaces.write().await;
        let s = spaces.entry(space.to_string()).or_default();
        for (key, value) in entries {
            s.insert(key.clone(), value.clone());
        }
        self.persist(&spaces).await
    }

    async fn delete(&self, space: &str, key: &str) -> Result<()> {
        let mut spaces = self.spaces.write().await;
        let removed = spaces.get_mut(space).and_then(|s| s.remove(key));
        if removed.is_some() {
            self.persist(&spaces).await?;
        }
        Ok(())
    }

    async fn keys(&self, space: &str) -> Result<Vec<String>> {
        let spaces = self.spaces.read().await;
        Ok(spaces
            .get(space)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default())
    }
}
