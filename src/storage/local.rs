//! Local filesystem storage implementation.
//!
//! Keeps records and the event queue as pretty-printed JSON files. Files are
//! loaded once, cached in memory and rewritten atomically after every change.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── records.json          # identifier -> ItemRecord
//! └── events.json           # ChangeEvent queue
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{AppError, Result};
use crate::models::{ChangeEvent, ItemRecord};
use crate::storage::{RecordStore, StoreState};

const RECORDS_KEY: &str = "records.json";
const EVENTS_KEY: &str = "events.json";

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    state: Mutex<Option<StoreState>>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            state: Mutex::new(None),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(|e| {
                AppError::store(format!("{} is corrupt: {}", self.path(key).display(), e))
            })?)),
            None => Ok(None),
        }
    }

    /// Lock the cached state, loading it from disk on first use.
    async fn state(&self) -> Result<MutexGuard<'_, Option<StoreState>>> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            let records = self.read_json(RECORDS_KEY).await?.unwrap_or_default();
            let events: Vec<ChangeEvent> =
                self.read_json(EVENTS_KEY).await?.unwrap_or_default();
            *guard = Some(StoreState {
                records,
                events: events.into_iter().filter(|e| !e.processed).collect(),
            });
        }
        Ok(guard)
    }

    async fn persist_records(&self, state: &StoreState) -> Result<()> {
        self.write_json(RECORDS_KEY, &state.records).await
    }

    async fn persist_events(&self, state: &StoreState) -> Result<()> {
        self.write_json(EVENTS_KEY, &state.events).await
    }
}

/// Borrow the loaded state out of a guard filled by `LocalStorage::state`.
fn loaded(guard: &mut Option<StoreState>) -> &mut StoreState {
    guard.get_or_insert_with(StoreState::default)
}

#[async_trait]
impl RecordStore for LocalStorage {
    async fn get(&self, identifier: &str) -> Result<Option<ItemRecord>> {
        let mut guard = self.state().await?;
        Ok(loaded(&mut guard).records.get(identifier).cloned())
    }

    async fn upsert(&self, record: &ItemRecord) -> Result<Option<ChangeEvent>> {
        let mut guard = self.state().await?;
        let cached = loaded(&mut guard);

        // Work on a copy so a failed write leaves the cache as it is on disk.
        let mut next = cached.clone();
        let event = next.apply_upsert(record);

        // Events go first: a record on disk without its event would never
        // be announced again.
        if let Some(event) = &event {
            self.persist_events(&next).await?;
            log::info!(
                "Queued {} event for '{}' ({})",
                event.kind,
                event.title,
                event.identifier
            );
        }
        self.persist_records(&next).await?;

        *cached = next;
        Ok(event)
    }

    async fn pending_events(&self) -> Result<Vec<ChangeEvent>> {
        let mut guard = self.state().await?;
        Ok(loaded(&mut guard).pending_events())
    }

    async fn mark_processed(&self, ids: &[String]) -> Result<usize> {
        let mut guard = self.state().await?;
        let cached = loaded(&mut guard);

        let mut next = cached.clone();
        let updated = next.mark_processed(ids);
        if updated > 0 {
            self.persist_events(&next).await?;
            *cached = next;
        }
        Ok(updated)
    }

    async fn record_count(&self) -> Result<usize> {
        let mut guard = self.state().await?;
        Ok(loaded(&mut guard).records.len())
    }
}
