//! In-process record store.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{ChangeEvent, ItemRecord};
use crate::storage::{RecordStore, StoreState};

/// Record store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<StoreState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with records, without queuing events.
    pub fn with_records(records: impl IntoIterator<Item = ItemRecord>) -> Self {
        let state = StoreState {
            records: records
                .into_iter()
                .map(|r| (r.identifier.clone(), r))
                .collect(),
            events: Vec::new(),
        };
        Self {
            state: Mutex::new(state),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStorage {
    async fn get(&self, identifier: &str) -> Result<Option<ItemRecord>> {
        Ok(self.state.lock().await.records.get(identifier).cloned())
    }

    async fn upsert(&self, record: &ItemRecord) -> Result<Option<ChangeEvent>> {
        Ok(self.state.lock().await.apply_upsert(record))
    }

    async fn pending_events(&self) -> Result<Vec<ChangeEvent>> {
        Ok(self.state.lock().await.pending_events())
    }

    async fn mark_processed(&self, ids: &[String]) -> Result<usize> {
        Ok(self.state.lock().await.mark_processed(ids))
    }

    async fn record_count(&self) -> Result<usize> {
        Ok(self.state.lock().await.records.len())
    }
}
