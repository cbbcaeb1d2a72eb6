//! Record store abstractions.
//!
//! The store keeps the last known [`ItemRecord`] per identifier and the queue
//! of [`ChangeEvent`]s waiting for delivery.
//!
//! ## Directory Structure (`LocalStorage`)
//!
//! ```text
//! storage/
//! ├── config.toml           # Tracker configuration
//! ├── records.json          # Last known record per identifier
//! └── events.json           # Change event queue
//! ```

pub mod local;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ChangeEvent, ItemRecord};
use crate::pipeline::diff::classify_increase;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Trait for record store backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up the stored record for an identifier.
    async fn get(&self, identifier: &str) -> Result<Option<ItemRecord>>;

    /// Insert or replace a record.
    ///
    /// When the sub or dub count grew compared to the stored record, a change
    /// event is queued and returned.
    async fn upsert(&self, record: &ItemRecord) -> Result<Option<ChangeEvent>>;

    /// Events not yet marked as processed, oldest first.
    async fn pending_events(&self) -> Result<Vec<ChangeEvent>>;

    /// Acknowledge events and drop them from the queue. Returns how many
    /// pending events were acknowledged.
    async fn mark_processed(&self, ids: &[String]) -> Result<usize>;

    /// Number of stored records.
    async fn record_count(&self) -> Result<usize>;
}

/// In-memory contents shared by the store backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    pub records: BTreeMap<String, ItemRecord>,
    pub events: Vec<ChangeEvent>,
}

impl StoreState {
    /// Replace the record and queue an event if its counts increased.
    pub fn apply_upsert(&mut self, record: &ItemRecord) -> Option<ChangeEvent> {
        let previous = self.records.get(&record.identifier);
        let event = classify_increase(previous, record)
            .map(|kind| ChangeEvent::new(&record.identifier, &record.title, kind));

        self.records
            .insert(record.identifier.clone(), record.clone());
        if let Some(event) = &event {
            self.events.push(event.clone());
        }
        event
    }

    pub fn pending_events(&self) -> Vec<ChangeEvent> {
        self.events.iter().filter(|e| !e.processed).cloned().collect()
    }

    /// Drop acknowledged events from the queue. Returns how many were dropped.
    pub fn mark_processed(&mut self, ids: &[String]) -> usize {
        let before = self.events.len();
        self.events.retain(|e| !ids.contains(&e.id));
        before - self.events.len()
    }
}
