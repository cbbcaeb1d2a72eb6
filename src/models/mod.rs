// src/models/mod.rs

//! Domain models for the tracker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod event;
mod record;

// Re-export all public types
pub use config::{Config, CrawlerConfig, LoggingConfig, ScanConfig, SiteConfig};
pub use event::{ChangeEvent, ChangeKind};
pub use record::{ItemRecord, ScanCursor, Source};
