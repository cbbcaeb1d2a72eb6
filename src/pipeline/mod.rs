//! Scan pipeline.
//!
//! - `diff`: decides whether a fresh record differs from the stored one
//! - `scan`: walks one listing page
//! - `orchestrator`: walks pages until a stop condition fires

pub mod diff;
pub mod orchestrator;
pub mod scan;

pub use diff::{classify_increase, has_changed, needs_upsert};
pub use orchestrator::{RunSummary, ScanOrchestrator, StopReason};
pub use scan::{PageScan, PageScanner, PageStatus};
