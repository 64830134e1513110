//! Core functionality module
//!
//! Contains the course snapshot model, change records, and inbox watching

pub mod changes;
pub mod events;
pub mod snapshot;
pub mod watcher;

// Re-export main types
pub use changes::{ChangeKind, ChangeRecord};
pub use events::{AppEvent, SnapshotFile};
pub use snapshot::{ActivityType, ContentCounts, CourseFile, Item, Section, Snapshot};
pub use watcher::{pending_snapshots, start_ticker, Debouncer, InboxWatcher};
