pub mod cli;
pub mod config;
pub mod core;
pub mod diff;
pub mod export;
pub mod monitor;
pub mod stats;
pub mod store;

pub use crate::core::*;
pub use config::{CourseRegistry, CoursewatchConfig, DetectorConfig};
pub use diff::{detect_changes, ChangeDetector, SignificanceFilter};
pub use monitor::{CheckOutcome, CourseMonitor};
pub use stats::ScanStats;
pub use store::{JsonFileStore, SnapshotStore};
