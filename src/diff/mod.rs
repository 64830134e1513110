//! Change detection between course snapshots
//!
//! The engine maps two snapshots of the same course into a list of semantic
//! change records. Every level of the tree (sections, activities and
//! resources, files) is correlated by key through the shared keyed differ;
//! sections additionally get rename detection, and the incremental result
//! goes through the significance filter.

pub mod detector;
pub mod items;
pub mod keyed;
pub mod rename;
pub mod sections;
pub mod significance;
pub mod similarity;

use chrono::{DateTime, Utc};

use crate::config::DetectorConfig;

// Re-export the main types for easier use
pub use detector::ChangeDetector;
pub use items::{diff_files, diff_items, ItemKind};
pub use keyed::{diff_keyed, Keyed, KeyedDiff, KeyedIndex};
pub use rename::{match_titles, RenamePolicy, TitlePairing};
pub use sections::diff_sections;
pub use significance::SignificanceFilter;
pub use similarity::{is_cosmetic_change, normalize, normalized_ratio, ratio, strip_html};

/// Settings and clock shared by the differs of one detection cycle
#[derive(Debug, Clone, Copy)]
pub struct DiffContext<'a> {
    pub config: &'a DetectorConfig,
    /// Stamped on file records; the source has no per-file publish date
    pub detected_at: DateTime<Utc>,
}

impl DiffContext<'_> {
    pub fn rename_policy(&self) -> RenamePolicy {
        RenamePolicy {
            threshold: self.config.rename_threshold,
            accept_extensions: self.config.accept_title_extensions,
            extension_floor: self.config.extension_floor,
        }
    }
}

/// First `max_chars` characters of `text`, with `...` appended when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Convenience function to diff two snapshots with default settings
pub fn detect_changes(
    old: Option<&crate::core::Snapshot>,
    new: &crate::core::Snapshot,
    is_initial_scan: bool,
) -> Vec<crate::core::ChangeRecord> {
    ChangeDetector::default().detect_changes(old, new, is_initial_scan)
}
