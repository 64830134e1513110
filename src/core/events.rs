use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Events driving the watch loop
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A snapshot file was written to the inbox and is ready to be checked
    SnapshotReady(SnapshotFile),
    /// Periodic sweep of the whole inbox
    Tick,
    Quit,
}

/// A snapshot file observed in the inbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub path: PathBuf,
    pub observed_at: SystemTime,
}

impl SnapshotFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            observed_at: SystemTime::now(),
        }
    }

    /// Only complete JSON documents are picked up; the scraper's temporary
    /// files and hidden files are ignored.
    pub fn is_snapshot_path<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();
        let is_hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(true, |name| name.starts_with('.'));
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        is_json && !is_hidden
    }
}
