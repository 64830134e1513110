//! Snapshot persistence and the changes log
//!
//! Snapshots are replaced wholesale on every cycle, keyed by course id.
//! Change batches are appended as separate timestamped log entries so the
//! history of a course can be queried later.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ChangeRecord, Snapshot};
use crate::stats::ScanStats;

const STATS_FILE: &str = "scan_stats.json";

/// One appended batch of changes for a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub course_id: String,
    pub timestamp: DateTime<Utc>,
    pub changes: Vec<ChangeRecord>,
}

/// Storage backend for snapshots and change logs
pub trait SnapshotStore {
    /// Last stored snapshot of a course, `None` if the course was never scanned
    fn load_snapshot(&self, course_id: &str) -> Result<Option<Snapshot>>;

    /// Replace the stored snapshot of `snapshot.course_id`
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Append a batch of changes to the course history
    fn append_changes(&self, course_id: &str, changes: &[ChangeRecord], at: DateTime<Utc>) -> Result<()>;

    /// Stored change batches of a course, oldest first
    fn change_history(&self, course_id: &str) -> Result<Vec<ChangeLogEntry>>;

    /// Scan statistics, fresh ones if none were saved yet
    fn load_stats(&self) -> Result<ScanStats>;

    fn save_stats(&self, stats: &ScanStats) -> Result<()>;
}

/// JSON files in a single directory:
/// `course_<id>.json` and `changes_log_<id>_<unix_ts>.json`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, course_id: &str) -> PathBuf {
        self.root.join(format!("course_{}.json", file_key(course_id)))
    }

    fn log_prefix(course_id: &str) -> String {
        format!("changes_log_{}_", file_key(course_id))
    }

    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create store directory {}", self.root.display()))
    }
}

impl SnapshotStore for JsonFileStore {
    fn load_snapshot(&self, course_id: &str) -> Result<Option<Snapshot>> {
        let path = self.snapshot_path(course_id);
        if !path.exists() {
            return Ok(None);
        }
        let snapshot = Snapshot::from_path(&path)?;
        if snapshot.course_id != course_id {
            anyhow::bail!(
                "Snapshot {} belongs to course {:?}, not {:?}",
                path.display(),
                snapshot.course_id,
                course_id
            );
        }
        Ok(Some(snapshot))
    }

    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.ensure_root()?;
        let path = self.snapshot_path(&snapshot.course_id);
        write_replacing(&path, &snapshot.to_json_pretty()?)?;

        tracing::info!(course_id = %snapshot.course_id, path = %path.display(), "Snapshot saved");
        Ok(())
    }

    fn append_changes(&self, course_id: &str, changes: &[ChangeRecord], at: DateTime<Utc>) -> Result<()> {
        self.ensure_root()?;
        let entry = ChangeLogEntry {
            course_id: course_id.to_string(),
            timestamp: at,
            changes: changes.to_vec(),
        };

        // Several batches in the same second get a numeric suffix
        let base = format!("{}{}", Self::log_prefix(course_id), at.timestamp());
        let mut path = self.root.join(format!("{}.json", base));
        let mut suffix = 1;
        while path.exists() {
            path = self.root.join(format!("{}-{}.json", base, suffix));
            suffix += 1;
        }

        let json = serde_json::to_string_pretty(&entry).context("Failed to serialize change log")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!(course_id, changes = changes.len(), path = %path.display(), "Change log appended");
        Ok(())
    }

    fn change_history(&self, course_id: &str) -> Result<Vec<ChangeLogEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let prefix = Self::log_prefix(course_id);
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list {}", self.root.display()))?
        {
            let path = dir_entry?.path();
            let is_log = path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.starts_with(&prefix) && name.ends_with(".json"));
            if !is_log {
                continue;
            }

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            match serde_json::from_str::<ChangeLogEntry>(&content) {
                // Prefixes can overlap once ids are sanitized
                Ok(entry) if entry.course_id == course_id => entries.push(entry),
                Ok(_) => {}
                Err(err) => tracing::warn!(path = %path.display(), "Skipping unreadable change log: {}", err),
            }
        }

        entries.sort_by_key(|entry| entry.timestamp);
        Ok(entries)
    }

    fn load_stats(&self) -> Result<ScanStats> {
        let path = self.root.join(STATS_FILE);
        if !path.exists() {
            return Ok(ScanStats::new(Utc::now()));
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid stats file {}", path.display()))
    }

    fn save_stats(&self, stats: &ScanStats) -> Result<()> {
        self.ensure_root()?;
        let json = serde_json::to_string_pretty(stats).context("Failed to serialize scan stats")?;
        write_replacing(&self.root.join(STATS_FILE), &json)
    }
}

// Write then rename; readers never see a truncated file
fn write_replacing(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))
}

// Course ids become file name components. ASCII alphanumerics and '-' are
// kept, every other byte is written as `_xx`, so distinct ids never share a file.
fn file_key(course_id: &str) -> String {
    if course_id.is_empty() {
        return "_".to_string();
    }
    let mut key = String::with_capacity(course_id.len());
    for byte in course_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            key.push(byte as char);
        } else {
            key.push_str(&format!("_{:02x}", byte));
        }
    }
    key
}
