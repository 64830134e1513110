//! Configuration management for coursewatch
//!
//! This module provides configuration structures and defaults for the
//! detection engine, the snapshot store, the inbox watcher and report
//! rendering. Values come from defaults, an optional TOML file and
//! `COURSEWATCH_*` environment variables, in that order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Global configuration for coursewatch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoursewatchConfig {
    /// Change detection thresholds
    pub detector: DetectorConfig,
    /// Snapshot and change log storage
    pub store: StoreConfig,
    /// Inbox watching
    pub watch: WatchConfig,
    /// Report rendering
    pub notify: NotifyConfig,
    /// Monitored courses, `[[courses]]` tables
    pub courses: CourseRegistry,
}

/// Tunable thresholds of the detection engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Normalized title similarity above which a section counts as renamed
    pub rename_threshold: f64,
    /// Accept a section title extended with extra trailing words as a rename
    pub accept_title_extensions: bool,
    /// Minimum similarity of an accepted title extension
    pub extension_floor: f64,
    /// Description edits at or above this similarity are dropped as noise
    pub description_threshold: f64,
    /// Added items without files are kept only with longer details than this
    pub min_details_chars: usize,
    /// Description preview length in record details
    pub summary_preview_chars: usize,
}

/// Configuration for the on-disk snapshot store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding course snapshots and change logs
    pub root: PathBuf,
}

/// Configuration for the snapshot inbox watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory the scraper drops snapshot files into
    pub inbox: PathBuf,
    /// Debounce duration for inbox events in milliseconds
    pub event_debounce_ms: u64,
    /// Interval between full inbox sweeps in seconds
    pub poll_interval_secs: u64,
}

/// Configuration for rendered reports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Maximum number of changes listed in one text report
    pub max_changes_per_message: usize,
    /// Maximum characters of record details shown per change
    pub details_preview_chars: usize,
}

/// A monitored course with its display name and page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// Course id -> display name and URL lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseRegistry {
    entries: Vec<CourseEntry>,
}

impl CourseRegistry {
    pub fn new(entries: Vec<CourseEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CourseEntry] {
        &self.entries
    }

    pub fn get(&self, course_id: &str) -> Option<&CourseEntry> {
        self.entries.iter().find(|entry| entry.id == course_id)
    }

    /// Configured name of a course, if any
    pub fn name(&self, course_id: &str) -> Option<&str> {
        self.get(course_id)
            .map(|entry| entry.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Configured name, or `Course <id>` for unlisted courses
    pub fn display_name(&self, course_id: &str) -> String {
        match self.name(course_id) {
            Some(name) => name.to_string(),
            None => format!("Course {}", course_id),
        }
    }

    pub fn url(&self, course_id: &str) -> Option<&str> {
        self.get(course_id)
            .map(|entry| entry.url.as_str())
            .filter(|url| !url.is_empty())
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if entry.id.trim().is_empty() {
                return Err("course id must not be empty".to_string());
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(format!("course {} is listed twice", entry.id));
            }
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            rename_threshold: 0.8,
            accept_title_extensions: true,
            extension_floor: 0.5,
            description_threshold: 0.9,
            min_details_chars: 50,
            summary_preview_chars: 100,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("local_storage"),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            inbox: PathBuf::from("inbox"),
            event_debounce_ms: 500,
            poll_interval_secs: 900, // 15 minutes
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_changes_per_message: 20,
            details_preview_chars: 200,
        }
    }
}

impl WatchConfig {
    /// Get event debounce duration
    pub fn event_debounce_duration(&self) -> Duration {
        Duration::from_millis(self.event_debounce_ms)
    }

    /// Get inbox sweep interval
    pub fn poll_interval_duration(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Configuration loading and management
impl CoursewatchConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load from file when given, then apply environment overrides
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("COURSEWATCH_RENAME_THRESHOLD") {
            if let Ok(threshold) = val.parse::<f64>() {
                self.detector.rename_threshold = threshold;
            }
        }

        if let Ok(val) = std::env::var("COURSEWATCH_DESCRIPTION_THRESHOLD") {
            if let Ok(threshold) = val.parse::<f64>() {
                self.detector.description_threshold = threshold;
            }
        }

        if let Ok(val) = std::env::var("COURSEWATCH_MIN_DETAILS_CHARS") {
            if let Ok(chars) = val.parse::<usize>() {
                self.detector.min_details_chars = chars;
            }
        }

        if let Ok(val) = std::env::var("COURSEWATCH_STORE_DIR") {
            if !val.is_empty() {
                self.store.root = PathBuf::from(val);
            }
        }

        if let Ok(val) = std::env::var("COURSEWATCH_INBOX_DIR") {
            if !val.is_empty() {
                self.watch.inbox = PathBuf::from(val);
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        self.detector.validate()?;
        self.courses.validate()?;

        if self.watch.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be greater than 0".to_string());
        }

        if self.notify.max_changes_per_message == 0 {
            return Err("max_changes_per_message must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.rename_threshold <= 0.0 || self.rename_threshold > 1.0 {
            return Err("rename_threshold must be between 0.0 and 1.0".to_string());
        }

        if self.description_threshold <= 0.0 || self.description_threshold > 1.0 {
            return Err("description_threshold must be between 0.0 and 1.0".to_string());
        }

        if !(0.0..=1.0).contains(&self.extension_floor) {
            return Err("extension_floor must be between 0.0 and 1.0".to_string());
        }

        if self.summary_preview_chars == 0 {
            return Err("summary_preview_chars must be greater than 0".to_string());
        }

        Ok(())
    }
}
