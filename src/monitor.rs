//! One scan-diff-persist cycle per course
//!
//! The caller is responsible for serializing cycles of the same course;
//! cycles of different courses are independent. Every cycle, successful or
//! not, is counted in the store's scan statistics.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::CourseRegistry;
use crate::core::{ChangeRecord, Snapshot};
use crate::diff::ChangeDetector;
use crate::stats::ScanStats;
use crate::store::SnapshotStore;

/// Result of checking one course snapshot
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub course_id: String,
    /// Configured display name, if the course is registered
    pub course_name: Option<String>,
    pub course_url: String,
    /// True when no previous snapshot existed and an inventory was produced
    pub initial: bool,
    pub detected_at: DateTime<Utc>,
    pub changes: Vec<ChangeRecord>,
}

impl CheckOutcome {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

pub struct CourseMonitor<S> {
    store: S,
    detector: ChangeDetector,
    courses: CourseRegistry,
}

impl<S: SnapshotStore> CourseMonitor<S> {
    pub fn new(store: S, detector: ChangeDetector) -> Self {
        Self {
            store,
            detector,
            courses: CourseRegistry::default(),
        }
    }

    /// Use configured course names and URLs in outcomes and statistics
    pub fn with_courses(mut self, courses: CourseRegistry) -> Self {
        self.courses = courses;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Diff a freshly scraped snapshot against the stored one, log the
    /// changes and make the new snapshot the reference for the next cycle.
    pub fn check(&self, snapshot: Snapshot) -> Result<CheckOutcome> {
        self.check_at(snapshot, Utc::now())
    }

    pub fn check_at(&self, snapshot: Snapshot, detected_at: DateTime<Utc>) -> Result<CheckOutcome> {
        let course_id = snapshot.course_id.clone();
        let display_name = self.courses.display_name(&course_id);
        let totals = snapshot.totals();
        let items_found = totals.activities + totals.resources;

        let result = self.run_cycle(snapshot, detected_at);

        self.update_stats(|stats| match &result {
            Ok(outcome) => {
                stats.record_scan(&course_id, &display_name, true, items_found, detected_at);
                if outcome.has_changes() {
                    stats.record_notification();
                }
            }
            Err(err) => {
                stats.record_scan(&course_id, &display_name, false, 0, detected_at);
                stats.record_error("check_failed", format!("{:#}", err), Some(course_id.as_str()), detected_at);
            }
        });

        result
    }

    fn run_cycle(&self, snapshot: Snapshot, detected_at: DateTime<Utc>) -> Result<CheckOutcome> {
        let course_id = snapshot.course_id.clone();
        let previous = self
            .store
            .load_snapshot(&course_id)
            .with_context(|| format!("Failed to load previous snapshot of course {}", course_id))?;
        let initial = previous.is_none();

        let changes = self
            .detector
            .detect_changes_at(previous.as_ref(), &snapshot, initial, detected_at);

        if changes.is_empty() {
            tracing::info!(course_id = %course_id, "No changes detected");
        } else {
            tracing::info!(course_id = %course_id, changes = changes.len(), initial, "Changes detected");
            self.store.append_changes(&course_id, &changes, detected_at)?;
        }

        self.store.save_snapshot(&snapshot)?;

        let course_url = match self.courses.url(&course_id) {
            Some(url) if snapshot.url.is_empty() => url.to_string(),
            _ => snapshot.url,
        };

        Ok(CheckOutcome {
            course_name: self.courses.name(&course_id).map(str::to_string),
            course_id,
            course_url,
            initial,
            detected_at,
            changes,
        })
    }

    /// Parse a snapshot file and run [`check`](Self::check) on it
    pub fn check_file<P: AsRef<Path>>(&self, path: P) -> Result<CheckOutcome> {
        let path = path.as_ref();
        let snapshot = Snapshot::from_path(path).and_then(|snapshot| {
            if snapshot.course_id.is_empty() {
                anyhow::bail!("Snapshot {} has no course_id", path.display());
            }
            Ok(snapshot)
        });

        match snapshot {
            Ok(snapshot) => self.check(snapshot),
            Err(err) => {
                self.update_stats(|stats| stats.record_unreadable(format!("{:#}", err), Utc::now()));
                Err(err)
            }
        }
    }

    // Statistics are best effort and never fail a check
    fn update_stats(&self, update: impl FnOnce(&mut ScanStats)) {
        let result = self.store.load_stats().and_then(|mut stats| {
            update(&mut stats);
            self.store.save_stats(&stats)
        });
        if let Err(err) = result {
            tracing::warn!("Failed to update scan statistics: {:#}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActivityType, Item, Section};
    use crate::store::JsonFileStore;
    use tempfile::TempDir;

    fn snapshot(files: &[&str]) -> Snapshot {
        let mut resource = Item::new("Cours", ActivityType::Resource);
        for name in files {
            resource = resource.with_file(*name, format!("https://lms/{}", name));
        }
        Snapshot::new("19984", "https://lms/course/view.php?id=19984")
            .with_section(Section::new("Semaine 1").with_resource(resource))
    }

    #[test]
    fn test_first_check_is_initial_inventory() {
        let temp_dir = TempDir::new().unwrap();
        let monitor = CourseMonitor::new(JsonFileStore::new(temp_dir.path()), ChangeDetector::default());

        let outcome = monitor.check(snapshot(&["cm1.pdf"])).unwrap();
        assert!(outcome.initial);
        assert_eq!(outcome.changes.first().unwrap().type_name(), "initial_scan_start");
        assert!(monitor.store().load_snapshot("19984").unwrap().is_some());
        assert_eq!(monitor.store().change_history("19984").unwrap().len(), 1);
    }

    #[test]
    fn test_incremental_check_logs_only_changes() {
        let temp_dir = TempDir::new().unwrap();
        let monitor = CourseMonitor::new(JsonFileStore::new(temp_dir.path()), ChangeDetector::default());

        monitor.check(snapshot(&["cm1.pdf"])).unwrap();
        let unchanged = monitor.check(snapshot(&["cm1.pdf"])).unwrap();
        assert!(!unchanged.initial);
        assert!(!unchanged.has_changes());

        let outcome = monitor.check(snapshot(&["cm1.pdf", "cm2.pdf"])).unwrap();
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].title(), Some("cm2.pdf"));
        assert_eq!(monitor.store().change_history("19984").unwrap().len(), 2);
    }

    #[test]
    fn test_check_file_requires_course_id() {
        let temp_dir = TempDir::new().unwrap();
        let monitor = CourseMonitor::new(JsonFileStore::new(temp_dir.path().join("store")), ChangeDetector::default());
        let path = temp_dir.path().join("snapshot.json");
        std::fs::write(&path, r#"{"sections": []}"#).unwrap();

        assert!(monitor.check_file(&path).is_err());
        let stats = monitor.store().load_stats().unwrap();
        assert_eq!(stats.failed_scans, 1);
        assert_eq!(stats.errors[0].kind, "unreadable_snapshot");
    }

    #[test]
    fn test_checks_update_stats() {
        let temp_dir = TempDir::new().unwrap();
        let registry = CourseRegistry::new(vec![crate::config::CourseEntry {
            id: "19984".to_string(),
            name: "Génie Civil".to_string(),
            url: String::new(),
        }]);
        let monitor = CourseMonitor::new(JsonFileStore::new(temp_dir.path()), ChangeDetector::default())
            .with_courses(registry);

        let first = monitor.check(snapshot(&["cm1.pdf"])).unwrap();
        assert_eq!(first.course_name.as_deref(), Some("Génie Civil"));
        monitor.check(snapshot(&["cm1.pdf"])).unwrap();

        let stats = monitor.store().load_stats().unwrap();
        assert_eq!(stats.total_scans, 2);
        assert_eq!(stats.successful_scans, 2);
        // Only the initial inventory produced a report
        assert_eq!(stats.total_notifications, 1);
        let course = &stats.courses["19984"];
        assert_eq!(course.name, "Génie Civil");
        assert_eq!(course.total_items_found, 2);
    }

    #[test]
    fn test_failed_check_is_recorded() {
        let temp_dir = TempDir::new().unwrap();
        let monitor = CourseMonitor::new(JsonFileStore::new(temp_dir.path()), ChangeDetector::default());
        // A snapshot of another course stored under this course's name
        std::fs::write(
            temp_dir.path().join("course_19984.json"),
            Snapshot::new("20008", "u").to_json_pretty().unwrap(),
        )
        .unwrap();

        assert!(monitor.check(snapshot(&["cm1.pdf"])).is_err());
        let stats = monitor.store().load_stats().unwrap();
        assert_eq!(stats.failed_scans, 1);
        assert_eq!(stats.courses["19984"].name, "Course 19984");
        assert_eq!(stats.errors[0].course_id.as_deref(), Some("19984"));
    }
}
