use chrono::{DateTime, Utc};

use crate::config::DetectorConfig;
use crate::core::{ChangeKind, ChangeRecord, ContentCounts, Snapshot};

use super::items::{item_summary, ItemKind};
use super::sections::{diff_sections, section_summary};
use super::significance::SignificanceFilter;
use super::DiffContext;

/// Entry point of the change-detection engine.
///
/// Detection is a pure function of two in-memory snapshots: it performs no
/// I/O and holds no mutable state, so one detector can serve any number of
/// courses concurrently.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    config: DetectorConfig,
    filter: SignificanceFilter,
}

impl ChangeDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let filter = SignificanceFilter::new(&config);
        Self { config, filter }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Compare `new` against `old`, or inventory `new` when there is nothing
    /// to compare against or an initial scan is requested.
    pub fn detect_changes(
        &self,
        old: Option<&Snapshot>,
        new: &Snapshot,
        is_initial_scan: bool,
    ) -> Vec<ChangeRecord> {
        self.detect_changes_at(old, new, is_initial_scan, Utc::now())
    }

    /// Same as [`detect_changes`](Self::detect_changes) with an explicit detection time
    pub fn detect_changes_at(
        &self,
        old: Option<&Snapshot>,
        new: &Snapshot,
        is_initial_scan: bool,
        detected_at: DateTime<Utc>,
    ) -> Vec<ChangeRecord> {
        match old {
            Some(old) if !is_initial_scan => {
                let raw = self.raw_changes(old, new, detected_at);
                let raw_count = raw.len();
                let changes = self.filter.apply(raw);
                tracing::debug!(
                    course_id = %new.course_id,
                    raw = raw_count,
                    kept = changes.len(),
                    "Incremental diff complete"
                );
                changes
            }
            _ => self.initial_inventory(new, detected_at),
        }
    }

    /// Unfiltered section-level diff of two snapshots
    pub fn raw_changes(
        &self,
        old: &Snapshot,
        new: &Snapshot,
        detected_at: DateTime<Utc>,
    ) -> Vec<ChangeRecord> {
        let ctx = DiffContext {
            config: &self.config,
            detected_at,
        };
        diff_sections(&ctx, &old.sections, &new.sections)
    }

    /// Full inventory of a snapshot, bracketed by start and completion records.
    ///
    /// `file_date` is the detection time: the course page carries no reliable
    /// per-file publication date.
    pub fn initial_inventory(&self, snapshot: &Snapshot, detected_at: DateTime<Utc>) -> Vec<ChangeRecord> {
        let ctx = DiffContext {
            config: &self.config,
            detected_at,
        };
        let mut records = vec![ChangeRecord::new(
            ChangeKind::InitialScanStart {
                course_id: snapshot.course_id.clone(),
                sections: snapshot.sections.len(),
            },
            "Initial scan of the course",
            format!("Sections: {}", snapshot.sections.len()),
        )];
        let mut totals = ContentCounts::default();

        for section in &snapshot.sections {
            let counts = section.counts();
            totals += counts;
            records.push(ChangeRecord::new(
                ChangeKind::ExistingSection {
                    title: section.title.clone(),
                    counts,
                },
                format!("Section: {}", section.title),
                section_summary(&counts),
            ));

            for activity in &section.activities {
                records.push(ChangeRecord::new(
                    ChangeKind::ExistingActivity {
                        title: activity.title.clone(),
                        section_title: section.title.clone(),
                        activity_type: activity.activity_type,
                        file_count: activity.files.len(),
                    },
                    format!("Activity: {}", activity.title),
                    item_summary(&ctx, ItemKind::Activity, activity),
                ));
                existing_files(&mut records, &activity.files, &activity.title, detected_at);
            }

            for resource in &section.resources {
                records.push(ChangeRecord::new(
                    ChangeKind::ExistingResource {
                        title: resource.title.clone(),
                        section_title: section.title.clone(),
                        file_count: resource.files.len(),
                    },
                    format!("Resource: {}", resource.title),
                    item_summary(&ctx, ItemKind::Resource, resource),
                ));
                existing_files(&mut records, &resource.files, &resource.title, detected_at);
            }
        }

        records.push(ChangeRecord::new(
            ChangeKind::InitialScanComplete {
                sections: snapshot.sections.len(),
                activities: totals.activities,
                resources: totals.resources,
                files: totals.files,
            },
            "Initial scan complete",
            format!(
                "Sections: {}, Activities: {}, Resources: {}, Files: {}",
                snapshot.sections.len(),
                totals.activities,
                totals.resources,
                totals.files
            ),
        ));

        tracing::debug!(
            course_id = %snapshot.course_id,
            records = records.len(),
            "Initial inventory built"
        );
        records
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

fn existing_files(
    records: &mut Vec<ChangeRecord>,
    files: &[crate::core::CourseFile],
    parent_title: &str,
    detected_at: DateTime<Utc>,
) {
    for file in files {
        records.push(ChangeRecord::new(
            ChangeKind::ExistingFile {
                file_name: file.name.clone(),
                parent_title: parent_title.to_string(),
                file_url: file.url.clone(),
                file_date: detected_at,
            },
            format!("File: {}", file.name),
            format!("In: {}", parent_title),
        ));
    }
}
