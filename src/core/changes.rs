use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::snapshot::{ActivityType, ContentCounts};

/// One semantic change between two course snapshots.
///
/// Records are produced fresh on every detection cycle and never mutated
/// afterwards; the notifier renders them and the changes log appends them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(flatten)]
    pub kind: ChangeKind,
    pub message: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeKind {
    InitialScanStart {
        course_id: String,
        sections: usize,
    },
    ExistingSection {
        title: String,
        counts: ContentCounts,
    },
    ExistingActivity {
        title: String,
        section_title: String,
        activity_type: ActivityType,
        file_count: usize,
    },
    ExistingResource {
        title: String,
        section_title: String,
        file_count: usize,
    },
    ExistingFile {
        file_name: String,
        parent_title: String,
        file_url: String,
        file_date: DateTime<Utc>,
    },
    InitialScanComplete {
        sections: usize,
        activities: usize,
        resources: usize,
        files: usize,
    },
    SectionAdded {
        title: String,
        counts: ContentCounts,
    },
    SectionRemoved {
        title: String,
        counts: ContentCounts,
    },
    SectionRenamed {
        old_title: String,
        new_title: String,
        similarity: f64,
    },
    ActivityAdded {
        title: String,
        activity_type: ActivityType,
        counts: ContentCounts,
    },
    ActivityRemoved {
        title: String,
        activity_type: ActivityType,
        counts: ContentCounts,
    },
    ResourceAdded {
        title: String,
        counts: ContentCounts,
    },
    ResourceRemoved {
        title: String,
        counts: ContentCounts,
    },
    FileAdded {
        file_name: String,
        parent_title: String,
        file_url: String,
        file_date: DateTime<Utc>,
    },
    FileRemoved {
        file_name: String,
        parent_title: String,
    },
    ActivityDescriptionChanged {
        title: String,
        old_description: String,
        new_description: String,
    },
}

impl ChangeKind {
    /// Wire name of the kind, as it appears in the `type` field
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::InitialScanStart { .. } => "initial_scan_start",
            Self::ExistingSection { .. } => "existing_section",
            Self::ExistingActivity { .. } => "existing_activity",
            Self::ExistingResource { .. } => "existing_resource",
            Self::ExistingFile { .. } => "existing_file",
            Self::InitialScanComplete { .. } => "initial_scan_complete",
            Self::SectionAdded { .. } => "section_added",
            Self::SectionRemoved { .. } => "section_removed",
            Self::SectionRenamed { .. } => "section_renamed",
            Self::ActivityAdded { .. } => "activity_added",
            Self::ActivityRemoved { .. } => "activity_removed",
            Self::ResourceAdded { .. } => "resource_added",
            Self::ResourceRemoved { .. } => "resource_removed",
            Self::FileAdded { .. } => "file_added",
            Self::FileRemoved { .. } => "file_removed",
            Self::ActivityDescriptionChanged { .. } => "activity_description_changed",
        }
    }

    /// True for the inventory records emitted by an initial scan
    pub fn is_inventory(&self) -> bool {
        matches!(
            self,
            Self::InitialScanStart { .. }
                | Self::ExistingSection { .. }
                | Self::ExistingActivity { .. }
                | Self::ExistingResource { .. }
                | Self::ExistingFile { .. }
                | Self::InitialScanComplete { .. }
        )
    }
}

impl ChangeRecord {
    pub fn new(kind: ChangeKind, message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Prior (or new) size of the node the record is about, when it has one
    pub fn counts(&self) -> Option<ContentCounts> {
        match &self.kind {
            ChangeKind::ExistingSection { counts, .. }
            | ChangeKind::SectionAdded { counts, .. }
            | ChangeKind::SectionRemoved { counts, .. }
            | ChangeKind::ActivityAdded { counts, .. }
            | ChangeKind::ActivityRemoved { counts, .. }
            | ChangeKind::ResourceAdded { counts, .. }
            | ChangeKind::ResourceRemoved { counts, .. } => Some(*counts),
            ChangeKind::ExistingActivity { file_count, .. }
            | ChangeKind::ExistingResource { file_count, .. } => {
                Some(ContentCounts::files(*file_count))
            }
            _ => None,
        }
    }

    /// Title of the node the record is about (file name for file records)
    pub fn title(&self) -> Option<&str> {
        match &self.kind {
            ChangeKind::ExistingSection { title, .. }
            | ChangeKind::ExistingActivity { title, .. }
            | ChangeKind::ExistingResource { title, .. }
            | ChangeKind::SectionAdded { title, .. }
            | ChangeKind::SectionRemoved { title, .. }
            | ChangeKind::ActivityAdded { title, .. }
            | ChangeKind::ActivityRemoved { title, .. }
            | ChangeKind::ResourceAdded { title, .. }
            | ChangeKind::ResourceRemoved { title, .. }
            | ChangeKind::ActivityDescriptionChanged { title, .. } => Some(title.as_str()),
            ChangeKind::SectionRenamed { new_title, .. } => Some(new_title.as_str()),
            ChangeKind::ExistingFile { file_name, .. }
            | ChangeKind::FileAdded { file_name, .. }
            | ChangeKind::FileRemoved { file_name, .. } => Some(file_name.as_str()),
            ChangeKind::InitialScanStart { .. } | ChangeKind::InitialScanComplete { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_with_type_tag() {
        let record = ChangeRecord::new(
            ChangeKind::SectionRenamed {
                old_title: "Cours 1".to_string(),
                new_title: "Cours 1 - 2024".to_string(),
                similarity: 0.82,
            },
            "Section renamed: Cours 1 -> Cours 1 - 2024",
            "Similarity: 82%",
        );

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "section_renamed");
        assert_eq!(json["old_title"], "Cours 1");
        assert_eq!(json["message"], "Section renamed: Cours 1 -> Cours 1 - 2024");

        let back: ChangeRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_counts_and_title_accessors() {
        let record = ChangeRecord::new(
            ChangeKind::ResourceRemoved {
                title: "Slides".to_string(),
                counts: ContentCounts::files(3),
            },
            "Resource removed: Slides",
            "Files: 3",
        );

        assert_eq!(record.type_name(), "resource_removed");
        assert_eq!(record.title(), Some("Slides"));
        assert_eq!(record.counts().unwrap().files, 3);
        assert!(!record.kind.is_inventory());
    }
}
