use crate::core::{ChangeKind, ChangeRecord, CourseFile, Item};

use super::keyed::diff_keyed;
use super::{preview, DiffContext};

/// Which list of a section is being compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Activity,
    Resource,
}

/// Compare the activities (or resources) of one section by exact title.
///
/// Titles present on both sides are descended into: their files are
/// compared and, for activities, the description is compared verbatim.
/// Whether a description edit is worth reporting is decided later by the
/// significance filter.
pub fn diff_items(
    ctx: &DiffContext<'_>,
    kind: ItemKind,
    old_items: &[Item],
    new_items: &[Item],
) -> Vec<ChangeRecord> {
    let diff = diff_keyed(old_items, new_items);
    if diff.collapsed > 0 {
        tracing::warn!(
            collapsed = diff.collapsed,
            ?kind,
            "Duplicate titles collapsed, last occurrence kept"
        );
    }

    let mut changes = Vec::new();

    for item in diff.added {
        changes.push(added_record(ctx, kind, item));
    }

    for item in diff.removed {
        changes.push(removed_record(ctx, kind, item));
    }

    for (old_item, new_item) in diff.common {
        changes.extend(diff_files(ctx, &old_item.files, &new_item.files, &old_item.title));

        if kind == ItemKind::Activity && old_item.description != new_item.description {
            changes.push(description_record(ctx, old_item, new_item));
        }
    }

    changes
}

/// Compare the files of one activity or resource by name.
///
/// A file keeping its name is assumed unchanged; its URL is not compared.
pub fn diff_files(
    ctx: &DiffContext<'_>,
    old_files: &[CourseFile],
    new_files: &[CourseFile],
    parent_title: &str,
) -> Vec<ChangeRecord> {
    let diff = diff_keyed(old_files, new_files);
    let mut changes = Vec::with_capacity(diff.added.len() + diff.removed.len());

    for file in diff.added {
        let url = if file.url.is_empty() { "N/A" } else { file.url.as_str() };
        changes.push(ChangeRecord::new(
            ChangeKind::FileAdded {
                file_name: file.name.clone(),
                parent_title: parent_title.to_string(),
                file_url: file.url.clone(),
                file_date: ctx.detected_at,
            },
            format!("New file added: {}", file.name),
            format!("In: {}\nURL: {}", parent_title, url),
        ));
    }

    for file in diff.removed {
        changes.push(ChangeRecord::new(
            ChangeKind::FileRemoved {
                file_name: file.name.clone(),
                parent_title: parent_title.to_string(),
            },
            format!("File removed: {}", file.name),
            format!("In: {}", parent_title),
        ));
    }

    changes
}

/// Human summary of an activity or resource: type, file count, description
pub fn item_summary(ctx: &DiffContext<'_>, kind: ItemKind, item: &Item) -> String {
    let description = preview(&item.description, ctx.config.summary_preview_chars);
    match kind {
        ItemKind::Activity => format!(
            "Type: {}, Files: {}\nDescription: {}",
            item.activity_type,
            item.files.len(),
            description
        ),
        ItemKind::Resource => format!(
            "Files: {}\nDescription: {}",
            item.files.len(),
            description
        ),
    }
}

fn added_record(ctx: &DiffContext<'_>, kind: ItemKind, item: &Item) -> ChangeRecord {
    let details = item_summary(ctx, kind, item);
    match kind {
        ItemKind::Activity => ChangeRecord::new(
            ChangeKind::ActivityAdded {
                title: item.title.clone(),
                activity_type: item.activity_type,
                counts: item.counts(),
            },
            format!("New activity added: {}", item.title),
            details,
        ),
        ItemKind::Resource => ChangeRecord::new(
            ChangeKind::ResourceAdded {
                title: item.title.clone(),
                counts: item.counts(),
            },
            format!("New resource added: {}", item.title),
            details,
        ),
    }
}

fn removed_record(ctx: &DiffContext<'_>, kind: ItemKind, item: &Item) -> ChangeRecord {
    let details = item_summary(ctx, kind, item);
    match kind {
        ItemKind::Activity => ChangeRecord::new(
            ChangeKind::ActivityRemoved {
                title: item.title.clone(),
                activity_type: item.activity_type,
                counts: item.counts(),
            },
            format!("Activity removed: {}", item.title),
            details,
        ),
        ItemKind::Resource => ChangeRecord::new(
            ChangeKind::ResourceRemoved {
                title: item.title.clone(),
                counts: item.counts(),
            },
            format!("Resource removed: {}", item.title),
            details,
        ),
    }
}

fn description_record(ctx: &DiffContext<'_>, old_item: &Item, new_item: &Item) -> ChangeRecord {
    let limit = ctx.config.summary_preview_chars;
    ChangeRecord::new(
        ChangeKind::ActivityDescriptionChanged {
            title: old_item.title.clone(),
            old_description: old_item.description.clone(),
            new_description: new_item.description.clone(),
        },
        format!("Description changed for activity: {}", old_item.title),
        format!(
            "Old: {}\nNew: {}",
            preview(&old_item.description, limit),
            preview(&new_item.description, limit)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::core::ActivityType;
    use chrono::Utc;

    fn ctx(config: &DetectorConfig) -> DiffContext<'_> {
        DiffContext {
            config,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_file_added_and_removed() {
        let config = DetectorConfig::default();
        let ctx = ctx(&config);
        let old = Item::new("R", ActivityType::Resource)
            .with_file("a.pdf", "https://lms/a.pdf")
            .with_file("old.pdf", "");
        let new = Item::new("R", ActivityType::Resource)
            .with_file("a.pdf", "https://lms/a-v2.pdf")
            .with_file("b.pdf", "");

        let changes = diff_files(&ctx, &old.files, &new.files, "R");
        assert_eq!(changes.len(), 2);
        match &changes[0].kind {
            ChangeKind::FileAdded { file_name, parent_title, file_date, .. } => {
                assert_eq!(file_name, "b.pdf");
                assert_eq!(parent_title, "R");
                assert_eq!(*file_date, ctx.detected_at);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(changes[0].details.contains("URL: N/A"));
        assert_eq!(changes[1].type_name(), "file_removed");
    }

    #[test]
    fn test_activity_description_compared_verbatim() {
        let config = DetectorConfig::default();
        let ctx = ctx(&config);
        let old = vec![Item::new("Devoir 1", ActivityType::Assignment).with_description("A rendre lundi")];
        let new = vec![Item::new("Devoir 1", ActivityType::Assignment).with_description("A rendre lundi.")];

        let changes = diff_items(&ctx, ItemKind::Activity, &old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].type_name(), "activity_description_changed");
        assert_eq!(changes[0].details, "Old: A rendre lundi\nNew: A rendre lundi.");

        // Resources never report description edits
        let changes = diff_items(&ctx, ItemKind::Resource, &old, &new);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_added_and_removed_items_carry_counts() {
        let config = DetectorConfig::default();
        let ctx = ctx(&config);
        let old = vec![Item::new("Ancien", ActivityType::Forum)];
        let new = vec![Item::new("Nouveau", ActivityType::Resource).with_file("cm.pdf", "u")];

        let changes = diff_items(&ctx, ItemKind::Resource, &old, &new);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].type_name(), "resource_added");
        assert_eq!(changes[0].counts().unwrap().files, 1);
        assert_eq!(changes[0].details, "Files: 1\nDescription: ");
        assert_eq!(changes[1].type_name(), "resource_removed");
        assert!(!changes[1].counts().unwrap().is_meaningful());
    }

    #[test]
    fn test_summary_truncates_description() {
        let config = DetectorConfig::default();
        let ctx = ctx(&config);
        let item = Item::new("Forum", ActivityType::Forum).with_description("é".repeat(150));

        let summary = item_summary(&ctx, ItemKind::Activity, &item);
        assert_eq!(
            summary,
            format!("Type: forum, Files: 0\nDescription: {}...", "é".repeat(100))
        );
    }
}
