use std::collections::HashSet;

use crate::core::{ChangeKind, ChangeRecord, ContentCounts, Section};

use super::items::{diff_items, ItemKind};
use super::keyed::diff_keyed;
use super::rename::{match_titles, TitlePairing};
use super::DiffContext;

/// Compare the sections of two snapshots.
///
/// Output order: renames, additions, removals, then the activity and
/// resource changes of every section present on both sides (new order).
/// Empty sections are never reported as added or removed, and a title that
/// only changed cosmetically is neither a rename nor an add/remove pair.
pub fn diff_sections(
    ctx: &DiffContext<'_>,
    old_sections: &[Section],
    new_sections: &[Section],
) -> Vec<ChangeRecord> {
    let diff = diff_keyed(old_sections, new_sections);
    if diff.collapsed > 0 {
        tracing::warn!(
            collapsed = diff.collapsed,
            "Duplicate section titles collapsed, last occurrence kept"
        );
    }

    let removed_titles: Vec<&str> = diff.removed.iter().map(|s| s.title.as_str()).collect();
    let added_titles: Vec<&str> = diff.added.iter().map(|s| s.title.as_str()).collect();
    let pairings = match_titles(&removed_titles, &added_titles, ctx.rename_policy());

    let mut changes = Vec::new();
    let mut paired_old = HashSet::new();
    let mut paired_new = HashSet::new();

    for pairing in pairings {
        match pairing {
            TitlePairing::Cosmetic { old, new } => {
                tracing::debug!(old, new, "Cosmetic section title change ignored");
                paired_old.insert(old);
                paired_new.insert(new);
            }
            TitlePairing::Renamed { old, new, similarity } => {
                paired_old.insert(old);
                paired_new.insert(new);
                changes.push(ChangeRecord::new(
                    ChangeKind::SectionRenamed {
                        old_title: old.to_string(),
                        new_title: new.to_string(),
                        similarity,
                    },
                    format!("Section renamed: {} -> {}", old, new),
                    format!("Similarity: {:.0}%", similarity * 100.0),
                ));
            }
        }
    }

    for section in diff.added {
        let counts = section.counts();
        if paired_new.contains(section.title.as_str()) || !counts.is_meaningful() {
            continue;
        }
        changes.push(ChangeRecord::new(
            ChangeKind::SectionAdded {
                title: section.title.clone(),
                counts,
            },
            format!("New section added: {}", section.title),
            section_summary(&counts),
        ));
    }

    for section in diff.removed {
        let counts = section.counts();
        if paired_old.contains(section.title.as_str()) || !counts.is_meaningful() {
            continue;
        }
        changes.push(ChangeRecord::new(
            ChangeKind::SectionRemoved {
                title: section.title.clone(),
                counts,
            },
            format!("Section removed: {}", section.title),
            section_summary(&counts),
        ));
    }

    for (old_section, new_section) in diff.common {
        changes.extend(diff_items(
            ctx,
            ItemKind::Activity,
            &old_section.activities,
            &new_section.activities,
        ));
        changes.extend(diff_items(
            ctx,
            ItemKind::Resource,
            &old_section.resources,
            &new_section.resources,
        ));
    }

    changes
}

pub fn section_summary(counts: &ContentCounts) -> String {
    format!(
        "Activities: {}, Resources: {}, Files: {}",
        counts.activities, counts.resources, counts.files
    )
}
