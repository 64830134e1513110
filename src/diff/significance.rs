//! Post-processing of raw change lists
//!
//! Drops records that are technically true but not worth a notification:
//! empty additions and removals, and description edits that only touch
//! markup or a few characters. Judgements use the structured payload of a
//! record, never its human-readable text, and unknown cases are kept.

use crate::config::DetectorConfig;
use crate::core::{ChangeKind, ChangeRecord};

use super::similarity::{ratio, visible_text};

#[derive(Debug, Clone)]
pub struct SignificanceFilter {
    description_threshold: f64,
    min_details_chars: usize,
}

impl SignificanceFilter {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            description_threshold: config.description_threshold,
            min_details_chars: config.min_details_chars,
        }
    }

    /// Keep only the records worth reporting, preserving order
    pub fn apply(&self, changes: Vec<ChangeRecord>) -> Vec<ChangeRecord> {
        let before = changes.len();
        let kept: Vec<ChangeRecord> = changes
            .into_iter()
            .filter(|change| {
                let keep = self.is_significant(change);
                if !keep {
                    tracing::debug!(
                        kind = change.type_name(),
                        message = %change.message,
                        "Dropping insignificant change"
                    );
                }
                keep
            })
            .collect();

        if kept.len() < before {
            tracing::debug!(dropped = before - kept.len(), kept = kept.len(), "Significance filter applied");
        }
        kept
    }

    pub fn is_significant(&self, change: &ChangeRecord) -> bool {
        match &change.kind {
            ChangeKind::FileAdded { .. } | ChangeKind::SectionRenamed { .. } => true,

            ChangeKind::ActivityAdded { counts, .. } | ChangeKind::ResourceAdded { counts, .. } => {
                counts.files > 0 || change.details.chars().count() > self.min_details_chars
            }

            ChangeKind::SectionAdded { counts, .. }
            | ChangeKind::SectionRemoved { counts, .. }
            | ChangeKind::ActivityRemoved { counts, .. }
            | ChangeKind::ResourceRemoved { counts, .. } => counts.is_meaningful(),

            ChangeKind::ActivityDescriptionChanged {
                old_description,
                new_description,
                ..
            } => self.is_substantive_edit(old_description, new_description),

            _ => true,
        }
    }

    fn is_substantive_edit(&self, old: &str, new: &str) -> bool {
        let old_text = visible_text(old);
        let new_text = visible_text(new);
        old_text != new_text && ratio(&old_text, &new_text) < self.description_threshold
    }
}

impl Default for SignificanceFilter {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActivityType, ContentCounts};
    use chrono::Utc;

    fn description_change(old: &str, new: &str) -> ChangeRecord {
        ChangeRecord::new(
            ChangeKind::ActivityDescriptionChanged {
                title: "Devoir".to_string(),
                old_description: old.to_string(),
                new_description: new.to_string(),
            },
            "Description changed for activity: Devoir",
            "",
        )
    }

    #[test]
    fn test_markup_only_description_edit_dropped() {
        let filter = SignificanceFilter::default();
        let change = description_change(
            "<p class=\"old\">Rendu du TP le 12 mars</p>",
            "<p class=\"new\" style=\"color:red\">Rendu du TP le 12 mars</p>",
        );
        assert!(!filter.is_significant(&change));
    }

    #[test]
    fn test_small_description_edit_dropped() {
        let filter = SignificanceFilter::default();
        let change = description_change(
            "Le rendu du projet se fait sur la plateforme avant vendredi soir",
            "Le rendu du projet se fait sur la plateforme avant vendredi soir.",
        );
        assert!(!filter.is_significant(&change));
    }

    #[test]
    fn test_description_ratio_at_threshold_dropped() {
        let filter = SignificanceFilter::default();
        // ratio is exactly 0.9, which is not below the threshold
        assert!(!filter.is_significant(&description_change("chapitre 1", "chapitre 2")));
        assert!(filter.is_significant(&description_change("sem 1", "sem 2")));
    }

    #[test]
    fn test_rewritten_description_kept() {
        let filter = SignificanceFilter::default();
        let change = description_change(
            "Rendu lundi.",
            "L'examen final aura lieu en amphithéâtre B le 3 juin, munissez-vous de votre carte.",
        );
        assert!(filter.is_significant(&change));
    }

    #[test]
    fn test_added_item_needs_files_or_details() {
        let filter = SignificanceFilter::default();
        let bare = ChangeRecord::new(
            ChangeKind::ActivityAdded {
                title: "Forum".to_string(),
                activity_type: ActivityType::Forum,
                counts: ContentCounts::default(),
            },
            "New activity added: Forum",
            "Type: forum, Files: 0\nDescription: ",
        );
        assert!(!filter.is_significant(&bare));

        let mut described = bare.clone();
        described.details = format!("{}{}", bare.details, "Questions sur le cours magistral");
        assert!(filter.is_significant(&described));

        let with_file = ChangeRecord::new(
            ChangeKind::ResourceAdded {
                title: "Slides".to_string(),
                counts: ContentCounts::files(1),
            },
            "New resource added: Slides",
            "Files: 1",
        );
        assert!(filter.is_significant(&with_file));
    }

    #[test]
    fn test_details_length_boundary() {
        let filter = SignificanceFilter::default();
        let added = |details: String| {
            ChangeRecord::new(
                ChangeKind::ActivityAdded {
                    title: "Forum".to_string(),
                    activity_type: ActivityType::Forum,
                    counts: ContentCounts::default(),
                },
                "New activity added: Forum",
                details,
            )
        };

        let at_limit = added(format!("Type: forum, Files: 0\nDescription: {}", "Questions cours"));
        assert_eq!(at_limit.details.chars().count(), 50);
        assert!(!filter.is_significant(&at_limit));

        let over_limit = added(format!("Type: forum, Files: 0\nDescription: {}", "Questions cours!"));
        assert_eq!(over_limit.details.chars().count(), 51);
        assert!(filter.is_significant(&over_limit));

        // Counted in characters, not bytes
        let accented = added(format!("Type: forum, Files: 0\nDescription: {}", "é".repeat(15)));
        assert!(accented.details.len() > 50);
        assert!(!filter.is_significant(&accented));
    }

    #[test]
    fn test_empty_removals_dropped() {
        let filter = SignificanceFilter::default();
        let empty = ChangeRecord::new(
            ChangeKind::SectionRemoved {
                title: "Vide".to_string(),
                counts: ContentCounts::default(),
            },
            "Section removed: Vide",
            "",
        );
        let full = ChangeRecord::new(
            ChangeKind::ActivityRemoved {
                title: "Devoir".to_string(),
                activity_type: ActivityType::Assignment,
                counts: ContentCounts::files(2),
            },
            "Activity removed: Devoir",
            "",
        );
        let file = ChangeRecord::new(
            ChangeKind::FileAdded {
                file_name: "a.pdf".to_string(),
                parent_title: "R".to_string(),
                file_url: String::new(),
                file_date: Utc::now(),
            },
            "New file added: a.pdf",
            "",
        );

        let kept = filter.apply(vec![empty, full.clone(), file.clone()]);
        assert_eq!(kept, vec![full, file]);
    }
}
