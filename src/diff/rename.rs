//! Section rename matching
//!
//! Course authors retitle sections (typo fixes, year updates, a qualifier
//! appended) without touching their content. Unmatched old and new titles
//! are paired here so such edits are not reported as a removal plus an
//! addition. Matching is deterministic: candidate pairs are ranked and
//! assigned greedily, each title used at most once.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::similarity::{normalize, ratio};

/// How an old title was paired with a new one
#[derive(Debug, Clone, PartialEq)]
pub enum TitlePairing<'a> {
    /// Same title after normalization; both sides are dropped silently
    Cosmetic { old: &'a str, new: &'a str },
    /// A genuine retitle
    Renamed {
        old: &'a str,
        new: &'a str,
        similarity: f64,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RenamePolicy {
    /// Minimum normalized ratio (exclusive) for a rename
    pub threshold: f64,
    /// Also accept a new title that extends the old one word for word
    pub accept_extensions: bool,
    /// Minimum normalized ratio (inclusive) of an accepted extension
    pub extension_floor: f64,
}

#[derive(Debug)]
struct Candidate<'a> {
    old: &'a str,
    new: &'a str,
    cosmetic: bool,
    similarity: f64,
}

impl<'a> Candidate<'a> {
    // Cosmetic pairs first, then best score, then titles in lexical order
    fn rank(&self, other: &Self) -> Ordering {
        other
            .cosmetic
            .cmp(&self.cosmetic)
            .then_with(|| {
                other
                    .similarity
                    .partial_cmp(&self.similarity)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| self.old.cmp(other.old))
            .then_with(|| self.new.cmp(other.new))
    }
}

/// True when `longer` starts with every word of `shorter`, in order
fn extends_title(shorter: &str, longer: &str) -> bool {
    if shorter.is_empty() || shorter.len() >= longer.len() {
        return false;
    }
    longer
        .strip_prefix(shorter)
        .map_or(false, |rest| rest.starts_with(' '))
}

/// Pair unmatched old titles with unmatched new titles
pub fn match_titles<'a>(
    old_titles: &[&'a str],
    new_titles: &[&'a str],
    policy: RenamePolicy,
) -> Vec<TitlePairing<'a>> {
    let normalized_new: Vec<String> = new_titles.iter().map(|title| normalize(title)).collect();

    let mut candidates = Vec::new();
    for &old in old_titles {
        let normalized_old = normalize(old);
        for (&new, normalized) in new_titles.iter().zip(&normalized_new) {
            if normalized_old == *normalized {
                candidates.push(Candidate {
                    old,
                    new,
                    cosmetic: true,
                    similarity: 1.0,
                });
                continue;
            }

            let similarity = ratio(&normalized_old, normalized);
            let extended = policy.accept_extensions
                && similarity >= policy.extension_floor
                && (extends_title(&normalized_old, normalized)
                    || extends_title(normalized, &normalized_old));
            if similarity > policy.threshold || extended {
                candidates.push(Candidate {
                    old,
                    new,
                    cosmetic: false,
                    similarity,
                });
            }
        }
    }

    candidates.sort_by(|a, b| a.rank(b));

    let mut used_old = HashSet::new();
    let mut used_new = HashSet::new();
    let mut pairings = Vec::new();
    for candidate in candidates {
        if used_old.contains(candidate.old) || used_new.contains(candidate.new) {
            continue;
        }
        used_old.insert(candidate.old);
        used_new.insert(candidate.new);

        pairings.push(if candidate.cosmetic {
            TitlePairing::Cosmetic {
                old: candidate.old,
                new: candidate.new,
            }
        } else {
            TitlePairing::Renamed {
                old: candidate.old,
                new: candidate.new,
                similarity: candidate.similarity,
            }
        });
    }

    pairings
}
