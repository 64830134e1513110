//! Title and description similarity
//!
//! Normalization pipeline (order matters): canonical composition, lowercase,
//! HTML tag removal, whitespace collapse, punctuation removal. Ratios follow
//! the classic matching-blocks definition `2 * M / T` over characters.

use std::sync::OnceLock;

use regex::Regex;
use similar::{DiffTag, TextDiff};
use unicode_normalization::UnicodeNormalization;

fn html_tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag pattern"))
}

fn punctuation_regex() -> &'static Regex {
    static PUNCT: OnceLock<Regex> = OnceLock::new();
    PUNCT.get_or_init(|| Regex::new(r"[^\w\s]").expect("valid punctuation pattern"))
}

/// Remove HTML tags and decode the handful of entities the LMS emits
pub fn strip_html(text: &str) -> String {
    let stripped = html_tag_regex().replace_all(text, "");
    stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Collapse runs of whitespace into a single space and trim both ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form used for every title comparison
pub fn normalize(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let lowered = composed.to_lowercase();
    let without_tags = html_tag_regex().replace_all(&lowered, "");
    let collapsed = collapse_whitespace(&without_tags);
    let without_punct = punctuation_regex().replace_all(&collapsed, "");
    // Removing a standalone dash leaves a double space behind
    collapse_whitespace(&without_punct)
}

/// Sequence similarity of two strings in `[0, 1]`; two empty strings are identical.
///
/// Computed in `f64` from the matched character count so that a pair sitting
/// exactly on a threshold compares exactly.
pub fn ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let diff = TextDiff::from_chars(a, b);
    let matched: usize = diff
        .ops()
        .iter()
        .map(|op| match op.as_tag_tuple() {
            (DiffTag::Equal, old_range, _) => old_range.len(),
            _ => 0,
        })
        .sum();
    2.0 * matched as f64 / total as f64
}

/// Ratio computed over the normalized forms of both strings
pub fn normalized_ratio(a: &str, b: &str) -> f64 {
    ratio(&normalize(a), &normalize(b))
}

/// True when two titles only differ by casing, spacing, punctuation or markup
pub fn is_cosmetic_change(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Visible text of an HTML fragment, whitespace collapsed
pub fn visible_text(html: &str) -> String {
    collapse_whitespace(&strip_html(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pipeline() {
        assert_eq!(normalize("  Cours   1 "), "cours 1");
        assert_eq!(normalize("<b>Cours</b> 1."), "cours 1");
        assert_eq!(normalize("TD - Série 2 !"), "td série 2");
    }

    #[test]
    fn test_normalize_composes_unicode() {
        // "e" followed by a combining acute accent
        let decomposed = "Ge\u{301}ne\u{301}rale";
        assert_eq!(normalize(decomposed), "générale");
        assert!(is_cosmetic_change(decomposed, "GÉNÉRALE"));
    }

    #[test]
    fn test_ratio_bounds() {
        assert_eq!(ratio("", ""), 1.0);
        assert_eq!(ratio("abc", "abc"), 1.0);
        assert_eq!(ratio("abc", "xyz"), 0.0);
        assert_eq!(ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_ratio_matches_block_definition() {
        // 12 matching characters over 12 + 21
        let score = ratio("introduction", "introduction générale");
        assert!((score - 24.0 / 33.0).abs() < 1e-6);

        let score = normalized_ratio("Chapitre 1", "Chapitre 2");
        assert!((score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_ratio_exact_at_thresholds() {
        // 4 of 5 and 9 of 10 characters match
        assert_eq!(ratio("sem 1", "sem 2"), 0.8);
        assert_eq!(ratio("chapitre 1", "chapitre 2"), 0.9);
        assert!(!(ratio("sem 1", "sem 2") > 0.8));
        assert!(!(ratio("chapitre 1", "chapitre 2") < 0.9));
    }

    #[test]
    fn test_ratio_counts_chars_not_bytes() {
        assert_eq!(ratio("é", "e"), 0.0);
        assert_eq!(ratio("été", "étÉ"), 2.0 * 2.0 / 6.0);
    }

    #[test]
    fn test_cosmetic_change_detection() {
        assert!(is_cosmetic_change("Cours 1", "cours   1"));
        assert!(is_cosmetic_change("Examens:", "<span>examens</span>"));
        assert!(!is_cosmetic_change("Cours 1", "Cours 2"));
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            visible_text("<p class=\"a\">Rendu&nbsp;du <b>TP</b></p>"),
            "Rendu du TP"
        );
        assert_eq!(strip_html("a &amp; b"), "a & b");
    }
}
