//! Rendering and exporting of change reports
//!
//! This module turns change records into the text a notification recipient
//! reads, and writes rendered reports to files or other outputs. Delivery
//! (chat bots, mail) is left to the caller.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;

use crate::config::NotifyConfig;
use crate::core::{ChangeKind, ChangeRecord};
use crate::diff::preview;
use crate::monitor::CheckOutcome;

/// Output formats for change reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Numbered, human-readable report
    #[default]
    Text,
    /// One line per change
    Compact,
    /// JSON for scripting
    Json,
}

/// Changes detected for one course in one cycle
#[derive(Debug, Clone)]
pub struct CourseReport<'a> {
    pub course_id: &'a str,
    pub course_name: Option<&'a str>,
    pub course_url: &'a str,
    pub changes: &'a [ChangeRecord],
    pub detected_at: DateTime<Utc>,
}

impl<'a> From<&'a CheckOutcome> for CourseReport<'a> {
    fn from(outcome: &'a CheckOutcome) -> Self {
        Self {
            course_id: &outcome.course_id,
            course_name: outcome.course_name.as_deref(),
            course_url: &outcome.course_url,
            changes: &outcome.changes,
            detected_at: outcome.detected_at,
        }
    }
}

/// Formats change reports into various text representations
pub struct ReportFormatter {
    config: NotifyConfig,
}

impl ReportFormatter {
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }

    pub fn format(&self, report: &CourseReport<'_>, format: ReportFormat) -> Result<String> {
        Ok(match format {
            ReportFormat::Text => self.format_text(report),
            ReportFormat::Compact => Self::format_compact(report.changes),
            ReportFormat::Json => Self::format_json(report.changes)?,
        })
    }

    /// Numbered report, capped at `max_changes_per_message` entries
    pub fn format_text(&self, report: &CourseReport<'_>) -> String {
        let mut output = Vec::new();
        output.push("Update detected".to_string());
        match report.course_name {
            Some(name) => output.push(format!("Course: {} ({})", name, report.course_id)),
            None => output.push(format!("Course: {}", report.course_id)),
        }
        if !report.course_url.is_empty() {
            output.push(format!("Link: {}", report.course_url));
        }
        output.push(String::new());
        output.push(format!("Changes detected ({}):", report.changes.len()));
        output.push(String::new());

        let shown = report.changes.len().min(self.config.max_changes_per_message);
        for (i, change) in report.changes.iter().take(shown).enumerate() {
            output.push(format!("{}. {}", i + 1, change.message));

            if !change.details.is_empty() {
                let details = preview(&change.details, self.config.details_preview_chars);
                for line in details.lines() {
                    output.push(format!("   {}", line));
                }
            }

            if let Some(marker) = Self::marker(&change.kind) {
                output.push(format!("   {}", marker));
            }
            output.push(String::new());
        }

        if report.changes.len() > shown {
            output.push(format!("... and {} more changes", report.changes.len() - shown));
            output.push(String::new());
        }

        output.push(format!(
            "Detected at {}",
            report.detected_at.format("%d/%m/%Y %H:%M:%S UTC")
        ));

        output.join("\n")
    }

    /// One `<code> <message>` line per change
    pub fn format_compact(changes: &[ChangeRecord]) -> String {
        changes
            .iter()
            .map(|change| format!("{} {}", Self::code(&change.kind), change.message))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn format_json(changes: &[ChangeRecord]) -> Result<String> {
        serde_json::to_string_pretty(changes).context("Failed to serialize changes")
    }

    /// Short status code per kind: A(dded), R(emoved), V (renamed), M(odified), I(nventory)
    pub fn code(kind: &ChangeKind) -> char {
        match kind {
            ChangeKind::SectionAdded { .. }
            | ChangeKind::ActivityAdded { .. }
            | ChangeKind::ResourceAdded { .. }
            | ChangeKind::FileAdded { .. } => 'A',
            ChangeKind::SectionRemoved { .. }
            | ChangeKind::ActivityRemoved { .. }
            | ChangeKind::ResourceRemoved { .. }
            | ChangeKind::FileRemoved { .. } => 'R',
            ChangeKind::SectionRenamed { .. } => 'V',
            ChangeKind::ActivityDescriptionChanged { .. } => 'M',
            _ => 'I',
        }
    }

    fn marker(kind: &ChangeKind) -> Option<&'static str> {
        match kind {
            ChangeKind::SectionAdded { .. } => Some("+ New section"),
            ChangeKind::SectionRemoved { .. } => Some("- Section removed"),
            ChangeKind::SectionRenamed { .. } => Some("~ Section renamed"),
            ChangeKind::ActivityAdded { .. } => Some("+ New activity"),
            ChangeKind::ActivityRemoved { .. } => Some("- Activity removed"),
            ChangeKind::ResourceAdded { .. } => Some("+ New resource"),
            ChangeKind::ResourceRemoved { .. } => Some("- Resource removed"),
            ChangeKind::FileAdded { .. } => Some("+ New file"),
            ChangeKind::FileRemoved { .. } => Some("- File removed"),
            ChangeKind::ActivityDescriptionChanged { .. } => Some("~ Description changed"),
            _ => None,
        }
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(NotifyConfig::default())
    }
}

/// Handles exporting rendered reports to files and writers
pub struct ReportExporter {
    formatter: ReportFormatter,
    format: ReportFormat,
}

impl ReportExporter {
    pub fn new(formatter: ReportFormatter, format: ReportFormat) -> Self {
        Self { formatter, format }
    }

    pub fn with_format(format: ReportFormat) -> Self {
        Self::new(ReportFormatter::default(), format)
    }

    /// Export a report to a file
    pub fn export_report<P: AsRef<Path>>(&self, report: &CourseReport<'_>, output_path: P) -> Result<()> {
        let output_path = output_path.as_ref();
        let content = self.formatter.format(report, self.format)?;
        fs::write(output_path, content)
            .with_context(|| format!("Failed to write report {}", output_path.display()))?;
        Ok(())
    }

    /// Export to a writer (stdout, sockets, buffers)
    pub fn export_to_writer<W: Write>(&self, report: &CourseReport<'_>, writer: &mut W) -> Result<()> {
        let content = self.formatter.format(report, self.format)?;
        writeln!(writer, "{}", content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_added(name: &str) -> ChangeRecord {
        ChangeRecord::new(
            ChangeKind::FileAdded {
                file_name: name.to_string(),
                parent_title: "Cours".to_string(),
                file_url: format!("https://lms/{}", name),
                file_date: Utc::now(),
            },
            format!("New file added: {}", name),
            format!("In: Cours\nURL: https://lms/{}", name),
        )
    }

    fn report(changes: &[ChangeRecord]) -> CourseReport<'_> {
        CourseReport {
            course_id: "19984",
            course_name: None,
            course_url: "https://lms/course/view.php?id=19984",
            changes,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_text_report_layout() {
        let changes = vec![file_added("td1.pdf")];
        let text = ReportFormatter::default().format_text(&report(&changes));

        assert!(text.starts_with("Update detected\nCourse: 19984\nLink: https://lms/course/view.php?id=19984"));
        assert!(text.contains("Changes detected (1):"));
        assert!(text.contains("1. New file added: td1.pdf\n   In: Cours\n   URL: https://lms/td1.pdf\n   + New file"));
        assert!(text.contains("Detected at "));
    }

    #[test]
    fn test_text_report_uses_course_name() {
        let changes = vec![file_added("td1.pdf")];
        let named = CourseReport {
            course_name: Some("Génie Civil"),
            ..report(&changes)
        };
        let text = ReportFormatter::default().format_text(&named);
        assert!(text.starts_with("Update detected\nCourse: Génie Civil (19984)\nLink: "));
    }

    #[test]
    fn test_text_report_truncates() {
        let changes: Vec<_> = (0..5).map(|i| file_added(&format!("f{}.pdf", i))).collect();
        let formatter = ReportFormatter::new(NotifyConfig {
            max_changes_per_message: 2,
            ..NotifyConfig::default()
        });
        let text = formatter.format_text(&report(&changes));

        assert!(text.contains("2. New file added: f1.pdf"));
        assert!(!text.contains("3. New file added"));
        assert!(text.contains("... and 3 more changes"));
    }

    #[test]
    fn test_compact_and_json() {
        let changes = vec![file_added("a.pdf")];
        assert_eq!(ReportFormatter::format_compact(&changes), "A New file added: a.pdf");

        let json = ReportFormatter::format_json(&changes).unwrap();
        let parsed: Vec<ChangeRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, changes);
    }

    #[test]
    fn test_export_report() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("report.txt");
        let changes = vec![file_added("a.pdf")];

        let exporter = ReportExporter::with_format(ReportFormat::Compact);
        exporter.export_report(&report(&changes), &output_path).unwrap();

        let content = fs::read_to_string(output_path).unwrap();
        assert_eq!(content, "A New file added: a.pdf");

        let mut buffer = Vec::new();
        exporter.export_to_writer(&report(&changes), &mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "A New file added: a.pdf\n");
    }
}
