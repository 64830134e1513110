//! Persistent scan statistics
//!
//! Counters survive restarts: every check cycle loads the record from the
//! store, updates it and writes it back.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Errors kept in the record, oldest dropped first
pub const MAX_RECORDED_ERRORS: usize = 100;

/// Per-course counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseStats {
    pub name: String,
    pub total_scans: u64,
    pub successful_scans: u64,
    pub failed_scans: u64,
    /// Activities and resources summed over successful scans
    pub total_items_found: u64,
    pub last_items_count: usize,
    pub last_scan_time: Option<DateTime<Utc>>,
}

impl CourseStats {
    pub fn success_rate(&self) -> f64 {
        percentage(self.successful_scans, self.total_scans)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub total_scans: u64,
    #[serde(default)]
    pub successful_scans: u64,
    #[serde(default)]
    pub failed_scans: u64,
    #[serde(default)]
    pub total_notifications: u64,
    #[serde(default)]
    pub last_scan_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub courses: BTreeMap<String, CourseStats>,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

impl ScanStats {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            total_scans: 0,
            successful_scans: 0,
            failed_scans: 0,
            total_notifications: 0,
            last_scan_time: None,
            courses: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Count one check of a course
    pub fn record_scan(
        &mut self,
        course_id: &str,
        course_name: &str,
        success: bool,
        items_found: usize,
        at: DateTime<Utc>,
    ) {
        self.total_scans += 1;
        self.last_scan_time = Some(at);

        let course = self.courses.entry(course_id.to_string()).or_default();
        course.name = course_name.to_string();
        course.total_scans += 1;
        course.last_scan_time = Some(at);
        course.last_items_count = items_found;

        if success {
            self.successful_scans += 1;
            course.successful_scans += 1;
            course.total_items_found += items_found as u64;
        } else {
            self.failed_scans += 1;
            course.failed_scans += 1;
        }
    }

    /// Count a snapshot that could not be attributed to any course
    pub fn record_unreadable(&mut self, message: impl Into<String>, at: DateTime<Utc>) {
        self.total_scans += 1;
        self.failed_scans += 1;
        self.last_scan_time = Some(at);
        self.record_error("unreadable_snapshot", message, None, at);
    }

    pub fn record_notification(&mut self) {
        self.total_notifications += 1;
    }

    pub fn record_error(
        &mut self,
        kind: &str,
        message: impl Into<String>,
        course_id: Option<&str>,
        at: DateTime<Utc>,
    ) {
        self.errors.push(ErrorEntry {
            timestamp: at,
            kind: kind.to_string(),
            message: message.into(),
            course_id: course_id.map(str::to_string),
        });
        if self.errors.len() > MAX_RECORDED_ERRORS {
            let excess = self.errors.len() - MAX_RECORDED_ERRORS;
            self.errors.drain(..excess);
        }
    }

    /// Successful checks as a percentage of all checks
    pub fn success_rate(&self) -> f64 {
        percentage(self.successful_scans, self.total_scans)
    }

    pub fn recent_errors(&self, now: DateTime<Utc>, window: Duration) -> Vec<&ErrorEntry> {
        let cutoff = now - window;
        self.errors.iter().filter(|error| error.timestamp > cutoff).collect()
    }

    pub fn uptime(&self, now: DateTime<Utc>) -> String {
        format_uptime(now - self.start_time)
    }

    /// Plain-text statistics report
    pub fn report(&self, now: DateTime<Utc>) -> String {
        let recent = self.recent_errors(now, Duration::hours(24));
        let mut output = Vec::new();

        output.push("Scan statistics".to_string());
        output.push("=".repeat(50));
        output.push(String::new());
        output.push(format!("Uptime: {}", self.uptime(now)));
        output.push(format!("Total scans: {}", self.total_scans));
        output.push(format!("Successful scans: {}", self.successful_scans));
        output.push(format!("Failed scans: {}", self.failed_scans));
        output.push(format!("Success rate: {:.1}%", self.success_rate()));
        output.push(format!("Notifications: {}", self.total_notifications));
        output.push(format!("Courses monitored: {}", self.courses.len()));
        output.push(format!("Recent errors (24h): {}", recent.len()));

        if !self.courses.is_empty() {
            output.push(String::new());
            output.push("Per course".to_string());
            output.push("-".repeat(30));
            for (course_id, course) in &self.courses {
                output.push(format!("{} ({})", course.name, course_id));
                output.push(format!(
                    "   Scans: {} (successful: {})",
                    course.total_scans, course.successful_scans
                ));
                output.push(format!("   Rate: {:.1}%", course.success_rate()));
                output.push(format!("   Items found: {}", course.total_items_found));
            }
        }

        if !recent.is_empty() {
            output.push(String::new());
            output.push("Recent errors (24h)".to_string());
            output.push("-".repeat(30));
            let skip = recent.len().saturating_sub(10);
            for error in recent.iter().skip(skip) {
                output.push(format!(
                    "[{}] {}: {}",
                    error.timestamp.format("%H:%M:%S"),
                    error.kind,
                    error.message
                ));
            }
        }

        output.push(String::new());
        output.push(format!("Generated at {}", now.format("%d/%m/%Y %H:%M:%S UTC")));
        output.join("\n")
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn format_uptime(elapsed: Duration) -> String {
    let minutes = elapsed.num_minutes().max(0);
    let hours = minutes / 60;
    if hours < 1 {
        format!("{} minutes", minutes)
    } else if hours < 24 {
        format!("{} hours", hours)
    } else {
        format!("{} days and {} hours", hours / 24, hours % 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_record_scans() {
        let mut stats = ScanStats::new(at(8, 0));
        stats.record_scan("19984", "Génie Civil", true, 12, at(8, 15));
        stats.record_scan("19984", "Génie Civil", false, 0, at(8, 30));
        stats.record_scan("19989", "Course 19989", true, 4, at(8, 30));
        stats.record_notification();

        assert_eq!(stats.total_scans, 3);
        assert_eq!(stats.failed_scans, 1);
        assert_eq!(stats.total_notifications, 1);
        assert_eq!(stats.last_scan_time, Some(at(8, 30)));

        let course = &stats.courses["19984"];
        assert_eq!(course.total_scans, 2);
        assert_eq!(course.total_items_found, 12);
        assert_eq!(course.last_items_count, 0);
        assert_eq!(course.success_rate(), 50.0);
        assert!((stats.success_rate() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_log_is_capped() {
        let mut stats = ScanStats::new(at(8, 0));
        for i in 0..(MAX_RECORDED_ERRORS + 5) {
            stats.record_error("check", format!("failure {}", i), Some("19984"), at(9, 0));
        }
        assert_eq!(stats.errors.len(), MAX_RECORDED_ERRORS);
        assert_eq!(stats.errors[0].message, "failure 5");
    }

    #[test]
    fn test_recent_errors_window() {
        let mut stats = ScanStats::new(at(0, 0));
        stats.record_error("check", "old", None, at(1, 0));
        stats.record_unreadable("broken json", at(20, 0));

        let now = Utc.with_ymd_and_hms(2024, 3, 2, 2, 0, 0).unwrap();
        let recent = stats.recent_errors(now, Duration::hours(24));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].kind, "unreadable_snapshot");
        assert_eq!(stats.failed_scans, 1);
    }

    #[test]
    fn test_uptime_format() {
        assert_eq!(format_uptime(Duration::minutes(42)), "42 minutes");
        assert_eq!(format_uptime(Duration::hours(5)), "5 hours");
        assert_eq!(format_uptime(Duration::hours(50)), "2 days and 2 hours");
    }

    #[test]
    fn test_report_layout() {
        let mut stats = ScanStats::new(at(8, 0));
        stats.record_scan("19984", "Génie Civil", true, 12, at(8, 15));
        stats.record_error("check", "store unavailable", Some("19984"), at(9, 0));

        let report = stats.report(at(10, 0));
        assert!(report.starts_with("Scan statistics\n"));
        assert!(report.contains("Uptime: 2 hours"));
        assert!(report.contains("Success rate: 100.0%"));
        assert!(report.contains("Génie Civil (19984)\n   Scans: 1 (successful: 1)"));
        assert!(report.contains("[09:00:00] check: store unavailable"));
        assert!(report.ends_with("Generated at 01/03/2024 10:00:00 UTC"));
    }

    #[test]
    fn test_stats_json_round_trip() {
        let mut stats = ScanStats::new(at(8, 0));
        stats.record_scan("19984", "Génie Civil", true, 12, at(8, 15));
        let json = serde_json::to_string(&stats).unwrap();
        let parsed: ScanStats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stats);
    }
}
