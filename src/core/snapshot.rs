//! Course snapshot model
//!
//! A snapshot is the scraped structure of one monitored course page:
//! course -> sections -> activities/resources -> files. Snapshots are
//! produced by the external scraper and are never mutated once captured.
//! Every field is optional on the wire and degrades to an empty value.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Root document for one monitored course
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "lenient_string")]
    pub course_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, alias = "timestamp", deserialize_with = "lenient_timestamp")]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub sections: Vec<Section>,
}

/// A titled block of the course page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub activities: Vec<Item>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub resources: Vec<Item>,
}

/// An activity or a resource inside a section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(rename = "type", default)]
    pub activity_type: ActivityType,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub files: Vec<CourseFile>,
}

/// A downloadable file attached to an activity or resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseFile {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
}

/// Kind tag the scraper assigns to an activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Resource,
    Forum,
    Assignment,
    #[default]
    Other,
}

/// Structured size of a node, carried on change records so removals can be
/// judged without re-reading the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCounts {
    pub activities: usize,
    pub resources: usize,
    pub files: usize,
}

impl ContentCounts {
    pub fn files(files: usize) -> Self {
        Self { files, ..Self::default() }
    }

    /// A node is worth reporting when it holds anything at all
    pub fn is_meaningful(&self) -> bool {
        self.activities > 0 || self.resources > 0 || self.files > 0
    }
}

impl std::ops::AddAssign for ContentCounts {
    fn add_assign(&mut self, other: Self) {
        self.activities += other.activities;
        self.resources += other.resources;
        self.files += other.files;
    }
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Forum => "forum",
            Self::Assignment => "assignment",
            Self::Other => "other",
        }
    }
}

impl From<&str> for ActivityType {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "resource" => Self::Resource,
            "forum" => Self::Forum,
            "assignment" => Self::Assignment,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map(ActivityType::from).unwrap_or_default())
    }
}

impl Snapshot {
    pub fn new(course_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            url: url.into(),
            captured_at: Some(Utc::now()),
            sections: Vec::new(),
        }
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    pub fn captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = Some(at);
        self
    }

    /// Aggregate counts over every section; `activities` and `resources` are
    /// totals across the whole course.
    pub fn totals(&self) -> ContentCounts {
        let mut totals = ContentCounts::default();
        for section in &self.sections {
            totals += section.counts();
        }
        totals
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse course snapshot")
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Invalid snapshot file {}", path.display()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize course snapshot")
    }
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_activity(mut self, activity: Item) -> Self {
        self.activities.push(activity);
        self
    }

    pub fn with_resource(mut self, resource: Item) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn counts(&self) -> ContentCounts {
        let files = self
            .activities
            .iter()
            .chain(self.resources.iter())
            .map(|item| item.files.len())
            .sum();
        ContentCounts {
            activities: self.activities.len(),
            resources: self.resources.len(),
            files,
        }
    }
}

impl Item {
    pub fn new(title: impl Into<String>, activity_type: ActivityType) -> Self {
        Self {
            title: title.into(),
            activity_type,
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.files.push(CourseFile {
            name: name.into(),
            url: url.into(),
        });
        self
    }

    pub fn counts(&self) -> ContentCounts {
        ContentCounts::files(self.files.len())
    }
}

// Scraped documents are loosely typed: nulls and scalars of the wrong kind
// collapse to an empty string instead of failing the whole snapshot.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

// Non-arrays become empty; unparseable elements are skipped.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(item) => Some(item),
                Err(err) => {
                    tracing::warn!("Skipping malformed snapshot entry: {}", err);
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().and_then(|secs| {
            let millis = (secs * 1000.0).round() as i64;
            Utc.timestamp_millis_opt(millis).single()
        }),
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    })
}
