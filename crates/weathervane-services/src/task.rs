//! Task identity, lifecycle state and result types.

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use weathervane_weather::{Region, WeatherRecord, WeatherReport};

/// Identifier assigned to a task when it is submitted.
///
/// Always a UUID, so it is safe to embed in archive file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid task id: {0}")]
pub struct InvalidTaskId(pub String);

impl TaskId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parse an id received from a caller
    pub fn parse(value: &str) -> Result<Self, InvalidTaskId> {
        uuid::Uuid::parse_str(value.trim())
            .map(|id| Self(id.to_string()))
            .map_err(|_| InvalidTaskId(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<String> for TaskId {
    type Error = InvalidTaskId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a submitted task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted but not started
    Pending,
    Running,
    /// Results are in both sinks
    Succeeded,
    /// Task-level failure with its cause
    Failed { cause: String },
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

/// Terminal records of one task, keyed by the query string as submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskResult(BTreeMap<String, WeatherRecord>);

impl TaskResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, query: impl Into<String>, record: WeatherRecord) {
        self.0.insert(query.into(), record);
    }

    pub fn get(&self, query: &str) -> Option<&WeatherRecord> {
        self.0.get(query)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, WeatherRecord> {
        self.0.iter()
    }

    /// Resolved reports grouped by region, in query order within each group
    pub fn resolved_by_region(&self) -> BTreeMap<Region, Vec<WeatherReport>> {
        let mut grouped: BTreeMap<Region, Vec<WeatherReport>> = BTreeMap::new();
        for report in self.0.values().filter_map(WeatherRecord::as_report) {
            grouped.entry(report.region).or_default().push(report.clone());
        }
        grouped
    }
}

impl FromIterator<(String, WeatherRecord)> for TaskResult {
    fn from_iter<I: IntoIterator<Item = (String, WeatherRecord)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TaskResult {
    type Item = (&'a String, &'a WeatherRecord);
    type IntoIter = btree_map::Iter<'a, String, WeatherRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
