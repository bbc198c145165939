use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Format `created_at` is written in, both to JSON and CSV.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Low" => Ok(Priority::Low),
            "Medium" => Ok(Priority::Medium),
            "High" => Ok(Priority::High),
            other => Err(Error::InvalidPriority(other.to_string())),
        }
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Older files carry an empty priority; those load as the default.
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if label.is_empty() {
            return Ok(Priority::default());
        }
        label.parse().map_err(serde::de::Error::custom)
    }
}

/// A single to-do item.
///
/// The JSON shape uses `task` for the description, every value is a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "task", default)]
    pub text: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: String,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<NaiveDateTime>,
}

impl Task {
    /// Creates a task stamped with the current local time.
    pub fn new(text: &str, category: &str, priority: Priority, due_date: &str) -> Self {
        Task {
            text: text.to_string(),
            category: category.to_string(),
            priority,
            due_date: due_date.to_string(),
            created_at: Some(Local::now().naive_local().trunc_subsecs(0)),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.text, self.priority)?;
        if !self.category.is_empty() {
            write!(f, " {{{}}}", self.category)?;
        }
        if !self.due_date.is_empty() {
            write!(f, " due {}", self.due_date)?;
        }
        Ok(())
    }
}

pub fn format_timestamp(created_at: &Option<NaiveDateTime>) -> String {
    match created_at {
        Some(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        None => String::new(),
    }
}

/// Other layouts older task files were written with. Dates without a time
/// load as midnight.
const LOOSE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];

/// Parses a stored timestamp. Empty means the task was never stamped.
/// Fractions of a second are dropped so the value survives being written
/// back in [`TIMESTAMP_FORMAT`].
pub fn parse_timestamp(value: &str) -> Result<Option<NaiveDateTime>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let parsed = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| value.parse::<NaiveDateTime>())
        .ok()
        .or_else(|| {
            LOOSE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        });
    match parsed {
        Some(ts) => Ok(Some(ts.trunc_subsecs(0))),
        None => Err(Error::InvalidTimestamp(value.to_string())),
    }
}

mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
