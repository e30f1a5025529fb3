/// Versioned event store
///
/// Events are whole-record resources: every create, update and rollback
/// appends a full snapshot of the resulting field set to the event's version
/// log. The log is never rewritten, so rollback restores literal values from
/// an older snapshot and records that restore as a new version.

pub mod diff;
mod store;

pub use crate::db::models::Event;
pub use diff::{diff_snapshots, DiffMode, EventDiff};
pub use store::EventStore;

use crate::error::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Upper bound on page size for event listing
pub const MAX_PAGE_SIZE: i64 = 100;

/// Complete set of caller-editable event fields
///
/// Updates replace the whole record, so callers always send every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFields {
    pub title: String,
    pub description: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: Option<String>,
}

impl EventFields {
    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Event title cannot be empty".to_string()));
        }

        if self.end_time < self.start_time {
            return Err(AppError::Validation(
                "Event end_time cannot be before start_time".to_string(),
            ));
        }

        Ok(())
    }
}

impl From<&Event> for EventFields {
    fn from(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            location: event.location.clone(),
            is_recurring: event.is_recurring,
            recurrence_pattern: event.recurrence_pattern.clone(),
        }
    }
}

/// A stored snapshot as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionView {
    pub version_id: i64,
    pub event_id: i64,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Changelog entry, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub version_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Parse RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (as UTC), or a bare date
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_formats() {
        let midnight = Utc.with_ymd_and_hms(2025, 5, 24, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-05-24"), Some(midnight));
        assert_eq!(parse_timestamp("2025-05-24T00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("2025-05-24T02:00:00+02:00"), Some(midnight));
        assert_eq!(parse_timestamp("24/05/2025"), None);
    }

    #[test]
    fn test_fields_defaults_and_validation() {
        let fields: EventFields = serde_json::from_str(
            r#"{"title": "Standup", "description": "", "start_time": "2025-05-24T09:00:00Z", "end_time": "2025-05-24T09:15:00Z"}"#,
        )
        .unwrap();
        assert_eq!(fields.location, None);
        assert!(!fields.is_recurring);
        assert!(fields.validate().is_ok());

        let mut reversed = fields.clone();
        reversed.end_time = reversed.start_time - chrono::Duration::minutes(1);
        assert!(matches!(reversed.validate(), Err(AppError::Validation(_))));

        let mut untitled = fields;
        untitled.title = "   ".to_string();
        assert!(matches!(untitled.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_fields_reject_garbage_timestamp() {
        let result: Result<EventFields, _> = serde_json::from_str(
            r#"{"title": "x", "description": "", "start_time": "soon", "end_time": "later"}"#,
        );
        assert!(result.is_err());
    }
}
