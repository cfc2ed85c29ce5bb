//! Core data types for the rainfall monitoring service.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no logic beyond trivial constructors and one lenient number
//! reader for stored depths, and no I/O.
//!
//! Field names serialize in camelCase so the persisted JSON keeps the same
//! shape as the `rainData` / `rainHistory` / `rainChanges` storage entries.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Caps
// ---------------------------------------------------------------------------

/// Maximum archived rain days kept per station.
pub const HISTORY_CAP: usize = 7;

/// Maximum change records kept per station.
pub const CHANGE_CAP: usize = 10;

/// Display name used when the upstream record carries no station name.
pub const UNKNOWN_STATION_NAME: &str = "Không rõ";

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A station reading after normalization, before it is stamped with a
/// rain day and timestamp by the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReading {
    pub id: String,
    pub name: String,
    /// Cumulative rainfall depth in mm.
    pub value: f64,
    pub address: Option<String>,
    pub level: Option<String>,
    pub color: Option<String>,
}

/// The latest stored reading for one station.
///
/// `day` is always the rain day that was current when this record was
/// written; `timestamp` is epoch millis of that write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationReading {
    pub name: String,
    /// `None` when the stored value is not a number (null, a string left by
    /// an older writer). Such a reading is never diffed against.
    #[serde(default, deserialize_with = "stored_number")]
    pub value: Option<f64>,
    pub day: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A prior rain day's final reading for one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub day: String,
    #[serde(default, deserialize_with = "stored_number")]
    pub value: Option<f64>,
    pub timestamp: i64,
}

/// One detected value change.
///
/// `time` is the local display string captured at detection; `timestamp`
/// is the same instant as epoch millis and is what ordering uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub time: String,
    #[serde(default)]
    pub timestamp: i64,
    pub old_value: f64,
    pub new_value: f64,
    pub diff: f64,
}

/// A station whose value changed during one reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedStation {
    pub id: String,
    pub name: String,
    pub diff: f64,
    pub new_value: f64,
}

/// Reads a stored depth. Only JSON numbers count; anything else loads as
/// `None` so one odd entry cannot make the whole map unreadable.
fn stored_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()))
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// Everything the service keeps between cycles.
///
/// Maps are ordered so serialization is stable across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub current: BTreeMap<String, StationReading>,
    pub history: BTreeMap<String, Vec<HistoryEntry>>,
    pub changes: BTreeMap<String, Vec<ChangeEntry>>,
    pub last_rain_day: Option<String>,
    pub last_fetch_timestamp: Option<i64>,
}

impl PersistedState {
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.history.is_empty() && self.changes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can abort a reconciliation cycle.
///
/// Every variant is recoverable: the cycle is abandoned without writing and
/// the next scheduled cycle starts over from the last persisted state.
#[derive(Debug, PartialEq)]
pub enum RainError {
    /// Network failure or timeout talking to the rainfall API.
    FetchError(String),
    /// Non-2xx HTTP response from the rainfall API.
    HttpError(u16),
    /// The response body could not be deserialized.
    ParseError(String),
    /// Reading or writing persisted state failed.
    PersistenceError(String),
}

impl RainError {
    /// True for the failures that happen before any state is touched.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, RainError::FetchError(_) | RainError::HttpError(_))
    }
}

impl std::fmt::Display for RainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RainError::FetchError(msg) => write!(f, "Fetch error: {}", msg),
            RainError::HttpError(code) => write!(f, "HTTP error: {}", code),
            RainError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            RainError::PersistenceError(msg) => write!(f, "Persistence error: {}", msg),
        }
    }
}

impl std::error::Error for RainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_reading_serializes_camel_case_without_empty_hints() {
        let reading = StationReading {
            name: "Trạm A".to_string(),
            value: Some(5.0),
            day: "2024-01-01".to_string(),
            timestamp: 1_704_067_200_000,
            address: None,
            level: None,
            color: None,
        };

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["day"], "2024-01-01");
        assert_eq!(json["timestamp"], 1_704_067_200_000_i64);
        assert!(json.get("address").is_none(), "absent hints should be omitted");
    }

    #[test]
    fn test_change_entry_uses_storage_field_names() {
        let entry = ChangeEntry {
            time: "10:00:00 01/01/2024".to_string(),
            timestamp: 1,
            old_value: 5.0,
            new_value: 7.3,
            diff: 2.3,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["oldValue"], 5.0);
        assert_eq!(json["newValue"], 7.3);
        assert_eq!(json["diff"], 2.3);
    }

    #[test]
    fn test_change_entry_without_timestamp_still_loads() {
        // Entries written before the numeric timestamp existed.
        let json = r#"{"time":"10:00:00 01/01/2024","oldValue":1.0,"newValue":2.0,"diff":1.0}"#;
        let entry: ChangeEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.timestamp, 0);
        assert_eq!(entry.diff, 1.0);
    }

    #[test]
    fn test_non_numeric_stored_values_load_as_none() {
        let json = r#"{
            "A": {"name": "Trạm A", "value": null, "day": "2024-01-01", "timestamp": 1},
            "B": {"name": "Trạm B", "value": "5.0", "day": "2024-01-01", "timestamp": 1},
            "C": {"name": "Trạm C", "day": "2024-01-01", "timestamp": 1},
            "D": {"name": "Trạm D", "value": 2.0, "day": "2024-01-01", "timestamp": 1}
        }"#;
        let current: BTreeMap<String, StationReading> = serde_json::from_str(json).unwrap();

        assert_eq!(current["A"].value, None);
        assert_eq!(current["B"].value, None, "strings are not numbers");
        assert_eq!(current["C"].value, None);
        assert_eq!(current["D"].value, Some(2.0));

        let history: HistoryEntry =
            serde_json::from_str(r#"{"day":"2024-01-01","value":{},"timestamp":1}"#).unwrap();
        assert_eq!(history.value, None);
    }

    #[test]
    fn test_error_display_messages() {
        assert_eq!(RainError::HttpError(500).to_string(), "HTTP error: 500");
        assert_eq!(
            RainError::ParseError("bad".to_string()).to_string(),
            "Parse error: bad"
        );
        assert!(RainError::HttpError(503).is_fetch_failure());
        assert!(!RainError::PersistenceError("x".to_string()).is_fetch_failure());
    }
}
