//! VRAIN public rainfall API client.
//!
//! Handles fetching and parsing of the current-conditions endpoint:
//!   https://data.vrain.vn/public/current/{province}.json
//!
//! The endpoint returns a bare JSON array with one element per station.
//! See `fixtures.rs` for annotated examples of the response structure.

use crate::ingest::SnapshotSource;
use crate::logging::{self, Component};
use crate::model::{NormalizedReading, RainError, UNKNOWN_STATION_NAME};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Serde structures
// ---------------------------------------------------------------------------

/// One element of the API response, as delivered.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub station: Option<RawStation>,
    #[serde(rename = "sumDepth", default, deserialize_with = "depth")]
    pub sum_depth: Option<f64>,
    #[serde(default, deserialize_with = "display_hint")]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "display_hint")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawStation {
    #[serde(default, deserialize_with = "display_hint")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "display_hint")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "display_hint")]
    pub address: Option<String>,
}

impl RawRecord {
    /// Convenience constructor for a record with id, name and depth only.
    pub fn new(uuid: &str, name: &str, sum_depth: f64) -> Self {
        RawRecord {
            station: Some(RawStation {
                uuid: Some(uuid.to_string()),
                name: Some(name.to_string()),
                address: None,
            }),
            sum_depth: Some(sum_depth),
            level: None,
            color: None,
        }
    }
}

/// Display hints are free-form; the API has been seen sending both strings
/// and numbers for them. Anything else is dropped.
fn display_hint<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Depth as a number or a numeric string (`"5.2"`). Anything else reads as
/// `None`, which normalizes to 0 mm rather than dropping the station.
fn depth<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

pub const DEFAULT_API_URL: &str = "https://data.vrain.vn/public/current/31.json";

const CURRENT_BASE_URL: &str = "https://data.vrain.vn/public/current/";

/// Builds the current-conditions URL for a province code (e.g. `"31"`).
pub fn build_current_url(province_code: &str) -> String {
    format!("{}{}.json", CURRENT_BASE_URL, province_code)
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Builds a blocking client with an overall request timeout. A request that
/// exceeds it surfaces as `RainError::FetchError`.
pub fn build_client(timeout: Duration) -> Result<reqwest::blocking::Client, RainError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("rainmon_service/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RainError::FetchError(format!("failed to build HTTP client: {}", e)))
}

/// Performs the single unauthenticated GET and returns the body text.
///
/// # Errors
/// - `RainError::FetchError` - connection failure, timeout, unreadable body.
/// - `RainError::HttpError` - any non-2xx status.
pub fn fetch_snapshot(client: &reqwest::blocking::Client, url: &str) -> Result<String, RainError> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .map_err(|e| {
            if e.is_timeout() {
                RainError::FetchError(format!("request to {} timed out", url))
            } else {
                RainError::FetchError(format!("request to {} failed: {}", url, e))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(RainError::HttpError(status.as_u16()));
    }

    response
        .text()
        .map_err(|e| RainError::FetchError(format!("failed to read response body: {}", e)))
}

/// `SnapshotSource` backed by the live API.
pub struct HttpSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RainError> {
        Ok(HttpSource {
            client: build_client(timeout)?,
            url: url.to_string(),
        })
    }
}

impl SnapshotSource for HttpSource {
    fn fetch(&mut self) -> Result<String, RainError> {
        fetch_snapshot(&self.client, &self.url)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// One parsed response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub records: Vec<RawRecord>,
    /// Elements that were not record-shaped at all (not an object, or a
    /// `station` that is not an object) and were dropped.
    pub malformed: usize,
}

/// Parses a response body into raw records.
///
/// The body must be a JSON array. Individual elements that do not fit the
/// record shape are skipped with a warning so one bad station cannot sink
/// the whole snapshot; `Snapshot::malformed` counts them.
///
/// # Errors
/// - `RainError::ParseError` - body is not valid JSON or not an array.
pub fn parse_snapshot(json: &str) -> Result<Snapshot, RainError> {
    let elements: Vec<serde_json::Value> = serde_json::from_str(json).map_err(|e| {
        RainError::ParseError(format!("expected a JSON array of station records: {}", e))
    })?;

    let mut snapshot = Snapshot {
        records: Vec::with_capacity(elements.len()),
        malformed: 0,
    };
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<RawRecord>(element) {
            Ok(record) => snapshot.records.push(record),
            Err(e) => {
                snapshot.malformed += 1;
                logging::warn(
                    Component::Api,
                    None,
                    &format!("skipping malformed record #{}: {}", index, e),
                );
            }
        }
    }

    Ok(snapshot)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Maps one raw record to a normalized reading.
///
/// Returns `None` when the station identifier is missing or blank. A missing
/// or empty name falls back to `UNKNOWN_STATION_NAME`; a missing depth
/// counts as 0 mm.
pub fn normalize(record: &RawRecord) -> Option<NormalizedReading> {
    let station = record.station.as_ref()?;
    let id = station
        .uuid
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())?;

    let name = station
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(UNKNOWN_STATION_NAME);

    Some(NormalizedReading {
        id: id.to_string(),
        name: name.to_string(),
        value: record.sum_depth.unwrap_or(0.0),
        address: station.address.clone(),
        level: record.level.clone(),
        color: record.color.clone(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
