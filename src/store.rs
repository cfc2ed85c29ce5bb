//! Persistence gateway.
//!
//! State lives in a flat key/value store under five logical keys, each
//! holding a JSON tree. `load_state` / `save_state` translate between those
//! entries and `PersistedState`; backends only move JSON values around.
//!
//! Backends:
//! - `JsonFileStore` - one JSON object on disk, replaced atomically
//! - `PostgresStore` - `rainmon.kv_state` table, one transaction per save
//! - `MemoryStore`   - in-process, for tests and dry runs

use postgres::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{StorageBackend, StorageConfig};
use crate::db::{self, DbConfigError};
use crate::model::{PersistedState, RainError};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

pub const KEY_CURRENT: &str = "rainData";
pub const KEY_HISTORY: &str = "rainHistory";
pub const KEY_CHANGES: &str = "rainChanges";
pub const KEY_LAST_RAIN_DAY: &str = "lastRainDay";
pub const KEY_LAST_FETCH: &str = "lastFetch";

pub const STATE_KEYS: [&str; 5] = [
    KEY_CURRENT,
    KEY_HISTORY,
    KEY_CHANGES,
    KEY_LAST_RAIN_DAY,
    KEY_LAST_FETCH,
];

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Bulk get/set of named JSON entries.
///
/// `set_many` must be all-or-nothing: either every entry is written or the
/// store is left as it was.
pub trait KeyValueStore {
    /// Returns the entries that exist; absent keys are simply missing.
    fn get_many(&mut self, keys: &[&str]) -> Result<HashMap<String, Value>, RainError>;

    fn set_many(&mut self, entries: &[(&str, Value)]) -> Result<(), RainError>;
}

fn decode<T: DeserializeOwned + Default>(
    entries: &mut HashMap<String, Value>,
    key: &str,
) -> Result<T, RainError> {
    match entries.remove(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| {
            RainError::PersistenceError(format!("stored '{}' is unreadable: {}", key, e))
        }),
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Value, RainError> {
    serde_json::to_value(value)
        .map_err(|e| RainError::PersistenceError(format!("failed to encode '{}': {}", key, e)))
}

/// Reads the full state; missing keys load as empty.
pub fn load_state(store: &mut dyn KeyValueStore) -> Result<PersistedState, RainError> {
    let mut entries = store.get_many(&STATE_KEYS)?;

    Ok(PersistedState {
        current: decode(&mut entries, KEY_CURRENT)?,
        history: decode(&mut entries, KEY_HISTORY)?,
        changes: decode(&mut entries, KEY_CHANGES)?,
        last_rain_day: decode(&mut entries, KEY_LAST_RAIN_DAY)?,
        last_fetch_timestamp: decode(&mut entries, KEY_LAST_FETCH)?,
    })
}

/// Writes the full state in one bulk call.
pub fn save_state(store: &mut dyn KeyValueStore, state: &PersistedState) -> Result<(), RainError> {
    let entries = vec![
        (KEY_CURRENT, encode(KEY_CURRENT, &state.current)?),
        (KEY_HISTORY, encode(KEY_HISTORY, &state.history)?),
        (KEY_CHANGES, encode(KEY_CHANGES, &state.changes)?),
        (KEY_LAST_RAIN_DAY, encode(KEY_LAST_RAIN_DAY, &state.last_rain_day)?),
        (KEY_LAST_FETCH, encode(KEY_LAST_FETCH, &state.last_fetch_timestamp)?),
    ];
    store.set_many(&entries)
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }
}

impl KeyValueStore for MemoryStore {
    fn get_many(&mut self, keys: &[&str]) -> Result<HashMap<String, Value>, RainError> {
        Ok(keys
            .iter()
            .filter_map(|k| self.entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set_many(&mut self, entries: &[(&str, Value)]) -> Result<(), RainError> {
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value.clone());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file backend
// ---------------------------------------------------------------------------

/// Keeps every entry in one pretty-printed JSON object.
///
/// Saves go to `<path>.tmp` first and are renamed over the real file, so an
/// interrupted write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonFileStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn read_all(&self) -> Result<serde_json::Map<String, Value>, RainError> {
        if !self.path.exists() {
            return Ok(serde_json::Map::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            RainError::PersistenceError(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        if contents.trim().is_empty() {
            return Ok(serde_json::Map::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            RainError::PersistenceError(format!("{} is not a JSON object: {}", self.path.display(), e))
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_many(&mut self, keys: &[&str]) -> Result<HashMap<String, Value>, RainError> {
        let mut all = self.read_all()?;
        Ok(keys
            .iter()
            .filter_map(|k| all.remove(*k).map(|v| (k.to_string(), v)))
            .collect())
    }

    fn set_many(&mut self, entries: &[(&str, Value)]) -> Result<(), RainError> {
        let mut all = self.read_all()?;
        for (key, value) in entries {
            all.insert(key.to_string(), value.clone());
        }

        let json = serde_json::to_string_pretty(&Value::Object(all)).map_err(|e| {
            RainError::PersistenceError(format!("failed to serialize state: {}", e))
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                RainError::PersistenceError(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|e| {
            RainError::PersistenceError(format!("failed to write {}: {}", temp.display(), e))
        })?;
        fs::rename(&temp, &self.path).map_err(|e| {
            RainError::PersistenceError(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL backend
// ---------------------------------------------------------------------------

/// Entries in `rainmon.kv_state`, values as JSONB.
pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    /// Connects using DATABASE_URL and verifies the schema and table.
    pub fn connect() -> Result<Self, DbConfigError> {
        Ok(PostgresStore {
            client: db::connect_and_verify()?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        PostgresStore { client }
    }
}

impl KeyValueStore for PostgresStore {
    fn get_many(&mut self, keys: &[&str]) -> Result<HashMap<String, Value>, RainError> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let rows = self
            .client
            .query(
                "SELECT key, value FROM rainmon.kv_state WHERE key = ANY($1)",
                &[&keys],
            )
            .map_err(|e| RainError::PersistenceError(format!("state query failed: {}", e)))?;

        let mut entries = HashMap::new();
        for row in rows {
            let key: String = row.get(0);
            let value: Value = row.get(1);
            entries.insert(key, value);
        }
        Ok(entries)
    }

    fn set_many(&mut self, entries: &[(&str, Value)]) -> Result<(), RainError> {
        let mut transaction = self
            .client
            .transaction()
            .map_err(|e| RainError::PersistenceError(format!("failed to open transaction: {}", e)))?;

        for (key, value) in entries {
            transaction
                .execute(
                    "INSERT INTO rainmon.kv_state (key, value, updated_at) \
                     VALUES ($1, $2, now()) \
                     ON CONFLICT (key) DO UPDATE SET \
                        value = EXCLUDED.value, \
                        updated_at = EXCLUDED.updated_at",
                    &[key, value],
                )
                .map_err(|e| {
                    RainError::PersistenceError(format!("failed to write '{}': {}", key, e))
                })?;
        }

        // Dropping an uncommitted transaction rolls it back.
        transaction
            .commit()
            .map_err(|e| RainError::PersistenceError(format!("commit failed: {}", e)))
    }
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Opens the backend named in `[storage]`.
///
/// Each call returns an independent handle, so the daemon and the HTTP
/// endpoint can each hold one.
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn KeyValueStore + Send>, Box<dyn std::error::Error>> {
    match config.backend {
        StorageBackend::File => Ok(Box::new(JsonFileStore::new(&config.path))),
        StorageBackend::Postgres => Ok(Box::new(PostgresStore::connect()?)),
        StorageBackend::Memory => Ok(Box::new(MemoryStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeEntry, HistoryEntry, StationReading};

    fn sample_state() -> PersistedState {
        let mut state = PersistedState::default();
        state.current.insert(
            "A".into(),
            StationReading {
                name: "Trạm A".into(),
                value: Some(7.3),
                day: "2024-01-02".into(),
                timestamp: 1_704_200_000_000,
                address: Some("Hòa Bình".into()),
                level: None,
                color: Some("#2e86de".into()),
            },
        );
        state.history.insert(
            "A".into(),
            vec![HistoryEntry { day: "2024-01-01".into(), value: Some(5.0), timestamp: 1 }],
        );
        state.changes.insert(
            "A".into(),
            vec![ChangeEntry {
                time: "20:00:00 02/01/2024".into(),
                timestamp: 1_704_200_000_000,
                old_value: 5.0,
                new_value: 7.3,
                diff: 2.3,
            }],
        );
        state.last_rain_day = Some("2024-01-02".into());
        state.last_fetch_timestamp = Some(1_704_200_000_000);
        state
    }

    #[test]
    fn test_empty_store_loads_default_state() {
        let mut store = MemoryStore::new();
        let state = load_state(&mut store).unwrap();
        assert_eq!(state, PersistedState::default());
    }

    #[test]
    fn test_memory_store_save_then_load() {
        let mut store = MemoryStore::new();
        save_state(&mut store, &sample_state()).unwrap();

        assert_eq!(store.entries().len(), STATE_KEYS.len());
        assert_eq!(store.entries()[KEY_LAST_RAIN_DAY], "2024-01-02");
        assert_eq!(load_state(&mut store).unwrap(), sample_state());
    }

    #[test]
    fn test_storage_layout_uses_logical_keys() {
        let mut store = MemoryStore::new();
        save_state(&mut store, &sample_state()).unwrap();

        let current = &store.entries()[KEY_CURRENT];
        assert_eq!(current["A"]["value"], 7.3);
        assert_eq!(store.entries()[KEY_CHANGES]["A"][0]["oldValue"], 5.0);
        assert_eq!(store.entries()[KEY_LAST_FETCH], 1_704_200_000_000_i64);
    }

    #[test]
    fn test_unreadable_entry_is_persistence_error() {
        let mut store = MemoryStore::new();
        store
            .set_many(&[(KEY_CURRENT, serde_json::json!("not a map"))])
            .unwrap();

        let result = load_state(&mut store);
        assert!(
            matches!(result, Err(RainError::PersistenceError(ref m)) if m.contains(KEY_CURRENT)),
            "got {:?}",
            result
        );
    }

    #[test]
    fn test_null_station_value_loads_without_error() {
        let mut store = MemoryStore::new();
        store
            .set_many(&[(
                KEY_CURRENT,
                serde_json::json!({
                    "A": {"name": "Trạm A", "value": null, "day": "2024-01-01", "timestamp": 1},
                    "B": {"name": "Trạm B", "value": 2.0, "day": "2024-01-01", "timestamp": 1}
                }),
            )])
            .unwrap();

        let state = load_state(&mut store).unwrap();
        assert_eq!(state.current["A"].value, None);
        assert_eq!(state.current["B"].value, Some(2.0));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("state.json"));
        assert!(load_state(&mut store).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_save_then_load_and_no_temp_left() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let mut store = JsonFileStore::new(&path);

        save_state(&mut store, &sample_state()).unwrap();

        assert!(path.exists());
        assert!(!store.temp_path().exists(), "temp file should be renamed away");
        let mut reopened = JsonFileStore::new(&path);
        assert_eq!(load_state(&mut reopened).unwrap(), sample_state());
    }

    #[test]
    fn test_file_store_keeps_unrelated_entries() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("state.json"));
        store
            .set_many(&[("viewPrefs", serde_json::json!({"expanded": ["A"]}))])
            .unwrap();

        save_state(&mut store, &sample_state()).unwrap();

        let extra = store.get_many(&["viewPrefs"]).unwrap();
        assert_eq!(extra["viewPrefs"]["expanded"][0], "A");
    }

    #[test]
    fn test_file_store_corrupt_file_is_persistence_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "[1, 2").unwrap();

        let mut store = JsonFileStore::new(&path);
        assert!(matches!(
            load_state(&mut store),
            Err(RainError::PersistenceError(_))
        ));
    }

    #[test]
    fn test_open_store_file_backend_uses_configured_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::File,
            path: dir.path().join("state.json"),
        };

        let mut store = open_store(&config).unwrap();
        save_state(store.as_mut(), &sample_state()).unwrap();
        assert!(config.path.exists());
    }

    #[test]
    #[ignore] // Only run when database is available
    fn test_postgres_store_save_then_load() {
        let mut store = PostgresStore::connect().expect("database should be reachable");
        save_state(&mut store, &sample_state()).unwrap();
        assert_eq!(load_state(&mut store).unwrap(), sample_state());
    }
}
