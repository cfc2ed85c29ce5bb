/// rainmon_service: rainfall station poller for the VRAIN network.
///
/// # Module structure
///
/// ```text
/// rainmon_service
/// ├── model       - shared data types (StationReading, ChangeEntry, RainError, …)
/// ├── config      - service configuration loader (rainmon.toml)
/// ├── rain_day    - 19:00-to-19:00 rain day labelling
/// ├── reconcile   - snapshot vs. persisted state: current, history, changes
/// ├── notify      - change summary text + Notifier implementations
/// ├── store       - key/value persistence (JSON file, PostgreSQL, memory)
/// ├── db          - PostgreSQL connection and schema checks
/// ├── daemon      - poll loop (fetch, reconcile, save, notify)
/// ├── view        - read-only station views (text + HTML)
/// ├── endpoint    - HTTP server for the views
/// ├── logging     - leveled, component-tagged log output
/// └── ingest
///     ├── vrain   - VRAIN API: URL construction, fetch, tolerant parsing
///     └── fixtures (test only) - representative API response payloads
/// ```

/// Public modules
pub mod config;
pub mod daemon;
pub mod db;
pub mod endpoint;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod notify;
pub mod rain_day;
pub mod reconcile;
pub mod store;
pub mod view;
