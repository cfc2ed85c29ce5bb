//! Core daemon implementation for the rainfall monitoring service
//!
//! One cycle:
//! 1. Fetch the current snapshot from the rainfall API
//! 2. Parse it (malformed elements are skipped, a malformed body aborts)
//! 3. Load the persisted state
//! 4. Reconcile snapshot against state
//! 5. Save the new state in one bulk write
//! 6. Dispatch a change summary if anything moved
//!
//! Any error in steps 1–5 abandons the cycle before the save, so persisted
//! state is never partially updated. Cycles run back to back on the calling
//! thread: one on startup, then one per poll interval. A slow fetch delays
//! the next cycle rather than overlapping with it.

use chrono::{DateTime, Local, TimeZone};
use std::error::Error;
use std::fmt::Display;

use crate::ingest::SnapshotSource;
use crate::ingest::vrain::parse_snapshot;
use crate::logging::{self, Component};
use crate::model::{ChangedStation, RainError};
use crate::notify::{DEFAULT_SUMMARY_LIMIT, Notifier, summarize};
use crate::reconcile::reconcile;
use crate::store::{KeyValueStore, load_state, save_state};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// How often to poll the rainfall API (default: 15 minutes)
    pub poll_interval_minutes: u64,

    /// Stations listed by name in a change summary before "…and N more"
    pub summary_limit: usize,

    /// Whether change summaries are handed to the notifier at all
    pub notify_enabled: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_minutes: 15,
            summary_limit: DEFAULT_SUMMARY_LIMIT,
            notify_enabled: true,
        }
    }
}

/// Outcome of a successful cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Stations now present in `current`.
    pub stations: usize,
    pub changed: Vec<ChangedStation>,
    /// Elements dropped while parsing plus records without a usable id.
    pub skipped: usize,
    pub rolled_over: bool,
    pub summary: Option<String>,
}

// ---------------------------------------------------------------------------
// Daemon State
// ---------------------------------------------------------------------------

pub struct Daemon {
    config: DaemonConfig,
    source: Box<dyn SnapshotSource>,
    store: Box<dyn KeyValueStore>,
    notifier: Box<dyn Notifier>,
}

impl Daemon {
    /// Create a daemon with default configuration
    pub fn new(
        source: Box<dyn SnapshotSource>,
        store: Box<dyn KeyValueStore>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self::with_config(DaemonConfig::default(), source, store, notifier)
    }

    /// Create a daemon with custom configuration
    pub fn with_config(
        config: DaemonConfig,
        source: Box<dyn SnapshotSource>,
        store: Box<dyn KeyValueStore>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            source,
            store,
            notifier,
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Direct access to the backing store, e.g. to inspect state after a cycle.
    pub fn store_mut(&mut self) -> &mut dyn KeyValueStore {
        self.store.as_mut()
    }

    /// Run one reconciliation cycle as of `now`.
    pub fn run_cycle_at<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<CycleReport, RainError>
    where
        Tz::Offset: Display,
    {
        let body = self.source.fetch()?;
        let snapshot = parse_snapshot(&body)?;
        logging::debug(
            Component::Api,
            None,
            &format!(
                "received {} records ({} malformed) from {}",
                snapshot.records.len() + snapshot.malformed,
                snapshot.malformed,
                self.source.describe()
            ),
        );

        let previous = load_state(self.store.as_mut())?;
        let result = reconcile(previous, &snapshot.records, now);
        save_state(self.store.as_mut(), &result.state)?;

        if result.rolled_over {
            logging::info(
                Component::Reconcile,
                None,
                &format!(
                    "new rain day {}, change log cleared",
                    result.state.last_rain_day.as_deref().unwrap_or("?")
                ),
            );
        }
        for station in &result.changed {
            logging::debug(
                Component::Reconcile,
                Some(&station.id),
                &format!("{} {:+.1} mm → {:.1} mm", station.name, station.diff, station.new_value),
            );
        }

        let summary = summarize(&result.changed, self.config.summary_limit);
        if self.config.notify_enabled {
            if let Some(text) = &summary {
                // State is already saved; a failed notification is only logged.
                if let Err(e) = self.notifier.notify(text, &result.changed) {
                    logging::warn(Component::Notify, None, &format!("notification failed: {}", e));
                }
            }
        }

        Ok(CycleReport {
            stations: result.state.current.len(),
            changed: result.changed,
            skipped: result.skipped + snapshot.malformed,
            rolled_over: result.rolled_over,
            summary,
        })
    }

    /// Run one cycle against the local wall clock.
    pub fn run_cycle(&mut self) -> Result<CycleReport, RainError> {
        self.run_cycle_at(&Local::now())
    }

    /// Run one cycle and log its outcome. Errors are swallowed after logging
    /// so the caller's loop keeps going.
    pub fn tick(&mut self) -> Option<CycleReport> {
        match self.run_cycle() {
            Ok(report) => {
                logging::info(
                    Component::System,
                    None,
                    &format!(
                        "✓ Cycle complete: {} stations, {} changed, {} skipped",
                        report.stations,
                        report.changed.len(),
                        report.skipped
                    ),
                );
                Some(report)
            }
            Err(e) => {
                logging::log_cycle_failure(&e);
                None
            }
        }
    }

    /// Main daemon loop (runs indefinitely)
    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        logging::info(
            Component::System,
            None,
            &format!(
                "🚀 Starting daemon loop (poll interval: {} minutes, source: {})",
                self.config.poll_interval_minutes,
                self.source.describe()
            ),
        );

        loop {
            let start = Local::now();

            self.tick();

            // Sleep until next poll interval
            let elapsed = (Local::now() - start).num_seconds();
            let sleep_seconds = (self.config.poll_interval_minutes * 60) as i64 - elapsed;

            if sleep_seconds > 0 {
                std::thread::sleep(std::time::Duration::from_secs(sleep_seconds as u64));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
