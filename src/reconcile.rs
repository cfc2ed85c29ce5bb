//! Fetch-diff-persist core.
//!
//! `reconcile` takes the previously persisted state by value, folds one
//! snapshot into it and hands back the new state plus the stations whose
//! value moved. It performs no I/O: loading and saving happen around it in
//! the daemon, so a failed cycle simply never reaches the save.
//!
//! Per station, in snapshot order:
//! 1. normalize; records without an id are skipped
//! 2. if the stored reading belongs to an older rain day, archive it to
//!    history (capped at `HISTORY_CAP`)
//! 3. if the stored value is a number and differs after rounding to 0.1 mm,
//!    append a change record (capped at `CHANGE_CAP`) and report the
//!    station as changed
//! 4. overwrite the current reading with the new value, the current rain
//!    day and `now`
//!
//! Before any station is processed, the whole change log is cleared if the
//! rain day differs from the one recorded by the previous cycle.

use chrono::{DateTime, TimeZone};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;

use crate::ingest::vrain::{RawRecord, normalize};
use crate::model::{
    CHANGE_CAP, ChangeEntry, ChangedStation, HISTORY_CAP, HistoryEntry, PersistedState,
    StationReading,
};
use crate::rain_day::{human_time, rain_day};

/// Output of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub state: PersistedState,
    /// Stations whose value changed, in snapshot order.
    pub changed: Vec<ChangedStation>,
    /// Records dropped for a missing id or a repeated id.
    pub skipped: usize,
    /// True when this cycle started a new rain day and cleared the change log.
    pub rolled_over: bool,
}

/// Rounds to one decimal place, halves away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Appends `item` and drops from the front until at most `cap` remain.
pub fn push_capped<T>(list: &mut Vec<T>, item: T, cap: usize) {
    list.push(item);
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(..excess);
    }
}

/// Folds `snapshot` into `previous` as of `now`.
///
/// Stations missing from the snapshot drop out of `current`; their history
/// and change records are kept. When the same id appears more than once,
/// the first occurrence is used.
pub fn reconcile<Tz: TimeZone>(
    previous: PersistedState,
    snapshot: &[RawRecord],
    now: &DateTime<Tz>,
) -> Reconciliation
where
    Tz::Offset: Display,
{
    let day = rain_day(now);
    let timestamp = now.timestamp_millis();
    let time = human_time(now);

    let PersistedState {
        current: previous_current,
        mut history,
        mut changes,
        last_rain_day,
        ..
    } = previous;

    let rolled_over = last_rain_day.as_deref().is_some_and(|last| last != day);
    if rolled_over {
        changes.clear();
    }

    let mut current = BTreeMap::new();
    let mut changed = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped = 0;

    for record in snapshot {
        let Some(reading) = normalize(record) else {
            skipped += 1;
            continue;
        };
        if !seen.insert(reading.id.clone()) {
            skipped += 1;
            continue;
        }

        if let Some(prior) = previous_current.get(&reading.id) {
            if prior.day != day {
                push_capped(
                    history.entry(reading.id.clone()).or_default(),
                    HistoryEntry {
                        day: prior.day.clone(),
                        value: prior.value,
                        timestamp: prior.timestamp,
                    },
                    HISTORY_CAP,
                );
            }

            if let Some(old_value) = prior.value {
                let diff = round1(reading.value - old_value);
                if diff != 0.0 {
                    push_capped(
                        changes.entry(reading.id.clone()).or_default(),
                        ChangeEntry {
                            time: time.clone(),
                            timestamp,
                            old_value,
                            new_value: reading.value,
                            diff,
                        },
                        CHANGE_CAP,
                    );
                    changed.push(ChangedStation {
                        id: reading.id.clone(),
                        name: reading.name.clone(),
                        diff,
                        new_value: reading.value,
                    });
                }
            }
        }

        current.insert(
            reading.id,
            StationReading {
                name: reading.name,
                value: Some(reading.value),
                day: day.clone(),
                timestamp,
                address: reading.address,
                level: reading.level,
                color: reading.color,
            },
        );
    }

    Reconciliation {
        state: PersistedState {
            current,
            history,
            changes,
            last_rain_day: Some(day),
            last_fetch_timestamp: Some(timestamp),
        },
        changed,
        skipped,
        rolled_over,
    }
}
