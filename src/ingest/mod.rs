//! Upstream data sources.
//!
//! Each provider gets its own file; the daemon only depends on the
//! `SnapshotSource` seam so cycles can be driven from canned payloads.

pub mod vrain;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::model::RainError;

/// Something that can produce the raw body of one snapshot.
///
/// Implementations must map transport failures and non-2xx responses to
/// `RainError::FetchError` / `RainError::HttpError`.
pub trait SnapshotSource {
    fn fetch(&mut self) -> Result<String, RainError>;

    /// Where the snapshot comes from, for log lines.
    fn describe(&self) -> String;
}
