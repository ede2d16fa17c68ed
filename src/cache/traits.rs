//! Types describing what a cache read returned.

use chrono::{DateTime, Utc};

/// Result of a cache read, including metadata about where the value came from.
#[derive(Debug, Clone)]
pub struct Cached<T> {
  /// The current value, if any was seeded or fetched
  pub data: Option<T>,
  /// Where the value came from
  pub source: CacheSource,
  /// When the last fetch for this key completed
  pub checked_at: Option<DateTime<Utc>>,
  /// Message of the most recent failed fetch, cleared by the next success
  pub error: Option<String>,
  /// Whether a fetch is in flight
  pub loading: bool,
}

impl<T> Cached<T> {
  /// Read result for a key nothing has been mounted under.
  pub fn empty() -> Self {
    Self {
      data: None,
      source: CacheSource::Empty,
      checked_at: None,
      error: None,
      loading: false,
    }
  }

  /// The value, or `T::default()` when there is none yet.
  pub fn into_data(self) -> T
  where
    T: Default,
  {
    self.data.unwrap_or_default()
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Nothing seeded or fetched yet
  Empty,
  /// Snapshot supplied when the entry was mounted
  Fallback,
  /// Result of a fetch
  Network,
  /// Written locally with `SwrCache::set`
  Local,
}
