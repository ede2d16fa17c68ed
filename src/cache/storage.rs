//! In-memory entry table behind the cache layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use color_eyre::Result;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::traits::CacheSource;

/// Produces a fresh fetch of one key's value.
pub(super) type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Completion of a spawned fetch, shared by every waiter.
pub(super) type InFlight = Shared<BoxFuture<'static, std::result::Result<(), String>>>;

/// One cached key.
pub(super) struct Entry {
  pub value: Option<Value>,
  pub source: CacheSource,
  pub checked_at: Option<DateTime<Utc>>,
  pub last_error: Option<String>,
  pub fetcher: Option<Fetcher>,
  /// Generation and completion of the fetch currently in flight
  pub inflight: Option<(u64, InFlight)>,
  /// Last generation handed out to a fetch or a local write
  pub issued: u64,
  /// Generation of the current value
  pub applied: u64,
  pub tx: watch::Sender<Option<Value>>,
}

impl Entry {
  fn new() -> Self {
    let (tx, _rx) = watch::channel(None);
    Self {
      value: None,
      source: CacheSource::Empty,
      checked_at: None,
      last_error: None,
      fetcher: None,
      inflight: None,
      issued: 0,
      applied: 0,
      tx,
    }
  }

  pub fn next_generation(&mut self) -> u64 {
    self.issued += 1;
    self.issued
  }

  /// Replace the value and notify subscribers.
  pub fn publish(&mut self, value: Value, source: CacheSource) {
    self.value = Some(value.clone());
    self.source = source;
    self.tx.send_replace(Some(value));
  }
}

/// Entries keyed by cache key. The lock is never held across an await.
#[derive(Default)]
pub(super) struct EntryTable {
  entries: Mutex<HashMap<String, Entry>>,
}

impl EntryTable {
  /// Run `f` on the entry for `key`, creating an empty one if needed.
  pub fn with_entry<R>(&self, key: &str, f: impl FnOnce(&mut Entry) -> R) -> R {
    let mut entries = self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    let entry = entries.entry(key.to_string()).or_insert_with(Entry::new);
    f(entry)
  }

  /// Run `f` on the entry for `key` if it exists.
  pub fn inspect<R>(&self, key: &str, f: impl FnOnce(&Entry) -> R) -> Option<R> {
    let entries = self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    entries.get(key).map(f)
  }

  /// Record the outcome of fetch `generation` for `key`.
  ///
  /// A successful value is only applied when no newer fetch or local write
  /// has been applied already.
  pub fn complete(
    &self,
    key: &str,
    generation: u64,
    result: Result<Value>,
  ) -> std::result::Result<(), String> {
    self.with_entry(key, |entry| {
      if matches!(entry.inflight, Some((g, _)) if g == generation) {
        entry.inflight = None;
      }
      entry.checked_at = Some(Utc::now());

      match result {
        Ok(value) => {
          if generation > entry.applied {
            entry.applied = generation;
            entry.last_error = None;
            entry.publish(value, CacheSource::Network);
          } else {
            debug!(key = %key, generation, "Discarding outdated fetch result");
          }
          Ok(())
        }
        Err(e) => {
          warn!(key = %key, error = %e, "Fetch failed, keeping previous value");
          let message = e.to_string();
          if generation > entry.applied {
            entry.last_error = Some(message.clone());
          }
          Err(message)
        }
      }
    })
  }
}
