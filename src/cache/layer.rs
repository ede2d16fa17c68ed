//! Cache layer that orchestrates stale-while-revalidate reads with fetching.

use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use super::storage::{Entry, EntryTable, Fetcher, InFlight};
use super::traits::{CacheSource, Cached};

/// Keyed stale-while-revalidate cache.
///
/// Reads return the current value at once and start a background refetch
/// when the value is stale. Every key has at most one fetch in flight;
/// `invalidate` forces a new one. Clones share the same entries.
#[derive(Clone)]
pub struct SwrCache {
  table: Arc<EntryTable>,
  /// How long after a fetch the value is considered stale
  stale_time: Duration,
}

impl Default for SwrCache {
  fn default() -> Self {
    Self::new()
  }
}

impl SwrCache {
  pub fn new() -> Self {
    Self {
      table: Arc::new(EntryTable::default()),
      stale_time: Duration::seconds(60),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  fn is_stale(&self, entry: &Entry) -> bool {
    entry
      .checked_at
      .map(|at| Utc::now() - at > self.stale_time)
      .unwrap_or(true)
  }

  /// Register the fetcher for `key`, seeding `fallback` if the entry has
  /// no value yet. The most recent mount's fetcher is the one used.
  ///
  /// The fetcher is called with the cache locked, so it must only build
  /// its future and never touch the cache itself.
  pub fn mount<T, F, Fut>(&self, key: &str, fallback: Option<T>, fetcher: F) -> Result<()>
  where
    T: Serialize + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let fallback = fallback
      .map(serde_json::to_value)
      .transpose()
      .map_err(|e| eyre!("Failed to serialize fallback for {}: {}", key, e))?;

    let fetcher: Fetcher = Arc::new(move || {
      let fut = fetcher();
      async move {
        let data = fut.await?;
        serde_json::to_value(data).map_err(|e| eyre!("Failed to serialize fetched value: {}", e))
      }
      .boxed()
    });

    self.table.with_entry(key, |entry| {
      entry.fetcher = Some(fetcher);
      if entry.value.is_none() {
        if let Some(value) = fallback {
          entry.publish(value, CacheSource::Fallback);
        }
      }
    });
    Ok(())
  }

  /// Whether a fetcher is registered for `key`.
  pub fn is_mounted(&self, key: &str) -> bool {
    self
      .table
      .inspect(key, |entry| entry.fetcher.is_some())
      .unwrap_or(false)
  }

  /// Current value without triggering a refetch.
  pub fn peek<T: DeserializeOwned>(&self, key: &str) -> Result<Cached<T>> {
    let snapshot = self.table.inspect(key, |entry| {
      (
        entry.value.clone(),
        entry.source,
        entry.checked_at,
        entry.last_error.clone(),
        entry.inflight.is_some(),
      )
    });

    let Some((value, source, checked_at, error, loading)) = snapshot else {
      return Ok(Cached::empty());
    };

    let data = value
      .map(serde_json::from_value)
      .transpose()
      .map_err(|e| eyre!("Cached value for {} has an unexpected shape: {}", key, e))?;

    Ok(Cached {
      data,
      source,
      checked_at,
      error,
      loading,
    })
  }

  /// Current value; starts a background refetch when it is stale.
  pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Cached<T>> {
    let needs_fetch = self
      .table
      .inspect(key, |entry| {
        entry.fetcher.is_some() && entry.inflight.is_none() && self.is_stale(entry)
      })
      .unwrap_or(false);

    // Outside a runtime the value is served as-is
    if needs_fetch && tokio::runtime::Handle::try_current().is_ok() {
      self.start_fetch(key, false)?;
    }

    self.peek(key)
  }

  /// Refetch `key`, joining the fetch already in flight if there is one.
  ///
  /// Resolves once the value has been applied. A failed fetch keeps the
  /// previous value and is returned as the error.
  pub async fn revalidate(&self, key: &str) -> Result<()> {
    let inflight = self.start_fetch(key, false)?;
    inflight.await.map_err(|e| eyre!(e))
  }

  /// Mark `key` stale and refetch it, even if a fetch is in flight.
  /// Subscribers see the new value once it resolves.
  pub async fn invalidate(&self, key: &str) -> Result<()> {
    let inflight = self.start_fetch(key, true)?;
    inflight.await.map_err(|e| eyre!(e))
  }

  /// Write `value` locally. Fetches started before this call can no
  /// longer overwrite it, and the value counts as fresh so reads do not
  /// start a fetch that would.
  pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)
      .map_err(|e| eyre!("Failed to serialize value for {}: {}", key, e))?;
    self.table.with_entry(key, |entry| {
      let generation = entry.next_generation();
      entry.applied = generation;
      entry.checked_at = Some(Utc::now());
      entry.publish(value, CacheSource::Local);
    });
    Ok(())
  }

  /// Receiver that observes every value published for `key`.
  pub fn subscribe(&self, key: &str) -> watch::Receiver<Option<Value>> {
    self.table.with_entry(key, |entry| entry.tx.subscribe())
  }

  /// Spawn a fetch for `key` unless one is in flight and `force` is false.
  ///
  /// The fetch runs on its own task, so it completes and is applied even
  /// when every waiter is dropped.
  fn start_fetch(&self, key: &str, force: bool) -> Result<InFlight> {
    let runtime = tokio::runtime::Handle::try_current()
      .map_err(|_| eyre!("Fetching {} requires a tokio runtime", key))?;
    let table = Arc::clone(&self.table);

    self.table.with_entry(key, |entry| {
      if !force {
        if let Some((_, inflight)) = &entry.inflight {
          return Ok(inflight.clone());
        }
      }

      let fetcher = entry
        .fetcher
        .clone()
        .ok_or_else(|| eyre!("No fetcher mounted for {}", key))?;
      let generation = entry.next_generation();
      let fetch = fetcher();
      let key_owned = key.to_string();

      let handle = runtime.spawn(async move {
        let result = fetch.await;
        table.complete(&key_owned, generation, result)
      });

      let inflight: InFlight = async move {
        match handle.await {
          Ok(result) => result,
          Err(e) => Err(format!("Fetch task failed: {}", e)),
        }
      }
      .boxed()
      .shared();

      entry.inflight = Some((generation, inflight.clone()));
      Ok(inflight)
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration as StdDuration;

  fn counting_fetcher(
    counter: Arc<AtomicU32>,
    delay: StdDuration,
  ) -> impl Fn() -> futures::future::BoxFuture<'static, Result<u32>> + Send + Sync + 'static {
    move || {
      let counter = counter.clone();
      async move {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(delay).await;
        Ok(n)
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_fallback_served_before_fetch() {
    let cache = SwrCache::new();
    let counter = Arc::new(AtomicU32::new(0));
    cache
      .mount(
        "k",
        Some(0u32),
        counting_fetcher(counter.clone(), StdDuration::ZERO),
      )
      .unwrap();

    let first = cache.peek::<u32>("k").unwrap();
    assert_eq!(first.data, Some(0));
    assert_eq!(first.source, CacheSource::Fallback);

    cache.revalidate("k").await.unwrap();
    let second = cache.peek::<u32>("k").unwrap();
    assert_eq!(second.data, Some(1));
    assert_eq!(second.source, CacheSource::Network);
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_fetch() {
    let cache = SwrCache::new();
    let counter = Arc::new(AtomicU32::new(0));
    cache
      .mount::<u32, _, _>(
        "k",
        None,
        counting_fetcher(counter.clone(), StdDuration::from_millis(20)),
      )
      .unwrap();

    let (a, b, c) = tokio::join!(
      cache.revalidate("k"),
      cache.revalidate("k"),
      cache.revalidate("k")
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(cache.peek::<u32>("k").unwrap().data, Some(1));
  }

  #[tokio::test]
  async fn test_stale_read_revalidates_in_background() {
    let cache = SwrCache::new();
    let counter = Arc::new(AtomicU32::new(0));
    cache
      .mount(
        "k",
        Some(0u32),
        counting_fetcher(counter.clone(), StdDuration::ZERO),
      )
      .unwrap();

    let read = cache.read::<u32>("k").unwrap();
    assert_eq!(read.data, Some(0));
    assert!(read.loading);

    tokio::time::sleep(StdDuration::from_millis(20)).await;
    let read = cache.read::<u32>("k").unwrap();
    assert_eq!(read.data, Some(1));
    assert!(!read.loading);

    // Fresh now, so another read does not refetch
    tokio::time::sleep(StdDuration::from_millis(20)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_invalidate_notifies_subscribers() {
    let cache = SwrCache::new();
    let counter = Arc::new(AtomicU32::new(0));
    cache
      .mount::<u32, _, _>(
        "k",
        None,
        counting_fetcher(counter.clone(), StdDuration::ZERO),
      )
      .unwrap();
    let mut rx = cache.subscribe("k");

    cache.invalidate("k").await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), Some(serde_json::json!(1)));

    cache.invalidate("k").await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), Some(serde_json::json!(2)));
  }

  #[tokio::test]
  async fn test_failed_fetch_keeps_previous_value() {
    let cache = SwrCache::new();
    cache
      .mount("k", Some(vec!["seed".to_string()]), || async {
        Err::<Vec<String>, _>(eyre!("store unavailable"))
      })
      .unwrap();

    let err = cache.revalidate("k").await.unwrap_err();
    assert!(err.to_string().contains("store unavailable"));

    let read = cache.peek::<Vec<String>>("k").unwrap();
    assert_eq!(read.data, Some(vec!["seed".to_string()]));
    assert_eq!(read.source, CacheSource::Fallback);
    assert!(read.error.unwrap().contains("store unavailable"));
  }

  #[tokio::test]
  async fn test_invalidate_during_fetch_publishes_newer_result() {
    let cache = SwrCache::new();
    let counter = Arc::new(AtomicU32::new(0));
    let fetch_counter = counter.clone();
    cache
      .mount::<u32, _, _>("k", None, move || {
        let counter = fetch_counter.clone();
        async move {
          let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
          // The first fetch is the slow one
          let delay = if n == 1 { 80 } else { 10 };
          tokio::time::sleep(StdDuration::from_millis(delay)).await;
          Ok(n)
        }
      })
      .unwrap();

    let slow = {
      let cache = cache.clone();
      tokio::spawn(async move { cache.revalidate("k").await })
    };
    tokio::time::sleep(StdDuration::from_millis(5)).await;

    cache.invalidate("k").await.unwrap();
    assert_eq!(cache.peek::<u32>("k").unwrap().data, Some(2));

    slow.await.unwrap().unwrap();
    assert_eq!(cache.peek::<u32>("k").unwrap().data, Some(2));
  }

  #[tokio::test]
  async fn test_local_set_not_overwritten_by_older_fetch() {
    let cache = SwrCache::new();
    cache
      .mount("k", Some(vec![1u32, 2]), || async {
        tokio::time::sleep(StdDuration::from_millis(40)).await;
        Ok(vec![1u32, 2, 3])
      })
      .unwrap();

    let pending = {
      let cache = cache.clone();
      tokio::spawn(async move { cache.revalidate("k").await })
    };
    tokio::time::sleep(StdDuration::from_millis(5)).await;

    cache.set("k", &Vec::<u32>::new()).unwrap();
    pending.await.unwrap().unwrap();

    let read = cache.peek::<Vec<u32>>("k").unwrap();
    assert_eq!(read.data, Some(vec![]));
    assert_eq!(read.source, CacheSource::Local);
  }

  #[tokio::test]
  async fn test_read_after_local_set_does_not_refetch() {
    let cache = SwrCache::new();
    let counter = Arc::new(AtomicU32::new(0));
    cache
      .mount(
        "k",
        Some(5u32),
        counting_fetcher(counter.clone(), StdDuration::ZERO),
      )
      .unwrap();

    // The fallback was never fetched, so it is stale until the write
    cache.set("k", &0u32).unwrap();
    let read = cache.read::<u32>("k").unwrap();
    assert_eq!(read.data, Some(0));
    assert_eq!(read.source, CacheSource::Local);
    assert!(!read.loading);

    tokio::time::sleep(StdDuration::from_millis(20)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(cache.read::<u32>("k").unwrap().data, Some(0));
  }

  #[tokio::test]
  async fn test_second_mount_keeps_value() {
    let cache = SwrCache::new();
    cache
      .mount("k", Some(1u32), || async { Ok(10u32) })
      .unwrap();
    cache
      .mount("k", Some(2u32), || async { Ok(20u32) })
      .unwrap();

    assert_eq!(cache.peek::<u32>("k").unwrap().data, Some(1));
    cache.revalidate("k").await.unwrap();
    assert_eq!(cache.peek::<u32>("k").unwrap().data, Some(20));
  }

  #[test]
  fn test_unmounted_key_reads_empty() {
    let cache = SwrCache::new();
    let read = cache.read::<u32>("missing").unwrap();
    assert!(read.data.is_none());
    assert_eq!(read.source, CacheSource::Empty);
    assert!(!cache.is_mounted("missing"));
  }
}
