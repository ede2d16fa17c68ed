//! Screen controllers.
//!
//! Each controller is a cheap `Clone` handle: views clone it into spawned
//! handlers and read its state on every render. Form state lives behind a
//! `std::sync::Mutex` that is never held across an `.await`.

pub mod account;
pub mod library;
pub mod password;
pub mod queries;
pub mod search;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::ai::Assistant;
use crate::cache::{CacheKey, Cached, SwrCache};
use crate::remote::{AuthSession, BlobStore, DataStore};

pub use account::AccountScreen;
pub use library::LibraryScreen;
pub use password::PasswordReset;
pub use search::SearchScreen;

/// Everything a screen talks to, shared by all screens of one session
#[derive(Clone)]
pub struct Context {
  pub user_id: String,
  pub store: Arc<dyn DataStore>,
  pub blobs: Arc<dyn BlobStore>,
  pub auth: Arc<dyn AuthSession>,
  pub assistant: Arc<dyn Assistant>,
  pub cache: SwrCache,
}

/// Lock controller state, recovering it if a handler panicked.
pub(crate) fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read `key`, treating an undecodable value as empty.
pub(crate) fn read_cached<T: DeserializeOwned>(cache: &SwrCache, key: &CacheKey) -> Cached<T> {
  let key = key.to_string();
  cache.read(&key).unwrap_or_else(|e| {
    warn!(key = %key, error = %e, "Discarding unreadable cache value");
    Cached::empty()
  })
}

/// Invalidate `key` after a write, whether or not the write succeeded.
///
/// The write's error is returned; a failed refetch only stays recorded on
/// the cache entry.
pub(crate) async fn invalidate_after(
  cache: &SwrCache,
  key: &CacheKey,
  written: color_eyre::Result<()>,
) -> color_eyre::Result<()> {
  if let Err(e) = &written {
    warn!(key = %key, error = %e, "Write failed, refreshing anyway");
  }
  if let Err(e) = cache.invalidate(&key.to_string()).await {
    warn!(key = %key, error = %e, "Refetch after write failed");
  }
  written
}
