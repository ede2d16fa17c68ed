//! Stale-while-revalidate cache for remote query results.
//!
//! This module provides a store-agnostic read cache that:
//! - Maps a string key to the latest fetched JSON value of one query
//! - Serves the cached (or fallback) value immediately and refetches in the background
//! - Shares one in-flight fetch between concurrent readers of a key
//! - Republishes every new value to the key's subscribers

mod keys;
mod layer;
mod storage;
mod traits;

pub use keys::CacheKey;
pub use layer::SwrCache;
pub use traits::{CacheSource, Cached};
