//! Deduplication of library join rows into catalog lists.

use std::collections::HashSet;

use crate::remote::types::{Album, LibraryItem, Song};

/// Catalog record with a stable id.
pub trait CatalogEntry {
  fn catalog_id(&self) -> &str;
}

impl CatalogEntry for Song {
  fn catalog_id(&self) -> &str {
    &self.id
  }
}

impl CatalogEntry for Album {
  fn catalog_id(&self) -> &str {
    &self.id
  }
}

/// Collect the targets of `rows` keeping only the first row per catalog id.
///
/// Rows arrive newest first, so the newest join of each target survives and
/// the output keeps the order of first occurrence. Rows whose target is
/// missing are skipped and do not claim their id.
pub fn dedup_by_catalog_id<R, T, F>(rows: &[R], target: F) -> Vec<T>
where
  T: CatalogEntry + Clone,
  F: Fn(&R) -> Option<&T>,
{
  let mut seen: HashSet<&str> = HashSet::new();
  let mut out = Vec::new();

  for item in rows.iter().filter_map(&target) {
    if seen.insert(item.catalog_id()) {
      out.push(item.clone());
    }
  }

  out
}

/// Distinct songs of the user's library, newest addition first.
pub fn library_songs(items: &[LibraryItem]) -> Vec<Song> {
  dedup_by_catalog_id(items, |item| item.song.as_ref())
}

/// Distinct albums of the user's library, newest addition first.
pub fn library_albums(items: &[LibraryItem]) -> Vec<Album> {
  dedup_by_catalog_id(items, |item| item.album.as_ref())
}
