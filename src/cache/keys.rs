use std::fmt;

/// Keys of the queries screens share through the cache.
///
/// A key names one user's result set; two screens mounting the same key
/// read and invalidate the same entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
  /// The user's playlists, newest first
  Playlists(String),
  /// Library rows that reference a song
  LibrarySongs(String),
  /// Library rows that reference an album
  LibraryAlbums(String),
  /// The most recent searches
  SearchHistory(String),
  /// The user's own profile row
  Profile(String),
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Playlists(user) => write!(f, "playlists-{}", user),
      Self::LibrarySongs(user) => write!(f, "library-songs-{}", user),
      Self::LibraryAlbums(user) => write!(f, "library-albums-{}", user),
      Self::SearchHistory(user) => write!(f, "search-history-{}", user),
      Self::Profile(user) => write!(f, "profile-{}", user),
    }
  }
}
