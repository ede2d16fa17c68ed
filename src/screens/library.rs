use std::sync::{Arc, Mutex};

use color_eyre::{eyre::eyre, Result};
use serde_json::json;
use tracing::{debug, info};

use super::{invalidate_after, lock, queries, read_cached, Context};
use crate::cache::CacheKey;
use crate::merge;
use crate::remote::types::{Album, LibraryItem, Playlist, Profile, Song};

/// How songs and albums are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
  #[default]
  List,
  Grid,
}

/// A library song with the viewer's content policy applied
#[derive(Debug, Clone, PartialEq)]
pub struct SongRow {
  pub song: Song,
  /// Explicit and not allowed by parental control
  pub blocked: bool,
  /// Show the explicit badge
  pub explicit_warning: bool,
}

/// Rows already known when the screen opens
#[derive(Debug, Clone, Default)]
pub struct LibrarySnapshot {
  pub playlists: Option<Vec<Playlist>>,
  pub song_items: Option<Vec<LibraryItem>>,
  pub album_items: Option<Vec<LibraryItem>>,
  pub profile: Option<Profile>,
}

#[derive(Debug, Default)]
struct State {
  mode: ViewMode,
}

/// Playlists, songs and albums of the signed-in user.
#[derive(Clone)]
pub struct LibraryScreen {
  ctx: Context,
  state: Arc<Mutex<State>>,
}

impl LibraryScreen {
  pub fn new(ctx: Context, snapshot: LibrarySnapshot) -> Result<Self> {
    let user = ctx.user_id.clone();
    queries::mount_rows(
      &ctx,
      &CacheKey::Playlists(user.clone()),
      queries::playlists(&user),
      snapshot.playlists,
    )?;
    queries::mount_rows(
      &ctx,
      &CacheKey::LibrarySongs(user.clone()),
      queries::library_songs(&user),
      snapshot.song_items,
    )?;
    queries::mount_rows(
      &ctx,
      &CacheKey::LibraryAlbums(user.clone()),
      queries::library_albums(&user),
      snapshot.album_items,
    )?;
    queries::mount_profile(&ctx, snapshot.profile)?;

    Ok(Self {
      ctx,
      state: Arc::new(Mutex::new(State::default())),
    })
  }

  fn key(&self, make: fn(String) -> CacheKey) -> CacheKey {
    make(self.ctx.user_id.clone())
  }

  pub fn playlists(&self) -> Vec<Playlist> {
    read_cached(&self.ctx.cache, &self.key(CacheKey::Playlists)).into_data()
  }

  pub fn profile(&self) -> Option<Profile> {
    read_cached::<Option<Profile>>(&self.ctx.cache, &self.key(CacheKey::Profile))
      .data
      .flatten()
  }

  /// Distinct library songs, newest addition first.
  pub fn songs(&self) -> Vec<SongRow> {
    let items: Vec<LibraryItem> =
      read_cached(&self.ctx.cache, &self.key(CacheKey::LibrarySongs)).into_data();
    let profile = self.profile();

    merge::library_songs(&items)
      .into_iter()
      .map(|song| SongRow {
        blocked: profile.as_ref().is_some_and(|p| p.blocks(&song)),
        explicit_warning: song.is_explicit
          && profile.as_ref().is_some_and(Profile::shows_explicit_warning),
        song,
      })
      .collect()
  }

  /// Distinct library albums, newest addition first.
  pub fn albums(&self) -> Vec<Album> {
    let items: Vec<LibraryItem> =
      read_cached(&self.ctx.cache, &self.key(CacheKey::LibraryAlbums)).into_data();
    merge::library_albums(&items)
  }

  /// Whether any of the library keys is being fetched.
  pub fn is_loading(&self) -> bool {
    [CacheKey::Playlists, CacheKey::LibrarySongs, CacheKey::LibraryAlbums]
      .into_iter()
      .any(|make| {
        self
          .ctx
          .cache
          .peek::<serde_json::Value>(&self.key(make).to_string())
          .map(|c| c.loading)
          .unwrap_or(false)
      })
  }

  /// Most recent fetch failure of any library key.
  pub fn last_error(&self) -> Option<String> {
    [CacheKey::Playlists, CacheKey::LibrarySongs, CacheKey::LibraryAlbums]
      .into_iter()
      .find_map(|make| {
        self
          .ctx
          .cache
          .peek::<serde_json::Value>(&self.key(make).to_string())
          .ok()
          .and_then(|c| c.error)
      })
  }

  pub fn view_mode(&self) -> ViewMode {
    lock(&self.state).mode
  }

  pub fn toggle_view_mode(&self) -> ViewMode {
    let mut state = lock(&self.state);
    state.mode = match state.mode {
      ViewMode::List => ViewMode::Grid,
      ViewMode::Grid => ViewMode::List,
    };
    state.mode
  }

  /// Create a playlist and refresh the playlists key.
  pub async fn create_playlist(&self, name: &str, description: Option<&str>) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
      return Err(eyre!("Playlist name cannot be empty"));
    }
    let description = description.map(str::trim).filter(|d| !d.is_empty());

    info!(name = %name, "Creating playlist");
    let written = self
      .ctx
      .store
      .insert(
        "playlists",
        json!({
          "user_id": self.ctx.user_id,
          "name": name,
          "description": description,
        }),
      )
      .await;
    invalidate_after(&self.ctx.cache, &self.key(CacheKey::Playlists), written).await
  }

  /// Refetch playlists, songs and albums together.
  pub async fn refresh(&self) -> Result<()> {
    debug!("Refreshing library");
    let playlists = self.key(CacheKey::Playlists).to_string();
    let songs = self.key(CacheKey::LibrarySongs).to_string();
    let albums = self.key(CacheKey::LibraryAlbums).to_string();
    let cache = &self.ctx.cache;

    let (a, b, c) = tokio::join!(
      cache.revalidate(&playlists),
      cache.revalidate(&songs),
      cache.revalidate(&albums)
    );
    a.and(b).and(c)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::Filter;
  use crate::testing::{
    album_item, album_json, playlist_json, song_item, song_json, Call, FakeStore, Harness,
  };
  use serde_json::json;

  fn store() -> std::sync::Arc<FakeStore> {
    FakeStore::new()
      .with_rows(
        "library_items",
        vec![
          song_item("r1", "2024-03-01T10:03:00Z", song_json("A", "Alpha", "Ada", true)),
          song_item("r2", "2024-03-01T10:02:00Z", song_json("B", "Beta", "Bo", false)),
          song_item("r3", "2024-03-01T10:01:00Z", song_json("A", "Alpha", "Ada", true)),
          album_item("r4", "2024-03-01T09:00:00Z", album_json("X", "Xylo")),
          album_item("r5", "2024-03-01T08:00:00Z", album_json("X", "Xylo")),
        ],
      )
      .with_rows(
        "playlists",
        vec![playlist_json("p1", "Road trip", "2024-02-01T00:00:00Z")],
      )
      .with_rows(
        "profiles",
        vec![json!({
          "id": "user-1",
          "parental_controls_enabled": true,
          "explicit_content_enabled": false
        })],
      )
  }

  #[tokio::test]
  async fn test_refresh_dedups_songs_and_albums() {
    let h = Harness::new(store());
    let screen = LibraryScreen::new(h.ctx.clone(), LibrarySnapshot::default()).unwrap();
    assert!(screen.songs().is_empty());

    screen.refresh().await.unwrap();
    let ids: Vec<_> = screen.songs().into_iter().map(|r| r.song.id).collect();
    assert_eq!(ids, vec!["A", "B"]);

    let albums: Vec<_> = screen.albums().into_iter().map(|a| a.id).collect();
    assert_eq!(albums, vec!["X"]);
    assert_eq!(screen.playlists().len(), 1);
  }

  #[tokio::test]
  async fn test_content_policy_applied_to_rows() {
    let h = Harness::new(store());
    let screen = LibraryScreen::new(h.ctx.clone(), LibrarySnapshot::default()).unwrap();
    screen.refresh().await.unwrap();
    h.ctx
      .cache
      .revalidate(&CacheKey::Profile("user-1".into()).to_string())
      .await
      .unwrap();

    let rows = screen.songs();
    assert!(rows[0].blocked);
    assert!(rows[0].explicit_warning);
    assert!(!rows[1].blocked);
    assert!(!rows[1].explicit_warning);
  }

  #[tokio::test]
  async fn test_snapshot_served_before_fetch() {
    let h = Harness::new(store());
    let playlist: Playlist =
      serde_json::from_value(playlist_json("p0", "Seed", "2024-01-01T00:00:00Z")).unwrap();
    let screen = LibraryScreen::new(
      h.ctx.clone(),
      LibrarySnapshot {
        playlists: Some(vec![playlist]),
        ..LibrarySnapshot::default()
      },
    )
    .unwrap();

    assert_eq!(screen.playlists()[0].name, "Seed");
  }

  #[tokio::test]
  async fn test_create_playlist_inserts_and_refreshes() {
    let h = Harness::new(store());
    let screen = LibraryScreen::new(h.ctx.clone(), LibrarySnapshot::default()).unwrap();

    screen
      .create_playlist("  Focus  ", Some(""))
      .await
      .unwrap();

    assert!(h.store.calls().contains(&Call::Insert {
      table: "playlists".into(),
      row: json!({ "user_id": "user-1", "name": "Focus", "description": null }),
    }));
    let names: Vec<_> = screen.playlists().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Focus", "Road trip"]);
  }

  #[tokio::test]
  async fn test_blank_playlist_name_rejected() {
    let h = Harness::new(store());
    let screen = LibraryScreen::new(h.ctx.clone(), LibrarySnapshot::default()).unwrap();

    assert!(screen.create_playlist("   ", None).await.is_err());
    assert!(h.store.calls().is_empty());
  }

  #[tokio::test]
  async fn test_failed_insert_still_refreshes() {
    let h = Harness::new(store());
    h.store.fail("insert", "playlists");
    let screen = LibraryScreen::new(h.ctx.clone(), LibrarySnapshot::default()).unwrap();

    let err = screen.create_playlist("Focus", None).await.unwrap_err();
    assert!(err.to_string().contains("insert on playlists failed"));
    assert_eq!(h.store.selects_on("playlists").len(), 1);
    assert_eq!(
      h.store.selects_on("playlists")[0].filters,
      vec![Filter::eq("user_id", "user-1")]
    );
  }

  #[tokio::test]
  async fn test_failed_fetch_keeps_rows_and_reports() {
    let h = Harness::new(store());
    let screen = LibraryScreen::new(h.ctx.clone(), LibrarySnapshot::default()).unwrap();
    screen.refresh().await.unwrap();

    h.store.fail("select", "playlists");
    assert!(screen.refresh().await.is_err());
    assert_eq!(screen.playlists().len(), 1);
    assert!(screen.last_error().is_some());
  }

  #[test]
  fn test_view_mode_toggle() {
    let h = Harness::new(FakeStore::new());
    let screen = LibraryScreen::new(h.ctx, LibrarySnapshot::default()).unwrap();
    assert_eq!(screen.view_mode(), ViewMode::List);
    assert_eq!(screen.toggle_view_mode(), ViewMode::Grid);
    assert_eq!(screen.toggle_view_mode(), ViewMode::List);
  }
}
