use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

fn yes() -> bool {
  true
}

/// Identity record of a user (also the expanded `artist` of catalog rows)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  pub id: String,
  #[serde(default)]
  pub display_name: Option<String>,
  #[serde(default)]
  pub avatar_url: Option<String>,
  #[serde(default)]
  pub parental_controls_enabled: bool,
  #[serde(default)]
  pub parental_pin: Option<String>,
  #[serde(default = "yes")]
  pub music_videos_enabled: bool,
  #[serde(default = "yes")]
  pub explicit_content_enabled: bool,
  #[serde(default)]
  pub is_artist: bool,
  #[serde(default)]
  pub artist_name: Option<String>,
  #[serde(default)]
  pub artist_bio: Option<String>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
  /// Name shown for this profile as an artist or user.
  pub fn name(&self) -> &str {
    self
      .artist_name
      .as_deref()
      .or(self.display_name.as_deref())
      .unwrap_or("Unknown")
  }

  /// Explicit badges are shown whenever parental control is on.
  pub fn shows_explicit_warning(&self) -> bool {
    self.parental_controls_enabled
  }

  /// Whether this viewer may not play `song`.
  pub fn blocks(&self, song: &Song) -> bool {
    song.is_explicit && self.parental_controls_enabled && !self.explicit_content_enabled
  }
}

/// User-owned named collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
  pub id: String,
  pub user_id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub cover_url: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Catalog album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub artist_id: Option<String>,
  #[serde(default)]
  pub cover_url: Option<String>,
  #[serde(default)]
  pub release_date: Option<String>,
  #[serde(default)]
  pub artist: Option<Profile>,
}

/// Catalog song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub artist_id: Option<String>,
  #[serde(default)]
  pub album_id: Option<String>,
  /// Length in seconds
  #[serde(default)]
  pub duration: Option<u32>,
  #[serde(default)]
  pub audio_url: Option<String>,
  #[serde(default)]
  pub cover_url: Option<String>,
  #[serde(default)]
  pub is_explicit: bool,
  #[serde(default)]
  pub artist: Option<Profile>,
  #[serde(default)]
  pub album: Option<Album>,
}

impl Song {
  pub fn artist_name(&self) -> Option<&str> {
    self.artist.as_ref().and_then(|a| a.display_name.as_deref())
  }
}

/// What a library item points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryItemKind {
  Song,
  Album,
}

/// Join record between a user and a song or an album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
  pub id: String,
  pub user_id: String,
  #[serde(default)]
  pub song_id: Option<String>,
  #[serde(default)]
  pub album_id: Option<String>,
  pub added_at: DateTime<Utc>,
  /// Expanded relation; null when the song was deleted out-of-band
  #[serde(default)]
  pub song: Option<Song>,
  #[serde(default)]
  pub album: Option<Album>,
}

impl LibraryItem {
  /// The referenced kind, or `None` when the row references both or neither.
  pub fn kind(&self) -> Option<LibraryItemKind> {
    match (&self.song_id, &self.album_id) {
      (Some(_), None) => Some(LibraryItemKind::Song),
      (None, Some(_)) => Some(LibraryItemKind::Album),
      _ => None,
    }
  }
}

/// One recorded search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistory {
  pub id: String,
  pub user_id: String,
  pub query: String,
  pub searched_at: DateTime<Utc>,
}

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub user_id: String,
  pub email: Option<String>,
}

/// Decode JSON rows into typed records.
pub fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Result<Vec<T>> {
  rows
    .into_iter()
    .map(|row| {
      serde_json::from_value(row).map_err(|e| eyre!("Failed to parse {} row: {}", table, e))
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_profile_defaults() {
    let profile: Profile = serde_json::from_value(json!({ "id": "u1" })).unwrap();
    assert!(!profile.parental_controls_enabled);
    assert!(profile.music_videos_enabled);
    assert!(profile.explicit_content_enabled);
    assert_eq!(profile.name(), "Unknown");
  }

  #[test]
  fn test_content_policy() {
    let song: Song =
      serde_json::from_value(json!({ "id": "s1", "title": "Loud", "is_explicit": true })).unwrap();
    let mut profile = Profile {
      id: "u1".into(),
      parental_controls_enabled: true,
      explicit_content_enabled: false,
      ..Profile::default()
    };
    assert!(profile.shows_explicit_warning());
    assert!(profile.blocks(&song));

    profile.explicit_content_enabled = true;
    assert!(!profile.blocks(&song));

    profile.parental_controls_enabled = false;
    profile.explicit_content_enabled = false;
    assert!(!profile.blocks(&song));
  }

  #[test]
  fn test_library_item_kind() {
    let item: LibraryItem = serde_json::from_value(json!({
      "id": "li1",
      "user_id": "u1",
      "song_id": "s1",
      "album_id": null,
      "added_at": "2024-03-01T10:00:00Z",
      "song": null
    }))
    .unwrap();
    assert_eq!(item.kind(), Some(LibraryItemKind::Song));
    assert!(item.song.is_none());
  }

  #[test]
  fn test_decode_rows_reports_table() {
    let err = decode_rows::<Playlist>("playlists", vec![json!({ "id": 1 })]).unwrap_err();
    assert!(err.to_string().contains("playlists"));
  }
}
