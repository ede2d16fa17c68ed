//! Remote queries behind the shared cache keys.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};

use super::Context;
use crate::cache::CacheKey;
use crate::remote::types::{decode_rows, Profile};
use crate::remote::{Direction, Filter, Select};

pub const SONG_COLUMNS: &str = "*, artist:profiles(*), album:albums(*)";
pub const ALBUM_COLUMNS: &str = "*, artist:profiles(*)";
pub const HISTORY_LIMIT: usize = 10;
pub const SONG_SEARCH_LIMIT: usize = 20;
pub const ALBUM_SEARCH_LIMIT: usize = 10;

pub fn playlists(user_id: &str) -> Select {
  Select::table("playlists")
    .eq("user_id", user_id)
    .order("created_at", Direction::Desc)
}

pub fn library_songs(user_id: &str) -> Select {
  Select::table("library_items")
    .columns("*, song:songs(*, artist:profiles(*))")
    .eq("user_id", user_id)
    .not_null("song_id")
    .order("added_at", Direction::Desc)
}

pub fn library_albums(user_id: &str) -> Select {
  Select::table("library_items")
    .columns("*, album:albums(*, artist:profiles(*))")
    .eq("user_id", user_id)
    .not_null("album_id")
    .order("added_at", Direction::Desc)
}

pub fn search_history(user_id: &str) -> Select {
  Select::table("search_history")
    .eq("user_id", user_id)
    .order("searched_at", Direction::Desc)
    .limit(HISTORY_LIMIT)
}

pub fn profile(user_id: &str) -> Select {
  Select::table("profiles").eq("id", user_id).limit(1)
}

/// Songs whose title or artist name contains `text`.
pub fn song_search(text: &str) -> Select {
  Select::table("songs")
    .columns(SONG_COLUMNS)
    .or(vec![
      Filter::contains("title", text),
      Filter::contains("artist.display_name", text),
    ])
    .limit(SONG_SEARCH_LIMIT)
}

/// Albums whose title contains `text`.
pub fn album_search(text: &str) -> Select {
  Select::table("albums")
    .columns(ALBUM_COLUMNS)
    .filter(Filter::contains("title", text))
    .limit(ALBUM_SEARCH_LIMIT)
}

/// Mount `key` with a fetcher that runs `select` and decodes its rows.
pub fn mount_rows<T>(
  ctx: &Context,
  key: &CacheKey,
  select: Select,
  fallback: Option<Vec<T>>,
) -> Result<()>
where
  T: Serialize + DeserializeOwned + Send + 'static,
{
  let store = ctx.store.clone();
  ctx.cache.mount(&key.to_string(), fallback, move || {
    let store = store.clone();
    let select = select.clone();
    async move {
      let rows = store.select(&select).await?;
      decode_rows::<T>(&select.table, rows)
    }
  })
}

/// Mount the user's profile key. The value is `null` when the row is missing.
pub fn mount_profile(ctx: &Context, fallback: Option<Profile>) -> Result<()> {
  let store = ctx.store.clone();
  let select = profile(&ctx.user_id);
  ctx.cache.mount(
    &CacheKey::Profile(ctx.user_id.clone()).to_string(),
    fallback.map(Some),
    move || {
      let store = store.clone();
      let select = select.clone();
      async move {
        let rows = store.select(&select).await?;
        Ok(decode_rows::<Profile>(&select.table, rows)?.into_iter().next())
      }
    },
  )
}
