use std::sync::{Arc, Mutex};

use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{invalidate_after, lock, queries, read_cached, Context};
use crate::ai::AiRequest;
use crate::cache::{CacheKey, CacheSource};
use crate::remote::types::{decode_rows, Album, Playlist, SearchHistory, Song};
use crate::remote::{Filter, Select};

/// Shown when the AI endpoint cannot be reached
pub const AI_FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

/// Catalog matches of one search, published together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
  pub songs: Vec<Song>,
  pub albums: Vec<Album>,
}

/// Rows already known when the screen opens
#[derive(Debug, Clone, Default)]
pub struct SearchSnapshot {
  pub history: Option<Vec<SearchHistory>>,
  pub playlists: Option<Vec<Playlist>>,
}

#[derive(Debug, Default)]
struct State {
  query: String,
  results: Option<SearchResults>,
  searching: bool,
  /// Bumped by every search and clear; stale results are dropped
  search_seq: u64,
  ai_response: Option<String>,
  asking_ai: bool,
}

/// Catalog search with history and the AI helper.
#[derive(Clone)]
pub struct SearchScreen {
  ctx: Context,
  state: Arc<Mutex<State>>,
}

impl SearchScreen {
  pub fn new(ctx: Context, snapshot: SearchSnapshot) -> Result<Self> {
    let user = ctx.user_id.clone();
    queries::mount_rows(
      &ctx,
      &CacheKey::SearchHistory(user.clone()),
      queries::search_history(&user),
      snapshot.history,
    )?;
    queries::mount_rows(
      &ctx,
      &CacheKey::Playlists(user.clone()),
      queries::playlists(&user),
      snapshot.playlists,
    )?;

    Ok(Self {
      ctx,
      state: Arc::new(Mutex::new(State::default())),
    })
  }

  fn history_key(&self) -> CacheKey {
    CacheKey::SearchHistory(self.ctx.user_id.clone())
  }

  /// Most recent searches, newest first.
  pub fn history(&self) -> Vec<SearchHistory> {
    read_cached(&self.ctx.cache, &self.history_key()).into_data()
  }

  pub fn playlists(&self) -> Vec<Playlist> {
    read_cached(&self.ctx.cache, &CacheKey::Playlists(self.ctx.user_id.clone())).into_data()
  }

  /// Results of the last search, `None` when there is no active search.
  pub fn results(&self) -> Option<SearchResults> {
    lock(&self.state).results.clone()
  }

  pub fn query(&self) -> String {
    lock(&self.state).query.clone()
  }

  pub fn is_searching(&self) -> bool {
    lock(&self.state).searching
  }

  pub fn is_asking_ai(&self) -> bool {
    lock(&self.state).asking_ai
  }

  pub fn ai_response(&self) -> Option<String> {
    lock(&self.state).ai_response.clone()
  }

  /// Search songs and albums for `text` and record it in the history.
  ///
  /// Blank text only clears the current results. A failed history insert or
  /// catalog query is logged and its result set treated as empty.
  pub async fn search(&self, text: &str) -> Result<()> {
    let text = text.trim();
    let seq = {
      let mut state = lock(&self.state);
      state.query = text.to_string();
      state.search_seq += 1;
      if text.is_empty() {
        state.results = None;
        state.searching = false;
        return Ok(());
      }
      state.searching = true;
      state.search_seq
    };

    info!(query = %text, "Searching catalog");
    if let Err(e) = self
      .ctx
      .store
      .insert(
        "search_history",
        json!({ "user_id": self.ctx.user_id, "query": text }),
      )
      .await
    {
      warn!(error = %e, "Failed to record search");
    }

    let (songs, albums) = tokio::join!(
      self.select_or_empty::<Song>(queries::song_search(text)),
      self.select_or_empty::<Album>(queries::album_search(text))
    );
    debug!(songs = songs.len(), albums = albums.len(), "Search finished");

    {
      let mut state = lock(&self.state);
      if state.search_seq == seq {
        state.results = Some(SearchResults { songs, albums });
        state.searching = false;
      } else {
        debug!(query = %text, "Dropping results of superseded search");
      }
    }

    invalidate_after(&self.ctx.cache, &self.history_key(), Ok(())).await
  }

  /// Run a history entry again.
  pub async fn rerun(&self, entry: &SearchHistory) -> Result<()> {
    self.search(&entry.query).await
  }

  async fn select_or_empty<T: DeserializeOwned>(&self, select: Select) -> Vec<T> {
    let rows = match self.ctx.store.select(&select).await {
      Ok(rows) => rows,
      Err(e) => {
        warn!(table = %select.table, error = %e, "Search query failed");
        return Vec::new();
      }
    };
    decode_rows(&select.table, rows).unwrap_or_else(|e| {
      warn!(table = %select.table, error = %e, "Discarding unreadable search rows");
      Vec::new()
    })
  }

  /// Erase the user's history. The local history is empty before the
  /// remote delete resolves.
  pub async fn clear_history(&self) -> Result<()> {
    let key = self.history_key();
    self
      .ctx
      .cache
      .set(&key.to_string(), &Vec::<SearchHistory>::new())?;

    info!("Clearing search history");
    let written = self
      .ctx
      .store
      .delete("search_history", &[Filter::eq("user_id", &self.ctx.user_id)])
      .await;
    invalidate_after(&self.ctx.cache, &key, written).await
  }

  /// Reset the query, the results and the AI panel.
  pub fn clear(&self) {
    let mut state = lock(&self.state);
    state.query.clear();
    state.results = None;
    state.searching = false;
    state.search_seq += 1;
    state.ai_response = None;
  }

  /// Ask the AI helper, with the top song result as context.
  ///
  /// Returns the message now shown, or `None` for a blank question.
  pub async fn ask_ai(&self, question: &str) -> Option<String> {
    if question.trim().is_empty() {
      return None;
    }

    let request = {
      let mut state = lock(&self.state);
      state.asking_ai = true;
      state.ai_response = None;
      let top = state.results.as_ref().and_then(|r| r.songs.first());
      AiRequest {
        question: question.to_string(),
        song_title: top.map(|s| s.title.clone()),
        artist_name: top.and_then(|s| s.artist_name()).map(str::to_string),
      }
    };

    let message = match self.ctx.assistant.ask(&request).await {
      Ok(reply) => reply.into_message(),
      Err(e) => {
        warn!(error = %e, "AI request failed");
        AI_FALLBACK_MESSAGE.to_string()
      }
    };

    let mut state = lock(&self.state);
    state.asking_ai = false;
    state.ai_response = Some(message.clone());
    Some(message)
  }

  /// Whether the history shown is the local write of `clear_history`.
  pub fn history_is_local(&self) -> bool {
    self
      .ctx
      .cache
      .peek::<Vec<SearchHistory>>(&self.history_key().to_string())
      .map(|c| c.source == CacheSource::Local)
      .unwrap_or(false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ai::AiReply;
  use crate::testing::{album_json, history_json, song_json, Call, FakeStore, Harness};
  use std::time::Duration;

  fn store() -> Arc<FakeStore> {
    FakeStore::new()
      .with_rows(
        "songs",
        vec![
          song_json("s1", "Blue Train", "Coltrane", false),
          song_json("s2", "Blue Moon", "Holiday", false),
        ],
      )
      .with_rows("albums", vec![album_json("a1", "Kind of Blue")])
      .with_rows(
        "search_history",
        vec![history_json("h1", "jazz", "2024-03-01T10:00:00Z")],
      )
  }

  fn screen(h: &Harness) -> SearchScreen {
    SearchScreen::new(h.ctx.clone(), SearchSnapshot::default()).unwrap()
  }

  #[tokio::test]
  async fn test_blank_search_issues_nothing() {
    let h = Harness::new(store());
    let screen = screen(&h);
    screen.search("blue").await.unwrap();
    assert!(screen.results().is_some());
    let calls_before = h.store.calls().len();

    screen.search("").await.unwrap();
    screen.search("   ").await.unwrap();

    assert!(screen.results().is_none());
    assert_eq!(h.store.calls().len(), calls_before);
  }

  #[tokio::test]
  async fn test_search_records_history_then_queries() {
    let h = Harness::new(store());
    let screen = screen(&h);
    screen.search("  blue ").await.unwrap();

    let calls = h.store.calls();
    assert_eq!(
      calls[0],
      Call::Insert {
        table: "search_history".into(),
        row: json!({ "user_id": "user-1", "query": "blue" }),
      }
    );
    assert_eq!(h.store.selects_on("songs"), vec![queries::song_search("blue")]);
    assert_eq!(h.store.selects_on("albums"), vec![queries::album_search("blue")]);

    let results = screen.results().unwrap();
    assert_eq!(results.songs.len(), 2);
    assert_eq!(results.albums.len(), 1);
    assert!(!screen.is_searching());

    // History was refetched after the search
    let history: Vec<_> = screen.history().into_iter().map(|h| h.query).collect();
    assert_eq!(history, vec!["blue", "jazz"]);
  }

  #[tokio::test]
  async fn test_failed_query_yields_empty_set() {
    let h = Harness::new(store());
    h.store.fail("select", "albums");
    h.store.fail("insert", "search_history");
    let screen = screen(&h);

    screen.search("blue").await.unwrap();
    let results = screen.results().unwrap();
    assert_eq!(results.songs.len(), 2);
    assert!(results.albums.is_empty());
  }

  #[tokio::test]
  async fn test_clear_history_is_immediate() {
    let h = Harness::new(store());
    h.store.set_select_delay(Duration::from_millis(50));
    let screen = screen(&h);
    h.ctx
      .cache
      .revalidate(&CacheKey::SearchHistory("user-1".into()).to_string())
      .await
      .unwrap();
    assert_eq!(screen.history().len(), 1);

    let pending = {
      let screen = screen.clone();
      tokio::spawn(async move { screen.clear_history().await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Remote refetch has not resolved yet
    assert!(screen.history().is_empty());
    assert!(screen.history_is_local());

    pending.await.unwrap().unwrap();
    assert!(screen.history().is_empty());
    assert!(h.store.calls().contains(&Call::Delete {
      table: "search_history".into(),
      filters: vec![Filter::eq("user_id", "user-1")],
    }));
  }

  #[tokio::test]
  async fn test_cleared_history_stays_empty_during_slow_delete() {
    let h = Harness::new(store());
    h.store.set_delete_delay(Duration::from_millis(100));
    // Seeded but never fetched, so the entry starts out stale
    let snapshot = SearchSnapshot {
      history: Some(vec![serde_json::from_value(history_json(
        "h1",
        "jazz",
        "2024-03-01T10:00:00Z",
      ))
      .unwrap()]),
      playlists: None,
    };
    let screen = SearchScreen::new(h.ctx.clone(), snapshot).unwrap();

    let pending = {
      let screen = screen.clone();
      tokio::spawn(async move { screen.clear_history().await })
    };

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(screen.history().is_empty());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(screen.history().is_empty());
    assert!(h.store.selects_on("search_history").is_empty());

    pending.await.unwrap().unwrap();
    assert!(screen.history().is_empty());
    assert!(!screen.history_is_local());
  }

  #[tokio::test]
  async fn test_superseded_search_results_dropped() {
    let h = Harness::new(store());
    h.store.set_select_delay(Duration::from_millis(60));
    let screen = screen(&h);

    let slow = {
      let screen = screen.clone();
      tokio::spawn(async move { screen.search("blue").await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(screen.is_searching());

    h.store.set_select_delay(Duration::ZERO);
    screen.search("moon").await.unwrap();
    assert_eq!(screen.results().unwrap().songs.len(), 2);

    // Rows the slow search would return once it resolves
    h.store.clone().with_rows(
      "songs",
      vec![song_json("s3", "Blue in Green", "Davis", false)],
    );
    slow.await.unwrap().unwrap();

    assert_eq!(screen.query(), "moon");
    assert_eq!(screen.results().unwrap().songs.len(), 2);
    assert!(!screen.is_searching());
  }

  #[tokio::test]
  async fn test_results_after_clear_dropped() {
    let h = Harness::new(store());
    h.store.set_select_delay(Duration::from_millis(40));
    let screen = screen(&h);

    let pending = {
      let screen = screen.clone();
      tokio::spawn(async move { screen.search("blue").await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;

    screen.clear();
    pending.await.unwrap().unwrap();

    assert!(screen.results().is_none());
    assert!(!screen.is_searching());
    assert_eq!(screen.query(), "");
  }

  #[tokio::test]
  async fn test_ask_ai_sends_top_result_context() {
    let h = Harness::new(store());
    *h.assistant.reply.lock().unwrap() = Some(AiReply {
      answer: Some("Hard bop".into()),
      error: None,
    });
    let screen = screen(&h);
    screen.search("blue").await.unwrap();

    let message = screen.ask_ai("Which genre?").await;
    assert_eq!(message.as_deref(), Some("Hard bop"));
    assert_eq!(screen.ai_response().as_deref(), Some("Hard bop"));

    let requests = h.assistant.requests.lock().unwrap().clone();
    assert_eq!(
      requests,
      vec![AiRequest {
        question: "Which genre?".into(),
        song_title: Some("Blue Train".into()),
        artist_name: Some("Coltrane".into()),
      }]
    );
  }

  #[tokio::test]
  async fn test_ask_ai_error_and_transport_failure() {
    let h = Harness::new(store());
    let screen = screen(&h);

    // No canned reply means the endpoint is unreachable
    assert_eq!(
      screen.ask_ai("Anything?").await.as_deref(),
      Some(AI_FALLBACK_MESSAGE)
    );

    *h.assistant.reply.lock().unwrap() = Some(AiReply {
      answer: None,
      error: Some("Rate limited".into()),
    });
    assert_eq!(screen.ask_ai("Again?").await.as_deref(), Some("Rate limited"));
    assert!(!screen.is_asking_ai());
  }

  #[tokio::test]
  async fn test_blank_question_ignored() {
    let h = Harness::new(store());
    let screen = screen(&h);
    assert_eq!(screen.ask_ai("  ").await, None);
    assert!(h.assistant.requests.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_clear_resets_results_and_ai() {
    let h = Harness::new(store());
    let screen = screen(&h);
    screen.search("blue").await.unwrap();
    screen.ask_ai("Why?").await;

    screen.clear();
    assert!(screen.results().is_none());
    assert!(screen.ai_response().is_none());
    assert_eq!(screen.query(), "");
  }

  #[tokio::test]
  async fn test_rerun_history_entry() {
    let h = Harness::new(store());
    let screen = screen(&h);
    let entry: SearchHistory =
      serde_json::from_value(history_json("h1", "jazz", "2024-03-01T10:00:00Z")).unwrap();

    screen.rerun(&entry).await.unwrap();
    assert_eq!(screen.query(), "jazz");
    assert_eq!(h.store.selects_on("songs"), vec![queries::song_search("jazz")]);
  }
}
