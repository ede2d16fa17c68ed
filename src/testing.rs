//! In-memory doubles of the remote traits used by screen tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};

use crate::ai::{AiReply, AiRequest, Assistant};
use crate::cache::SwrCache;
use crate::remote::types::Session;
use crate::remote::{AuthSession, BlobStore, DataStore, Filter, Select};
use crate::screens::Context;

/// One call made against [`FakeStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
  Select(Select),
  Insert {
    table: String,
    row: Value,
  },
  Update {
    table: String,
    patch: Value,
    filters: Vec<Filter>,
  },
  Delete {
    table: String,
    filters: Vec<Filter>,
  },
}

/// Tables of JSON rows. Selects honor `eq` and `not.is.null` filters and
/// the limit; pattern filters match everything.
#[derive(Default)]
pub struct FakeStore {
  tables: Mutex<HashMap<String, Vec<Value>>>,
  failing: Mutex<HashSet<(String, String)>>,
  calls: Mutex<Vec<Call>>,
  select_delay: Mutex<Option<Duration>>,
  delete_delay: Mutex<Option<Duration>>,
}

fn column_text(row: &Value, column: &str) -> Option<String> {
  match row.get(column) {
    None | Some(Value::Null) => None,
    Some(Value::String(s)) => Some(s.clone()),
    Some(other) => Some(other.to_string()),
  }
}

fn matches(row: &Value, filter: &Filter) -> bool {
  match filter {
    Filter::Eq { column, value } => column_text(row, column).as_deref() == Some(value.as_str()),
    Filter::NotNull { column } => column_text(row, column).is_some(),
    Filter::ILike { .. } | Filter::Or(_) => true,
  }
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
  filters.iter().all(|f| matches(row, f))
}

impl FakeStore {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn with_rows(self: Arc<Self>, table: &str, rows: Vec<Value>) -> Arc<Self> {
    self.lock_tables().insert(table.to_string(), rows);
    self
  }

  /// Make `op` ("select", "insert", "update", "delete") on `table` fail.
  pub fn fail(&self, op: &str, table: &str) {
    self
      .failing
      .lock()
      .unwrap()
      .insert((op.to_string(), table.to_string()));
  }

  pub fn set_select_delay(&self, delay: Duration) {
    *self.select_delay.lock().unwrap() = Some(delay);
  }

  pub fn set_delete_delay(&self, delay: Duration) {
    *self.delete_delay.lock().unwrap() = Some(delay);
  }

  pub fn rows(&self, table: &str) -> Vec<Value> {
    self.lock_tables().get(table).cloned().unwrap_or_default()
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn selects_on(&self, table: &str) -> Vec<Select> {
    self
      .calls()
      .into_iter()
      .filter_map(|call| match call {
        Call::Select(select) if select.table == table => Some(select),
        _ => None,
      })
      .collect()
  }

  fn lock_tables(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Value>>> {
    self.tables.lock().unwrap()
  }

  fn record(&self, op: &str, table: &str, call: Call) -> Result<()> {
    self.calls.lock().unwrap().push(call);
    if self
      .failing
      .lock()
      .unwrap()
      .contains(&(op.to_string(), table.to_string()))
    {
      return Err(eyre!("{} on {} failed (500): injected", op, table));
    }
    Ok(())
  }
}

#[async_trait]
impl DataStore for FakeStore {
  async fn select(&self, query: &Select) -> Result<Vec<Value>> {
    self.record("select", &query.table, Call::Select(query.clone()))?;
    let delay = *self.select_delay.lock().unwrap();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }

    let rows: Vec<Value> = self
      .rows(&query.table)
      .into_iter()
      .filter(|row| matches_all(row, &query.filters))
      .take(query.limit.unwrap_or(usize::MAX))
      .collect();
    Ok(rows)
  }

  async fn insert(&self, table: &str, row: Value) -> Result<()> {
    self.record(
      "insert",
      table,
      Call::Insert {
        table: table.to_string(),
        row: row.clone(),
      },
    )?;
    let mut tables = self.lock_tables();
    let rows = tables.entry(table.to_string()).or_default();
    let next_id = format!("{}-{}", table, rows.len() + 1);
    // Column defaults the store fills in
    let mut row = row;
    if let Value::Object(map) = &mut row {
      map.entry("id").or_insert_with(|| json!(next_id));
      map
        .entry("created_at")
        .or_insert_with(|| json!("2030-01-01T00:00:00Z"));
      map
        .entry("searched_at")
        .or_insert_with(|| json!("2030-01-01T00:00:00Z"));
    }
    // Newest first, like the ordered queries
    rows.insert(0, row);
    Ok(())
  }

  async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<()> {
    self.record(
      "update",
      table,
      Call::Update {
        table: table.to_string(),
        patch: patch.clone(),
        filters: filters.to_vec(),
      },
    )?;
    let mut tables = self.lock_tables();
    if let (Some(rows), Value::Object(patch)) = (tables.get_mut(table), patch) {
      for row in rows.iter_mut().filter(|row| matches_all(row, filters)) {
        if let Value::Object(row) = row {
          for (k, v) in &patch {
            row.insert(k.clone(), v.clone());
          }
        }
      }
    }
    Ok(())
  }

  async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
    self.record(
      "delete",
      table,
      Call::Delete {
        table: table.to_string(),
        filters: filters.to_vec(),
      },
    )?;
    let delay = *self.delete_delay.lock().unwrap();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    if let Some(rows) = self.lock_tables().get_mut(table) {
      rows.retain(|row| !matches_all(row, filters));
    }
    Ok(())
  }
}

/// Records uploads; fails every upload when `failing` is set.
#[derive(Default)]
pub struct FakeBlobs {
  pub uploads: Mutex<Vec<(String, String, usize, String)>>,
  pub failing: Mutex<bool>,
}

#[async_trait]
impl BlobStore for FakeBlobs {
  async fn upload(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<()> {
    if *self.failing.lock().unwrap() {
      return Err(eyre!("upload failed (413): too large"));
    }
    self.uploads.lock().unwrap().push((
      bucket.to_string(),
      path.to_string(),
      bytes.len(),
      content_type.to_string(),
    ));
    Ok(())
  }

  fn public_url(&self, bucket: &str, path: &str) -> String {
    format!("https://blobs.test/{}/{}", bucket, path)
  }
}

/// Auth session of `user-1`; password updates are recorded.
pub struct FakeAuth {
  pub session: Mutex<Option<Session>>,
  pub passwords: Mutex<Vec<String>>,
  pub password_error: Mutex<Option<String>>,
}

impl Default for FakeAuth {
  fn default() -> Self {
    Self {
      session: Mutex::new(Some(Session {
        user_id: "user-1".into(),
        email: Some("user@example.com".into()),
      })),
      passwords: Mutex::new(Vec::new()),
      password_error: Mutex::new(None),
    }
  }
}

#[async_trait]
impl AuthSession for FakeAuth {
  async fn get_session(&self) -> Result<Option<Session>> {
    Ok(self.session.lock().unwrap().clone())
  }

  async fn sign_out(&self) -> Result<()> {
    *self.session.lock().unwrap() = None;
    Ok(())
  }

  async fn update_password(&self, password: &str) -> Result<()> {
    if let Some(message) = self.password_error.lock().unwrap().clone() {
      return Err(eyre!(message));
    }
    self.passwords.lock().unwrap().push(password.to_string());
    Ok(())
  }
}

/// Replies with a canned answer, or fails like an unreachable endpoint.
#[derive(Default)]
pub struct FakeAssistant {
  pub reply: Mutex<Option<AiReply>>,
  pub requests: Mutex<Vec<AiRequest>>,
}

#[async_trait]
impl Assistant for FakeAssistant {
  async fn ask(&self, request: &AiRequest) -> Result<AiReply> {
    self.requests.lock().unwrap().push(request.clone());
    self
      .reply
      .lock()
      .unwrap()
      .clone()
      .ok_or_else(|| eyre!("connection refused"))
  }
}

/// A screen context wired to fresh doubles.
pub struct Harness {
  pub store: Arc<FakeStore>,
  pub blobs: Arc<FakeBlobs>,
  pub auth: Arc<FakeAuth>,
  pub assistant: Arc<FakeAssistant>,
  pub ctx: Context,
}

impl Harness {
  pub fn new(store: Arc<FakeStore>) -> Self {
    let blobs = Arc::new(FakeBlobs::default());
    let auth = Arc::new(FakeAuth::default());
    let assistant = Arc::new(FakeAssistant::default());
    let ctx = Context {
      user_id: "user-1".into(),
      store: store.clone(),
      blobs: blobs.clone(),
      auth: auth.clone(),
      assistant: assistant.clone(),
      cache: SwrCache::new(),
    };
    Self {
      store,
      blobs,
      auth,
      assistant,
      ctx,
    }
  }
}

/// A song row as the catalog returns it, with the expanded artist.
pub fn song_json(id: &str, title: &str, artist: &str, explicit: bool) -> Value {
  json!({
    "id": id,
    "title": title,
    "is_explicit": explicit,
    "artist": { "id": format!("artist-{}", artist), "display_name": artist }
  })
}

pub fn album_json(id: &str, title: &str) -> Value {
  json!({ "id": id, "title": title })
}

/// A `library_items` row pointing at a song.
pub fn song_item(row_id: &str, added_at: &str, song: Value) -> Value {
  json!({
    "id": row_id,
    "user_id": "user-1",
    "song_id": song.get("id").cloned().unwrap_or(Value::Null),
    "album_id": null,
    "added_at": added_at,
    "song": song,
  })
}

pub fn album_item(row_id: &str, added_at: &str, album: Value) -> Value {
  json!({
    "id": row_id,
    "user_id": "user-1",
    "song_id": null,
    "album_id": album.get("id").cloned().unwrap_or(Value::Null),
    "added_at": added_at,
    "album": album,
  })
}

pub fn playlist_json(id: &str, name: &str, created_at: &str) -> Value {
  json!({ "id": id, "user_id": "user-1", "name": name, "created_at": created_at })
}

pub fn history_json(id: &str, query: &str, searched_at: &str) -> Value {
  json!({ "id": id, "user_id": "user-1", "query": query, "searched_at": searched_at })
}
