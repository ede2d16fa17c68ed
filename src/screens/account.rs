use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{invalidate_after, lock, queries, read_cached, Context};
use crate::cache::CacheKey;
use crate::remote::types::Profile;
use crate::remote::Filter;

pub const AVATAR_BUCKET: &str = "avatars";
pub const PIN_LENGTH: usize = 4;

/// Keep only digits, at most [`PIN_LENGTH`] of them.
pub fn sanitize_pin(input: &str) -> String {
  input
    .chars()
    .filter(char::is_ascii_digit)
    .take(PIN_LENGTH)
    .collect()
}

/// Extension used in the avatar object name: the text after the last `.`,
/// or the whole file name when it has none.
pub fn avatar_extension(file_name: &str) -> &str {
  file_name.rsplit('.').next().unwrap_or(file_name)
}

fn content_type(ext: &str) -> &'static str {
  match ext.to_ascii_lowercase().as_str() {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    _ => "application/octet-stream",
  }
}

/// Editable account fields
#[derive(Debug, Clone, PartialEq)]
pub struct AccountForm {
  pub display_name: String,
  /// Image chosen for upload on the next profile save
  pub avatar_file: Option<PathBuf>,
  pub parental_enabled: bool,
  pub parental_pin: String,
  pub music_videos_enabled: bool,
  pub explicit_enabled: bool,
  pub is_artist: bool,
  pub artist_name: String,
  pub artist_bio: String,
}

impl Default for AccountForm {
  fn default() -> Self {
    Self {
      display_name: String::new(),
      avatar_file: None,
      parental_enabled: false,
      parental_pin: String::new(),
      music_videos_enabled: true,
      explicit_enabled: true,
      is_artist: false,
      artist_name: String::new(),
      artist_bio: String::new(),
    }
  }
}

impl From<&Profile> for AccountForm {
  fn from(profile: &Profile) -> Self {
    Self {
      display_name: profile.display_name.clone().unwrap_or_default(),
      avatar_file: None,
      parental_enabled: profile.parental_controls_enabled,
      parental_pin: profile.parental_pin.clone().unwrap_or_default(),
      music_videos_enabled: profile.music_videos_enabled,
      explicit_enabled: profile.explicit_content_enabled,
      is_artist: profile.is_artist,
      artist_name: profile.artist_name.clone().unwrap_or_default(),
      artist_bio: profile.artist_bio.clone().unwrap_or_default(),
    }
  }
}

/// Independently saved parts of the account screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
  Profile,
  Parental,
  Artist,
}

#[derive(Debug, Default)]
struct State {
  form: AccountForm,
  /// Whether `form` has been filled from a profile row
  loaded: bool,
  saving: Option<Section>,
}

fn none_if_empty(text: &str) -> Value {
  if text.is_empty() {
    Value::Null
  } else {
    json!(text)
  }
}

/// Profile, parental control and artist settings of the signed-in user.
#[derive(Clone)]
pub struct AccountScreen {
  ctx: Context,
  state: Arc<Mutex<State>>,
}

impl AccountScreen {
  pub fn new(ctx: Context, snapshot: Option<Profile>) -> Result<Self> {
    let state = State {
      form: snapshot.as_ref().map(AccountForm::from).unwrap_or_default(),
      loaded: snapshot.is_some(),
      saving: None,
    };
    queries::mount_profile(&ctx, snapshot)?;
    Ok(Self {
      ctx,
      state: Arc::new(Mutex::new(state)),
    })
  }

  fn key(&self) -> CacheKey {
    CacheKey::Profile(self.ctx.user_id.clone())
  }

  /// The cached profile row. The form is filled from the first one seen.
  pub fn profile(&self) -> Option<Profile> {
    let profile = read_cached::<Option<Profile>>(&self.ctx.cache, &self.key())
      .data
      .flatten();
    if let Some(profile) = &profile {
      let mut state = lock(&self.state);
      if !state.loaded {
        state.form = AccountForm::from(profile);
        state.loaded = true;
      }
    }
    profile
  }

  pub fn form(&self) -> AccountForm {
    lock(&self.state).form.clone()
  }

  /// Edit the form in place.
  pub fn edit(&self, f: impl FnOnce(&mut AccountForm)) {
    f(&mut lock(&self.state).form);
  }

  pub fn set_parental_pin(&self, input: &str) {
    lock(&self.state).form.parental_pin = sanitize_pin(input);
  }

  pub fn saving(&self) -> Option<Section> {
    lock(&self.state).saving
  }

  fn begin(&self, section: Section) {
    lock(&self.state).saving = Some(section);
  }

  fn finish(&self) {
    lock(&self.state).saving = None;
  }

  async fn write(&self, patch: Value) -> Result<()> {
    let written = self
      .ctx
      .store
      .update("profiles", patch, &[Filter::eq("id", &self.ctx.user_id)])
      .await;
    invalidate_after(&self.ctx.cache, &self.key(), written).await
  }

  /// Save display name and avatar.
  ///
  /// A chosen avatar file is uploaded first; if that fails the previous
  /// avatar URL is kept.
  pub async fn save_profile(&self) -> Result<()> {
    self.begin(Section::Profile);
    let (display_name, avatar_file) = {
      let state = lock(&self.state);
      (state.form.display_name.clone(), state.form.avatar_file.clone())
    };

    let mut avatar_url = self
      .ctx
      .cache
      .peek::<Option<Profile>>(&self.key().to_string())
      .ok()
      .and_then(|c| c.data.flatten())
      .and_then(|p| p.avatar_url);

    if let Some(path) = avatar_file {
      match self.upload_avatar(&path).await {
        Ok(url) => avatar_url = Some(url),
        Err(e) => warn!(error = %e, "Avatar upload failed, keeping previous avatar"),
      }
    }

    info!("Saving profile");
    let result = self
      .write(json!({
        "display_name": display_name,
        "avatar_url": avatar_url,
        "updated_at": Utc::now().to_rfc3339(),
      }))
      .await;

    lock(&self.state).form.avatar_file = None;
    self.finish();
    result
  }

  async fn upload_avatar(&self, path: &Path) -> Result<String> {
    let file_name = path
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| eyre!("Invalid avatar path {}", path.display()))?;
    let ext = avatar_extension(file_name);
    let bytes = tokio::fs::read(path)
      .await
      .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;

    let object = format!(
      "{}/{}-avatar.{}",
      self.ctx.user_id,
      Utc::now().timestamp_millis(),
      ext
    );
    self
      .ctx
      .blobs
      .upload(AVATAR_BUCKET, &object, bytes, content_type(ext))
      .await?;
    Ok(self.ctx.blobs.public_url(AVATAR_BUCKET, &object))
  }

  /// Save the parental control flags. An empty PIN is stored as null.
  pub async fn save_parental(&self) -> Result<()> {
    self.begin(Section::Parental);
    let form = self.form();
    let pin = sanitize_pin(&form.parental_pin);

    info!(enabled = form.parental_enabled, "Saving parental controls");
    let result = self
      .write(json!({
        "parental_controls_enabled": form.parental_enabled,
        "parental_pin": none_if_empty(&pin),
        "music_videos_enabled": form.music_videos_enabled,
        "explicit_content_enabled": form.explicit_enabled,
        "updated_at": Utc::now().to_rfc3339(),
      }))
      .await;
    self.finish();
    result
  }

  /// Save the artist flag, name and bio. Empty text is stored as null.
  pub async fn save_artist(&self) -> Result<()> {
    self.begin(Section::Artist);
    let form = self.form();

    info!(is_artist = form.is_artist, "Saving artist status");
    let result = self
      .write(json!({
        "is_artist": form.is_artist,
        "artist_name": none_if_empty(&form.artist_name),
        "artist_bio": none_if_empty(&form.artist_bio),
        "updated_at": Utc::now().to_rfc3339(),
      }))
      .await;
    self.finish();
    result
  }

  pub async fn sign_out(&self) -> Result<()> {
    info!("Signing out");
    self.ctx.auth.sign_out().await
  }
}
