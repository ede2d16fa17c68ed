use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub store: StoreConfig,
  pub ai: AiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Custom title for header (defaults to the store host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// Base URL of the hosted store, e.g. `https://xyz.supabase.co`
  pub url: String,
  /// Public anon key; `MAYNSTA_ANON_KEY` is used when absent
  pub anon_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
  /// Full URL of the AI query helper route
  pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds before a cached query is refetched on read
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
}

fn default_stale_secs() -> u64 {
  60
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: default_stale_secs(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./maynsta.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/maynsta/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/maynsta/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("maynsta.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("maynsta").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    Self::parse(&contents).map_err(|e| eyre!("{}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config file: {}", e))
  }

  /// The anon key from the file, or `MAYNSTA_ANON_KEY`.
  pub fn anon_key(&self) -> Result<String> {
    match &self.store.anon_key {
      Some(key) => Ok(key.clone()),
      None => std::env::var("MAYNSTA_ANON_KEY").map_err(|_| {
        eyre!("Store anon key not found. Set store.anon_key or the MAYNSTA_ANON_KEY environment variable.")
      }),
    }
  }

  /// The signed-in user's access token from `MAYNSTA_ACCESS_TOKEN`.
  pub fn access_token() -> Option<String> {
    std::env::var("MAYNSTA_ACCESS_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  pub fn stale_time(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.cache.stale_secs as i64)
  }

  /// Header title: the configured one, or the store host.
  pub fn display_title(&self) -> String {
    self.title.clone().unwrap_or_else(|| {
      url::Url::parse(&self.store.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "maynsta".to_string())
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_minimal() {
    let config = Config::parse(
      "store:\n  url: https://xyz.supabase.co\nai:\n  endpoint: https://app.test/api/ai-search\n",
    )
    .unwrap();
    assert_eq!(config.cache.stale_secs, 60);
    assert!(config.store.anon_key.is_none());
    assert_eq!(config.display_title(), "xyz.supabase.co");
  }

  #[test]
  fn test_parse_full() {
    let config = Config::parse(
      "store:\n  url: https://xyz.supabase.co\n  anon_key: abc\n\
       ai:\n  endpoint: https://app.test/api/ai-search\n\
       cache:\n  stale_secs: 5\n\
       title: Home\n",
    )
    .unwrap();
    assert_eq!(config.anon_key().unwrap(), "abc");
    assert_eq!(config.stale_time(), chrono::Duration::seconds(5));
    assert_eq!(config.display_title(), "Home");
  }

  #[test]
  fn test_missing_store_is_an_error() {
    assert!(Config::parse("ai:\n  endpoint: x\n").is_err());
  }
}
