//! Client surface of the hosted music store.
//!
//! Screens only see the three traits below; `RestClient` implements all of
//! them against the store's REST API.

pub mod filter;
mod rest;
pub mod types;

use async_trait::async_trait;
use color_eyre::Result;
use serde_json::Value;

pub use filter::{Direction, Filter, Select};
pub use rest::RestClient;

/// Row access on named tables.
#[async_trait]
pub trait DataStore: Send + Sync {
  /// Run a select and return the raw JSON rows.
  async fn select(&self, query: &Select) -> Result<Vec<Value>>;

  /// Insert one row.
  async fn insert(&self, table: &str, row: Value) -> Result<()>;

  /// Patch every row matching all `filters`.
  async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<()>;

  /// Delete every row matching all `filters`.
  async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()>;
}

/// File blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
  async fn upload(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<()>;

  /// Public URL of an uploaded object.
  fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Authentication session of the current user.
#[async_trait]
pub trait AuthSession: Send + Sync {
  /// The signed-in user, or `None` without a valid session.
  async fn get_session(&self) -> Result<Option<types::Session>>;

  async fn sign_out(&self) -> Result<()>;

  async fn update_password(&self, password: &str) -> Result<()>;
}
