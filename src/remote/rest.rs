use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::filter::{filters_to_query, Filter, Select};
use super::types::Session;
use super::{AuthSession, BlobStore, DataStore};

/// HTTP client for the store's REST, storage and auth endpoints
#[derive(Clone)]
pub struct RestClient {
  http: reqwest::Client,
  base: Url,
  api_key: String,
  access_token: Arc<RwLock<Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
  id: String,
  #[serde(default)]
  email: Option<String>,
}

impl RestClient {
  pub fn new(url: &str, api_key: String, access_token: Option<String>) -> Result<Self> {
    let trimmed = url.trim_end_matches('/');
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
      return Err(eyre!("Store URL must start with http:// or https://: {}", url));
    }
    let base = Url::parse(&format!("{}/", trimmed))
      .map_err(|e| eyre!("Invalid store URL {}: {}", url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .connect_timeout(Duration::from_secs(10))
      .user_agent(format!("maynsta/{}", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      api_key,
      access_token: Arc::new(RwLock::new(access_token)),
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))
  }

  fn token(&self) -> Option<String> {
    self
      .access_token
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let bearer = self.token().unwrap_or_else(|| self.api_key.clone());
    self
      .http
      .request(method, url)
      .header("apikey", &self.api_key)
      .bearer_auth(bearer)
  }
}

async fn ensure_success(response: Response, what: &str) -> Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(eyre!("{} failed ({}): {}", what, status.as_u16(), body))
}

#[async_trait]
impl DataStore for RestClient {
  async fn select(&self, query: &Select) -> Result<Vec<Value>> {
    let url = self.endpoint(&format!("rest/v1/{}", query.table))?;
    debug!(table = %query.table, "select");

    let response = self
      .request(Method::GET, url)
      .query(&query.to_query())
      .send()
      .await
      .map_err(|e| eyre!("Failed to query {}: {}", query.table, e))?;

    ensure_success(response, &format!("Select on {}", query.table))
      .await?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse {} rows: {}", query.table, e))
  }

  async fn insert(&self, table: &str, row: Value) -> Result<()> {
    let url = self.endpoint(&format!("rest/v1/{}", table))?;
    debug!(table = %table, "insert");

    let response = self
      .request(Method::POST, url)
      .header("Prefer", "return=minimal")
      .json(&row)
      .send()
      .await
      .map_err(|e| eyre!("Failed to insert into {}: {}", table, e))?;

    ensure_success(response, &format!("Insert into {}", table)).await?;
    Ok(())
  }

  async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<()> {
    let url = self.endpoint(&format!("rest/v1/{}", table))?;
    debug!(table = %table, "update");

    let response = self
      .request(Method::PATCH, url)
      .query(&filters_to_query(filters))
      .header("Prefer", "return=minimal")
      .json(&patch)
      .send()
      .await
      .map_err(|e| eyre!("Failed to update {}: {}", table, e))?;

    ensure_success(response, &format!("Update of {}", table)).await?;
    Ok(())
  }

  async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
    let url = self.endpoint(&format!("rest/v1/{}", table))?;
    debug!(table = %table, "delete");

    let response = self
      .request(Method::DELETE, url)
      .query(&filters_to_query(filters))
      .send()
      .await
      .map_err(|e| eyre!("Failed to delete from {}: {}", table, e))?;

    ensure_success(response, &format!("Delete from {}", table)).await?;
    Ok(())
  }
}

#[async_trait]
impl BlobStore for RestClient {
  async fn upload(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<()> {
    let url = self.endpoint(&format!("storage/v1/object/{}/{}", bucket, path))?;
    debug!(bucket = %bucket, path = %path, size = bytes.len(), "upload");

    let response = self
      .request(Method::POST, url)
      .header("Content-Type", content_type)
      .body(bytes)
      .send()
      .await
      .map_err(|e| eyre!("Failed to upload {}: {}", path, e))?;

    ensure_success(response, &format!("Upload of {}", path)).await?;
    Ok(())
  }

  fn public_url(&self, bucket: &str, path: &str) -> String {
    format!("{}storage/v1/object/public/{}/{}", self.base, bucket, path)
  }
}

#[async_trait]
impl AuthSession for RestClient {
  async fn get_session(&self) -> Result<Option<Session>> {
    if self.token().is_none() {
      return Ok(None);
    }

    let url = self.endpoint("auth/v1/user")?;
    let response = self
      .request(Method::GET, url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to load session: {}", e))?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
      return Ok(None);
    }

    let user: ApiUser = ensure_success(response, "Session lookup")
      .await?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse session user: {}", e))?;

    info!(user_id = %user.id, "Session loaded");
    Ok(Some(Session {
      user_id: user.id,
      email: user.email,
    }))
  }

  async fn sign_out(&self) -> Result<()> {
    if self.token().is_none() {
      return Ok(());
    }

    let url = self.endpoint("auth/v1/logout")?;
    let response = self
      .request(Method::POST, url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to sign out: {}", e))?;
    ensure_success(response, "Sign out").await?;

    *self
      .access_token
      .write()
      .unwrap_or_else(PoisonError::into_inner) = None;
    info!("Signed out");
    Ok(())
  }

  async fn update_password(&self, password: &str) -> Result<()> {
    let url = self.endpoint("auth/v1/user")?;
    let response = self
      .request(Method::PUT, url)
      .json(&serde_json::json!({ "password": password }))
      .send()
      .await
      .map_err(|e| eyre!("Failed to update password: {}", e))?;

    let status = response.status();
    if status.is_success() {
      return Ok(());
    }

    // The auth service reports a human-readable `msg`
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = body
      .get("msg")
      .or_else(|| body.get("message"))
      .and_then(Value::as_str)
      .map(String::from)
      .unwrap_or_else(|| format!("Password update failed ({})", status.as_u16()));
    Err(eyre!(message))
  }
}
