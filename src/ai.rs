//! Client for the AI query helper endpoint.

use std::time::Duration;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Question sent to the helper, with the top search hit as context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRequest {
  pub question: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub song_title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub artist_name: Option<String>,
}

/// Helper response: either an answer or the endpoint's own error text
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AiReply {
  #[serde(default)]
  pub answer: Option<String>,
  #[serde(default)]
  pub error: Option<String>,
}

impl AiReply {
  /// Text to show the user: the reported error wins over the answer.
  pub fn into_message(self) -> String {
    self.error.or(self.answer).unwrap_or_default()
  }
}

#[async_trait]
pub trait Assistant: Send + Sync {
  /// Ask one question. `Err` means the endpoint could not be reached or
  /// its response was unreadable.
  async fn ask(&self, request: &AiRequest) -> Result<AiReply>;
}

/// HTTP implementation of [`Assistant`]
#[derive(Clone)]
pub struct AiClient {
  http: reqwest::Client,
  endpoint: Url,
}

impl AiClient {
  pub fn new(endpoint: &str) -> Result<Self> {
    let endpoint =
      Url::parse(endpoint).map_err(|e| eyre!("Invalid AI endpoint {}: {}", endpoint, e))?;
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
    Ok(Self { http, endpoint })
  }
}

#[async_trait]
impl Assistant for AiClient {
  async fn ask(&self, request: &AiRequest) -> Result<AiReply> {
    debug!(has_context = request.song_title.is_some(), "Asking AI helper");

    // Error statuses still carry an `{error}` body worth showing
    self
      .http
      .post(self.endpoint.clone())
      .json(request)
      .send()
      .await
      .map_err(|e| eyre!("AI request failed: {}", e))?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse AI response: {}", e))
  }
}
