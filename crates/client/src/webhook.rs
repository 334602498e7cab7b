//! Outbound chat webhook client.
//!
//! Posts embed messages to a Discord-style incoming webhook. Messages can go
//! to the channel, into an existing thread (`thread_id`), or open a new
//! thread (`thread_name` with `wait=true`, which returns the created message).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::notion::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebhookMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    /// Opens a thread with this name (forum channels).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    url: Url,
}

impl WebhookClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let url = Url::parse(url).map_err(|e| ApiError::BadRequest(format!("webhook url: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(Arc::new(e)))?;
        Ok(Self { http, url })
    }

    fn target(&self, thread_id: Option<&str>, wait: bool) -> Url {
        let mut pairs: Vec<(&str, &str)> = Vec::new();
        if wait {
            pairs.push(("wait", "true"));
        }
        if let Some(thread_id) = thread_id {
            pairs.push(("thread_id", thread_id));
        }

        let mut url = self.url.clone();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        url
    }

    async fn post(&self, url: Url, message: &WebhookMessage) -> Result<reqwest::Response, ApiError> {
        let response = self.http.post(url).json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), None, &body));
        }
        Ok(response)
    }

    /// Post a message, into `thread_id` when given.
    pub async fn post_message(&self, message: &WebhookMessage, thread_id: Option<&str>) -> Result<(), ApiError> {
        self.post(self.target(thread_id, false), message).await?;
        tracing::debug!(thread_id, "webhook message posted");
        Ok(())
    }

    /// Open a new thread named `name` and return its id.
    pub async fn create_thread(&self, name: &str, message: &WebhookMessage) -> Result<String, ApiError> {
        let message = WebhookMessage { thread_name: Some(name.to_string()), ..message.clone() };
        let response = self.post(self.target(None, true), &message).await?;
        let created: CreatedMessage = response.json().await?;
        created
            .channel_id
            .ok_or_else(|| ApiError::Parse("webhook response has no channel_id".into()))
    }
}
