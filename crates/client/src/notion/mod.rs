//! Notion API client.
//!
//! Provides a rate-limited client for the Notion REST API:
//!
//! - **Authentication**: bearer integration token plus the `Notion-Version` header.
//! - **Rate Limiting**: a minimum interval between requests (default 334ms, about 3 req/s).
//! - **Errors**: HTTP statuses map onto `ApiError` variants; retries live in
//!   `crate::retry`, not here.

pub mod error;
pub mod request;
pub mod response;

pub use error::{ApiError, ErrorClass};
pub use request::{DatabaseQuery, MAX_PAGE_SIZE, UpdateDatabase};
pub use response::{Block, Database, DatabaseProperty, Page, Paginated, PartialUser, PropertyValue, SelectOption};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pagesync_core::AppConfig;
use reqwest::{RequestBuilder, header};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::api::ContentApi;

/// Notion client configuration.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: String,
    pub base_url: String,
    pub api_version: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub min_request_interval: Duration,
}

impl NotionConfig {
    /// Build from application config. Fails if no token is configured.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ApiError> {
        let token = config.require_api_token().map_err(|_| ApiError::MissingToken)?;
        Ok(Self {
            token: token.to_string(),
            base_url: config.api_base_url.clone(),
            api_version: config.api_version.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            min_request_interval: config.min_request_interval(),
        })
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self { last_request: Mutex::new(None), min_interval }
    }

    /// Acquire permission to make a request, waiting if necessary.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Notion API client.
#[derive(Debug, Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    base_url: Url,
    config: NotionConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl NotionClient {
    /// Create a new client with the given configuration.
    pub fn new(config: NotionConfig) -> Result<Self, ApiError> {
        if config.token.trim().is_empty() {
            return Err(ApiError::MissingToken);
        }

        let base_url = Url::parse(&config.base_url).map_err(|e| ApiError::BadRequest(format!("base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::BadRequest(format!("base url cannot be a base: {base_url}")));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ApiError::Network(Arc::new(e)))?;

        let rate_limiter = Arc::new(RateLimiter::new(config.min_request_interval));
        Ok(Self { http, base_url, config, rate_limiter })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, ApiError> {
        Self::new(NotionConfig::from_app_config(config)?)
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ApiError::BadRequest("empty path segment".into()));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::BadRequest("base url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and decode a JSON response.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, op: &'static str) -> Result<T, ApiError> {
        self.rate_limiter.acquire().await;

        let start = Instant::now();
        let response = request
            .bearer_auth(&self.config.token)
            .header("Notion-Version", &self.config.api_version)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(op, status = status.as_u16(), elapsed_ms = start.elapsed().as_millis() as u64, "content api response");

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), retry_after, &body));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Parse(format!("{op}: {e}")))
    }
}

/// `Retry-After` in delta-seconds form.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

#[async_trait]
impl ContentApi for NotionClient {
    async fn retrieve_page(&self, page_id: &str) -> Result<Page, ApiError> {
        let url = self.endpoint(&["pages", page_id])?;
        self.send(self.http.get(url), "retrieve_page").await
    }

    async fn list_block_children(&self, block_id: &str, cursor: Option<&str>) -> Result<Paginated<Block>, ApiError> {
        let mut url = self.endpoint(&["blocks", block_id, "children"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page_size", &MAX_PAGE_SIZE.to_string());
            if let Some(cursor) = cursor {
                query.append_pair("start_cursor", cursor);
            }
        }
        self.send(self.http.get(url), "list_block_children").await
    }

    async fn query_database(&self, database_id: &str, cursor: Option<&str>) -> Result<Paginated<Page>, ApiError> {
        let url = self.endpoint(&["databases", database_id, "query"])?;
        let body = DatabaseQuery::starting_at(cursor);
        self.send(self.http.post(url).json(&body), "query_database").await
    }

    async fn retrieve_database(&self, database_id: &str) -> Result<Database, ApiError> {
        let url = self.endpoint(&["databases", database_id])?;
        self.send(self.http.get(url), "retrieve_database").await
    }

    async fn update_database_properties(
        &self, database_id: &str, properties: serde_json::Value,
    ) -> Result<Database, ApiError> {
        let url = self.endpoint(&["databases", database_id])?;
        let body = UpdateDatabase { properties };
        self.send(self.http.patch(url).json(&body), "update_database_properties").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(base_url: &str) -> NotionConfig {
        NotionConfig {
            token: "secret".into(),
            base_url: base_url.into(),
            api_version: "2022-06-28".into(),
            timeout: Duration::from_secs(5),
            user_agent: "pagesync-test".into(),
            min_request_interval: Duration::ZERO,
        }
    }

    /// Serve one canned HTTP response and hand back the raw request head.
    async fn serve_once(
        status_line: &'static str, extra_headers: &'static str, body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n{extra_headers}\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&head).into_owned()
        });
        (format!("http://{addr}/v1"), handle)
    }

    #[test]
    fn test_new_requires_token() {
        let result = NotionClient::new(NotionConfig { token: " ".into(), ..config("http://localhost/v1") });
        assert!(matches!(result, Err(ApiError::MissingToken)));
    }

    #[test]
    fn test_from_app_config_missing_token() {
        let result = NotionClient::from_app_config(&AppConfig::default());
        assert!(matches!(result, Err(ApiError::MissingToken)));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = NotionClient::new(config("https://api.notion.com/v1")).unwrap();
        let url = client.endpoint(&["pages", "abc/../def"]).unwrap();
        assert_eq!(url.as_str(), "https://api.notion.com/v1/pages/abc%2F..%2Fdef");
        assert!(client.endpoint(&["pages", ""]).is_err());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 0.5 "), Some(Duration::from_millis(500)));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[tokio::test]
    async fn test_retrieve_page_sends_headers() {
        let (base, server) = serve_once("200 OK", "", r#"{"object":"page","id":"p1","archived":false}"#).await;
        let client = NotionClient::new(config(&base)).unwrap();

        let page = client.retrieve_page("p1").await.unwrap();
        assert_eq!(page.id, "p1");

        let head = server.await.unwrap().to_lowercase();
        assert!(head.starts_with("get /v1/pages/p1 "));
        assert!(head.contains("authorization: bearer secret"));
        assert!(head.contains("notion-version: 2022-06-28"));
    }

    #[tokio::test]
    async fn test_not_found_maps_to_error() {
        let (base, _server) =
            serve_once("404 Not Found", "", r#"{"object":"error","code":"object_not_found","message":"gone"}"#).await;
        let client = NotionClient::new(config(&base)).unwrap();

        let err = client.retrieve_page("p1").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(err.is_gone());
    }

    #[tokio::test]
    async fn test_rate_limited_reads_retry_after() {
        let (base, _server) = serve_once("429 Too Many Requests", "retry-after: 3\r\n", "{}").await;
        let client = NotionClient::new(config(&base)).unwrap();

        let err = client.retrieve_database("db").await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_block_children_query_string() {
        let (base, server) = serve_once("200 OK", "", r#"{"results":[],"has_more":false,"next_cursor":null}"#).await;
        let client = NotionClient::new(config(&base)).unwrap();

        let page = client.list_block_children("b1", Some("c 2")).await.unwrap();
        assert!(page.results.is_empty());

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /v1/blocks/b1/children?page_size=100&start_cursor=c+2 "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(334));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(668));
    }
}
