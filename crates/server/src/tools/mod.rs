//! MCP tool implementations.
//!
//! Each tool validates its parameters, calls into `SyncService`, and returns
//! pretty-printed JSON as text content.

pub mod cache;
pub mod content;
pub mod mapping;
pub mod schema;
pub mod sync;

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use crate::error::ToolError;

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, ToolError> {
    let json = serde_json::to_string_pretty(output)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use pagesync_client::{NotionClient, NotionConfig};
    use pagesync_core::{AppConfig, Caches, LocalDb};
    use pagesync_sync::{EngineContext, LogNotifier, SyncService, SyncSettings};
    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;
    use tokio_util::sync::CancellationToken;

    use crate::notifier::UnconfiguredMappings;

    /// A service over an in-memory store and a client pointed at a closed port.
    pub async fn service() -> (Arc<SyncService>, LocalDb) {
        let db = LocalDb::open_in_memory().await.unwrap();
        let config = AppConfig { sources: Vec::new(), ..Default::default() };
        let client = NotionClient::new(NotionConfig {
            token: "test-token".into(),
            base_url: "http://127.0.0.1:9/v1".into(),
            api_version: config.api_version.clone(),
            timeout: Duration::from_millis(200),
            user_agent: config.user_agent.clone(),
            min_request_interval: Duration::ZERO,
        })
        .unwrap();
        let ctx = EngineContext::new(
            Arc::new(client),
            Arc::new(db.clone()),
            Caches::new(&db, &config),
            Arc::new(LogNotifier),
            Arc::new(UnconfiguredMappings),
            SyncSettings::from_config(&config),
        );
        (Arc::new(SyncService::new(Arc::new(ctx), CancellationToken::new())), db)
    }

    pub fn parse<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content = serde_json::to_value(&result.content[0]).unwrap();
        let text = content.get("text").and_then(|v| v.as_str()).expect("text content");
        serde_json::from_str(text).unwrap()
    }
}
