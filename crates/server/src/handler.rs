//! MCP server handler implementation.
//!
//! Routes tool calls to the implementations in `tools`.

use std::sync::Arc;

use pagesync_sync::SyncService;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::tools::content::PageContentParams;
use crate::tools::mapping::MappingParams;
use crate::tools::schema::{EnsureOptionParams, SchemaParams};
use crate::tools::{cache, content, mapping, schema, sync};

#[derive(Clone)]
pub struct PageSyncServer {
    service: Arc<SyncService>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PageSyncServer {
    pub fn new(service: Arc<SyncService>) -> Self {
        Self { service, tool_router: Self::tool_router() }
    }

    #[tool(description = "Run a reconciliation pass now. Fails if a pass is already running.")]
    async fn sync_trigger(&self) -> Result<CallToolResult, McpError> {
        sync::trigger_impl(&self.service).await
    }

    #[tool(
        description = "Sync status: scheduler state, record counts, kind distribution and the last pass summary."
    )]
    async fn sync_status(&self) -> Result<CallToolResult, McpError> {
        sync::status_impl(&self.service).await
    }

    #[tool(description = "Rendered plain text of a page, from the content cache unless use_cache is false.")]
    async fn page_content(&self, params: Parameters<PageContentParams>) -> Result<CallToolResult, McpError> {
        content::content_impl(&self.service, params.0).await
    }

    #[tool(description = "Normalized schema of a container (database), cache-first.")]
    async fn schema_get(&self, params: Parameters<SchemaParams>) -> Result<CallToolResult, McpError> {
        schema::get_impl(&self.service, params.0).await
    }

    #[tool(description = "Drop the cached schema of a container so the next read is fetched fresh.")]
    async fn schema_invalidate(&self, params: Parameters<SchemaParams>) -> Result<CallToolResult, McpError> {
        schema::invalidate_impl(&self.service, params.0).await
    }

    #[tool(description = "Add an option to a select, multi-select or status property if it is missing.")]
    async fn schema_ensure_option(&self, params: Parameters<EnsureOptionParams>) -> Result<CallToolResult, McpError> {
        schema::ensure_option_impl(&self.service, params.0).await
    }

    #[tool(description = "Secondary mapping handle (e.g. a chat thread) for a container and key, created on first use.")]
    async fn mapping_get_or_create(&self, params: Parameters<MappingParams>) -> Result<CallToolResult, McpError> {
        mapping::get_or_create_impl(&self.service, params.0).await
    }

    #[tool(description = "Purge expired entries from every cache. Returns the number deleted.")]
    async fn cache_purge(&self) -> Result<CallToolResult, McpError> {
        cache::purge_impl(&self.service).await
    }
}

impl ServerHandler for PageSyncServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "pagesync".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
