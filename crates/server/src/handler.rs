//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, CacheRemoveParams, get_impl, remove_impl};
use crate::tools::{PageLoadParams, page_load_impl, reloads_impl};

use instapage_client::FetchClient;
use instapage_core::loader::ReloadLog;
use instapage_core::{AppConfig, CacheDb};
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

/// The main MCP server handler for instapage.
#[derive(Clone)]
pub struct InstapageServer {
    tool_router: ToolRouter<Self>,
    config: Arc<AppConfig>,
    cache: CacheDb,
    client: FetchClient,
    reloads: ReloadLog,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl InstapageServer {
    /// Create a new server handler.
    pub fn new(config: AppConfig, cache: CacheDb, client: FetchClient) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config: Arc::new(config),
            cache,
            client,
            reloads: ReloadLog::new(),
        }
    }

    /// Load a page's deferred stylesheets, scripts and icons.
    ///
    /// Cached content is served immediately and revalidated in the background;
    /// misses are fetched and stored.
    #[tool(description = "Load a page's deferred resources through the cache; reports each reference and any reload.")]
    async fn page_load(&self, params: Parameters<PageLoadParams>) -> Result<CallToolResult, McpError> {
        let store = Arc::new(self.cache.clone());
        page_load_impl(store, &self.client, self.config.loader_config(), &self.reloads, params.0).await
    }

    #[tool(description = "Report and clear reloads requested by revalidations that finished after page_load returned.")]
    async fn reload_requests(&self) -> Result<CallToolResult, McpError> {
        reloads_impl(&self.reloads)
    }

    #[tool(description = "Show the cached envelope for a resource locator: key, media type, size and last update.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.cache, self.config.key_strategy, params.0).await
    }

    #[tool(description = "Remove the cached envelope for a resource locator so the next load fetches it again.")]
    async fn cache_remove(&self, params: Parameters<CacheRemoveParams>) -> Result<CallToolResult, McpError> {
        remove_impl(&self.cache, self.config.key_strategy, params.0).await
    }
}

impl ServerHandler for InstapageServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "instapage".into(),
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
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
