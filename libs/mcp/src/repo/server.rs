//! MCP server exposing the repository tools.
//!
//! Each tool delegates to its parameter type's `ToolCall::call`
//! implementation, passing the request's cancellation token through so a
//! dropped client connection aborts in-flight upstream calls.

use super::{types::*, RepoResource, INSTRUCTIONS};
use crate::ToolCall;
use horreum_client::HorreumClient;
use rmcp::{
    handler::server::tool::{Parameters, ToolRouter},
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
    ErrorData as McpError, RoleServer, ServerHandler,
};
use std::future::Future;
use std::sync::Arc;

/// MCP server for one Horreum instance.
///
/// # Example
///
/// ```ignore
/// use horreum_client::{HorreumClient, RetryPolicy};
/// use horreum_mcp::{serve_http, HorreumMcpServer, HttpConfig};
/// use std::sync::Arc;
///
/// let client = Arc::new(HorreumClient::new(
///     "https://horreum.example.com",
///     None,
///     RetryPolicy::default(),
/// )?);
/// let server = HorreumMcpServer::new(client);
///
/// serve_http(server, HttpConfig::default()).await?;
/// ```
#[derive(Clone)]
pub struct HorreumMcpServer {
    resource: Arc<RepoResource>,
    tool_router: ToolRouter<Self>,
}

impl HorreumMcpServer {
    pub fn new(client: Arc<HorreumClient>) -> Self {
        Self {
            resource: Arc::new(RepoResource::new(client)),
            tool_router: Self::tool_router(),
        }
    }

    pub fn resource(&self) -> &RepoResource {
        &self.resource
    }
}

#[tool_router]
impl HorreumMcpServer {
    #[tool(
        description = "List test definitions with pagination; optionally restricted to a folder"
    )]
    async fn list_tests(
        &self,
        Parameters(params): Parameters<ListTestsParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        params.call(&self.resource, context.ct).await
    }

    #[tool(description = "Fetch one test definition by numeric ID or exact name")]
    async fn get_test(
        &self,
        Parameters(params): Parameters<GetTestParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        params.call(&self.resource, context.ct).await
    }

    #[tool(
        description = "List runs of a test with pagination, optionally filtered to a time window (from/to accept epoch millis, ISO timestamps, or phrases like 'last week')"
    )]
    async fn list_runs(
        &self,
        Parameters(params): Parameters<ListRunsParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        params.call(&self.resource, context.ct).await
    }

    #[tool(description = "Fetch one run by numeric ID, data payload included")]
    async fn get_run(
        &self,
        Parameters(params): Parameters<GetRunParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        params.call(&self.resource, context.ct).await
    }
}

#[tool_handler]
impl ServerHandler for HorreumMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}
