//! MCP server library for the Horreum performance-data repository.
//!
//! This library exposes a Horreum instance's test and run listings as MCP
//! (Model Context Protocol) tools. The upstream access itself (rate limit,
//! retries, pagination, time parsing) lives in `horreum-client`; this crate
//! maps it onto the tool surface and the stdio / streamable-HTTP transports.

pub mod http;
pub mod repo;

pub use http::{serve_http, HttpConfig};
pub use repo::{HorreumMcpServer, RepoResource};

// Convenience re-exports so binaries need not depend on rmcp directly for
// the stdio transport.
pub use rmcp::{transport::stdio, ServiceExt};

use async_trait::async_trait;
use rmcp::{model::CallToolResult, ErrorData as McpError};
use tokio_util::sync::CancellationToken;

/// Binds a tool's parameter type to its execution logic.
///
/// Each parameter type (e.g. `ListRunsParams`) implements this trait, giving
/// a 1:1 correspondence between parameter types and tool implementations.
/// The cancellation token comes from the protocol layer's request context;
/// an in-flight upstream call observes it mid-retry and mid-backoff.
#[async_trait]
pub trait ToolCall {
    /// The resource context the tool executes against.
    type Resource;

    async fn call(
        self,
        res: &Self::Resource,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError>;
}
