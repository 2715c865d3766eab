//! MCP tools for the Horreum repository.
//!
//! - **types**: parameter types for all repository tools, each implementing
//!   `ToolCall`
//! - **server**: `HorreumMcpServer`, a ready-to-use MCP server exposing them
//!
//! Each parameter type carries its own execution logic via the `ToolCall`
//! trait, so a custom server can compose individual tools the same way
//! `HorreumMcpServer` does:
//!
//! ```ignore
//! #[tool(description = "List runs of a test")]
//! async fn list_runs(
//!     &self,
//!     Parameters(params): Parameters<ListRunsParams>,
//!     context: RequestContext<RoleServer>,
//! ) -> Result<CallToolResult, McpError> {
//!     params.call(&self.resource, context.ct.clone()).await
//! }
//! ```

pub mod server;
pub mod types;

pub use server::HorreumMcpServer;
pub use types::*;

use horreum_client::{ClientError, HorreumClient};
use rmcp::ErrorData as McpError;
use serde_json::json;
use std::sync::Arc;

/// Resource context for repository tool execution.
///
/// Wraps the shared upstream client; all tools of one server instance go
/// through the same rate window and retry policy.
pub struct RepoResource {
    client: Arc<HorreumClient>,
}

impl RepoResource {
    pub fn new(client: Arc<HorreumClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &HorreumClient {
        &self.client
    }
}

/// Instructions for AI assistants using the repository tools.
pub const INSTRUCTIONS: &str = r#"
This server provides read access to a Horreum performance-data repository.

## Tests and Runs
- A test is a named benchmark definition; a run is one recorded execution of it.
- list_tests lists test definitions; list_runs lists the runs of one test.
- list_runs accepts the test's numeric ID or its exact name.

## Pagination
- Paginated responses carry a `pagination` object with `has_more`,
  `total_count`, and (when more pages exist) `next_page_token`.
- To fetch the next page, pass `next_page_token` back as `pageToken`
  unchanged. Tokens are opaque; do not construct or edit them.

## Time filters
- list_runs accepts `from` and `to` as epoch milliseconds, ISO timestamps
  (e.g. 2025-06-15T12:00:00Z), or phrases like "now", "yesterday",
  "last week", "last 7 days". Phrases resolve backward in time.
- With only `from` given, `to` defaults to now.

## Errors
- Errors carry a machine-readable `code` and a `retryable` flag. On
  RATE_LIMITED, wait `retry_after_ms` (if present) before retrying.
"#;

/// Map a client error onto the MCP error surface.
///
/// Validation failures become invalid-params; everything else is an internal
/// error. The structured data field carries the stable error code plus retry
/// hints so callers can react without parsing the message.
pub(crate) fn to_mcp_error(err: ClientError) -> McpError {
    let data = json!({
        "code": err.code(),
        "retryable": err.is_retryable(),
        "retry_after_ms": err.retry_after().map(|d| d.as_millis() as u64),
    });
    tracing::warn!(code = err.code(), error = %err, "tool call failed");
    if err.status_code() == 400 {
        McpError::invalid_params(err.to_string(), Some(data))
    } else {
        McpError::internal_error(err.to_string(), Some(data))
    }
}
