//! Streamable-HTTP transport for the MCP server.
//!
//! Uses rmcp's `StreamableHttpService` over an axum router. Sessions are
//! tracked by `LocalSessionManager`; responses stream back as Server-Sent
//! Events with a configurable keep-alive.

use anyhow::Result;
use rmcp::handler::server::ServerHandler;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, tower::StreamableHttpServerConfig,
    tower::StreamableHttpService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
    /// SSE keep-alive interval (None to disable).
    pub sse_keep_alive: Option<Duration>,
    /// MCP endpoint path.
    pub mcp_path: String,
    /// Maintain session state across requests.
    pub stateful_mode: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".parse().expect("static address"),
            sse_keep_alive: Some(Duration::from_secs(30)),
            mcp_path: "/mcp".to_string(),
            stateful_mode: true,
        }
    }
}

impl HttpConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            ..Default::default()
        }
    }

    pub fn with_sse_keep_alive(mut self, interval: Option<Duration>) -> Self {
        self.sse_keep_alive = interval;
        self
    }

    pub fn with_mcp_path(mut self, path: impl Into<String>) -> Self {
        self.mcp_path = path.into();
        self
    }

    pub fn with_stateful_mode(mut self, enabled: bool) -> Self {
        self.stateful_mode = enabled;
        self
    }
}

/// Serve an MCP server over streamable HTTP until Ctrl+C.
pub async fn serve_http<S>(server: S, config: HttpConfig) -> Result<()>
where
    S: ServerHandler + Clone + Send + Sync + 'static,
{
    let server = Arc::new(server);

    let http_config = StreamableHttpServerConfig {
        sse_keep_alive: config.sse_keep_alive,
        stateful_mode: config.stateful_mode,
    };

    let service = StreamableHttpService::new(
        {
            let server = server.clone();
            move || Ok((*server).clone())
        },
        LocalSessionManager::default().into(),
        http_config,
    );

    let router = axum::Router::new().nest_service(&config.mcp_path, service);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    tracing::info!(
        addr = %config.addr,
        path = %config.mcp_path,
        stateful = config.stateful_mode,
        "HTTP transport listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("graceful shutdown initiated");
        })
        .await?;

    Ok(())
}
