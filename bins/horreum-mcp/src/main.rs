use clap::{Parser, ValueEnum};
use horreum_client::{HorreumClient, RetryPolicy};
use horreum_mcp::{serve_http, stdio, HorreumMcpServer, HttpConfig, ServiceExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Transport {
    /// Serve MCP over stdin/stdout
    Stdio,
    /// Serve MCP over streamable HTTP
    Http,
}

#[derive(Parser)]
#[clap(version, about = "MCP server for a Horreum performance-data repository")]
struct Cli {
    /// Base URL of the Horreum instance
    #[clap(long, env = "HORREUM_BASE_URL")]
    base_url: String,

    /// API token for authenticated access
    #[clap(long, env = "HORREUM_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Transport to serve on
    #[clap(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// HTTP bind address (http transport only)
    #[clap(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// MCP endpoint path (http transport only)
    #[clap(long, default_value = "/mcp")]
    mcp_path: String,

    /// Upstream requests admitted per rolling second
    #[clap(long, default_value_t = 10)]
    requests_per_second: u32,

    /// Retry attempts after the first failure
    #[clap(long, default_value_t = 3)]
    max_retries: u32,

    /// Initial retry backoff in milliseconds
    #[clap(long, default_value_t = 500)]
    backoff_initial_ms: u64,

    /// Retry backoff ceiling in milliseconds
    #[clap(long, default_value_t = 10_000)]
    backoff_max_ms: u64,

    /// Per-attempt upstream timeout in seconds
    #[clap(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is reserved for the stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let policy = RetryPolicy {
        max_retries: cli.max_retries,
        backoff_initial: Duration::from_millis(cli.backoff_initial_ms),
        backoff_max: Duration::from_millis(cli.backoff_max_ms),
        timeout: Duration::from_secs(cli.timeout_secs),
        requests_per_second: cli.requests_per_second,
        ..RetryPolicy::default()
    };

    let client = Arc::new(HorreumClient::new(&cli.base_url, cli.api_token, policy)?);
    let server = HorreumMcpServer::new(client);

    tracing::info!(base_url = %cli.base_url, transport = ?cli.transport, "starting");

    match cli.transport {
        Transport::Stdio => {
            let service = server.serve(stdio()).await?;
            service.waiting().await?;
        }
        Transport::Http => {
            let config = HttpConfig::new(cli.listen).with_mcp_path(cli.mcp_path);
            serve_http(server, config).await?;
        }
    }

    Ok(())
}
