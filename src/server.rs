use rmcp::ServiceExt;
use rmcp::transport::sse_server::SseServer;
use rmcp::transport::stdio;
use tracing_subscriber::{self, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::docs_fetcher::DocsFetcher;
use crate::mcp::DocServer;

// RUST_LOG wins over --log-level
fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

// start sse server
pub async fn start_sse_server(addr: &str, fetcher: DocsFetcher, log_level: &str) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Launching documentation MCP server on {} with {} doc sources",
        addr,
        fetcher.list_doc_sources().len()
    );

    let ct = SseServer::serve(addr.parse()?)
        .await?
        .with_service(move || DocServer::new(fetcher.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    ct.cancel();
    Ok(())
}

// start stdio server
pub async fn start_stdio_server(fetcher: DocsFetcher, log_level: &str) -> anyhow::Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_level))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!(
        "Starting documentation MCP server with {} doc sources",
        fetcher.list_doc_sources().len()
    );

    let service = DocServer::new(fetcher).serve(stdio()).await.inspect_err(|e| {
        tracing::error!("serving error: {:?}", e);
    })?;

    service.waiting().await?;
    Ok(())
}
