use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use mcpdoc::config::{DocsConfig, FetchSettings, collect_sources};
use mcpdoc::docs_fetcher::DocsFetcher;
use mcpdoc::server;

const EXAMPLES: &str = "\
Examples:
  # Named remote source
  mcpdoc --urls LangGraph:https://langchain-ai.github.io/langgraph/llms.txt

  # Local file; local files never add an allowed domain
  mcpdoc --urls MCP:/path/to/mcp.txt --allowed-domains '*'

  # Config files and CLI sources combined
  mcpdoc --yaml sources.yaml --json sources.json --urls https://modelcontextprotocol.io/llms.txt

  # SSE transport on a custom address
  mcpdoc --json sources.json --transport sse --host 0.0.0.0 --port 9000

  # Additional allowed domains (the domains of remote sources are always allowed)
  mcpdoc --json sources.json --allowed-domains https://example.com/ another-example.com";

#[derive(Parser, Debug)]
#[command(version, about = "MCP Documentation Server", after_help = EXAMPLES)]
struct Cli {
    /// Path to YAML config file with doc sources
    #[arg(short, long)]
    yaml: Option<PathBuf>,

    /// Path to JSON config file with doc sources
    #[arg(short, long)]
    json: Option<PathBuf>,

    /// Documentation sources, as 'url_or_path' or 'name:url_or_path'
    #[arg(short, long, num_args = 1..)]
    urls: Vec<String>,

    /// Additional allowed domains to fetch documentation from. Use '*' to allow all domains
    #[arg(long, num_args = 0..)]
    allowed_domains: Vec<String>,

    /// Follow HTTP redirects (each hop must target an allowed domain)
    #[arg(long)]
    follow_redirects: bool,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 10.0)]
    timeout: f64,

    /// Transport protocol for the MCP server
    #[arg(short, long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Host to bind the SSE server to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind the SSE server to
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Serve over stdin/stdout
    Stdio,
    /// Start an SSE server
    Sse,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let timeout = Duration::try_from_secs_f64(cli.timeout)
        .map_err(|err| anyhow::anyhow!("invalid --timeout {}: {}", cli.timeout, err))?;
    if timeout.is_zero() {
        anyhow::bail!("--timeout must be a positive number of seconds");
    }
    let settings = FetchSettings {
        timeout,
        follow_redirects: cli.follow_redirects,
    };

    let entries = collect_sources(cli.yaml.as_deref(), cli.json.as_deref(), &cli.urls)?;
    let config = DocsConfig::build(entries, &cli.allowed_domains, settings)?;
    let fetcher = DocsFetcher::new(Arc::new(config))?;

    match cli.transport {
        Transport::Sse => {
            let addr = format!("{}:{}", cli.host, cli.port);
            server::start_sse_server(&addr, fetcher, &cli.log_level).await?;
        }
        Transport::Stdio => {
            server::start_stdio_server(fetcher, &cli.log_level).await?;
        }
    }

    Ok(())
}
