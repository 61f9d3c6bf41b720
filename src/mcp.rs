//! MCP server exposing the configured documentation sources.
//!
//! Two tools are published:
//!
//! - `list_doc_sources`: the configured `llms.txt` sources, in order
//! - `fetch_docs`: fetch a source or an allowlisted URL
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use mcpdoc::config::{DocsConfig, FetchSettings, parse_url_entries};
//! use mcpdoc::docs_fetcher::DocsFetcher;
//! use mcpdoc::mcp::DocServer;
//!
//! let entries = parse_url_entries(&["LangGraph:https://langchain-ai.github.io/langgraph/llms.txt"]);
//! let config = DocsConfig::build(entries, &[] as &[&str], FetchSettings::default()).unwrap();
//! let server = DocServer::new(DocsFetcher::new(Arc::new(config)).unwrap());
//! ```

use std::time::Duration;

use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities};
use rmcp::{ServerHandler, model::ServerInfo, tool};
use rmcp::schemars;

use crate::config::{DocSource, SourceKind};
use crate::docs_fetcher::{DocContent, DocsFetchError, DocsFetcher};

/// MCP handler; cheap to clone, one instance per connection.
#[derive(Clone)]
pub struct DocServer {
    fetcher: DocsFetcher,
}

#[tool(tool_box)]
impl DocServer {
    pub fn new(fetcher: DocsFetcher) -> Self {
        Self { fetcher }
    }

    #[tool(description = "List the available documentation sources. \
        This is typically the first tool to call: each source is an llms.txt index \
        whose links can then be read with fetch_docs.")]
    async fn list_doc_sources(&self) -> String {
        render_sources(self.fetcher.list_doc_sources())
    }

    /// Fetches a documentation source by name, an allowed URL, or a
    /// configured local file.
    #[tool(description = "Fetch documentation from a URL, a configured local file, or a source \
        name returned by list_doc_sources. Only the domains of the configured sources and \
        explicitly allowed domains can be fetched. HTML is returned as markdown.")]
    async fn fetch_docs(
        &self,
        #[tool(param)]
        #[schemars(description = "URL to fetch, or the name or path of a configured documentation source")]
        url: String,

        #[tool(param)]
        #[schemars(description = "Optional timeout in seconds. Defaults to the server's configured timeout.")]
        timeout_secs: Option<f64>,
    ) -> Result<DocContent, DocsFetchError> {
        // out-of-range values fall back to the configured timeout
        let timeout = timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .filter(|timeout| !timeout.is_zero());

        tracing::debug!("fetch_docs {:?} (timeout {:?})", url, timeout);
        self.fetcher.fetch_docs(&url, timeout).await.inspect_err(|err| {
            tracing::info!("fetch_docs {:?} failed: {}", url, err);
        })
    }

    fn instructions(&self) -> String {
        let config = self.fetcher.config();
        let names: Vec<&str> = config.sources().iter().map(|s| s.name.as_str()).collect();
        let allowed = if config.allowlist().allows_all() {
            "any domain".to_string()
        } else {
            config.allowlist().to_string()
        };
        format!(
            "This server provides documentation from llms.txt sources ({}). \
            Call 'list_doc_sources' to see them, use 'fetch_docs' to read a source's index, \
            then call 'fetch_docs' on the URLs in the index that are relevant to the question. \
            Allowed domains: {}. Local files can only be read if they are configured sources.",
            names.join(", "),
            allowed
        )
    }
}

#[tool(tool_box)]
impl ServerHandler for DocServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(self.instructions()),
        }
    }
}

/// Renders sources as `name`, `URL:`/`Path:` and an optional description,
/// separated by blank lines.
pub fn render_sources(sources: &[DocSource]) -> String {
    let mut content = String::new();
    for source in sources {
        let label = match source.kind {
            SourceKind::Remote => "URL",
            SourceKind::Local => "Path",
        };
        content.push_str(&format!("{}\n{}: {}\n", source.name, label, source.location));
        if let Some(description) = &source.description {
            content.push_str(&format!("Description: {}\n", description));
        }
        content.push('\n');
    }
    content
}
