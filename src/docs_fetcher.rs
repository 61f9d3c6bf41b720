//! Domain-gated retrieval of documentation content.
//!
//! Every request is resolved to either a remote URL or a local path and
//! checked before any I/O: remote URLs against the [`DomainAllowlist`],
//! local paths against the set of configured local sources.
//!
//! [`DomainAllowlist`]: crate::allowlist::DomainAllowlist

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use rmcp::model::{Content, IntoContents};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::{DocSource, DocsConfig, has_http_scheme, normalize_local_path};
use crate::html;
use crate::http::{HttpClient, HttpResponse, ReqwestHttpClient};

#[derive(Debug, Error)]
pub enum DocsFetchError {
    #[error("Domain not allowed: {domain}. Allowed domains: {allowed}")]
    DomainNotAllowed { domain: String, allowed: String },

    #[error("Documentation source not found: {0}")]
    NotFound(String),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("HTTP status {status} while fetching {url}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("Timed out after {timeout:?} while fetching {target}")]
    Timeout { target: String, timeout: Duration },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Coarse classification reported to MCP hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    DomainNotAllowed,
    FetchError,
    NotFound,
}

impl DocsFetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocsFetchError::DomainNotAllowed { .. } => ErrorKind::DomainNotAllowed,
            DocsFetchError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::FetchError,
        }
    }
}

impl IntoContents for DocsFetchError {
    fn into_contents(self) -> Vec<Content> {
        let body = serde_json::json!({
            "kind": self.kind(),
            "detail": self.to_string(),
        });
        vec![Content::text(body.to_string())]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct DocContent {
    pub content: String,
}

impl IntoContents for DocContent {
    fn into_contents(self) -> Vec<Content> {
        vec![Content::text(self.content)]
    }
}

/// Fetches documentation for configured sources and allowlisted URLs.
#[derive(Clone)]
pub struct DocsFetcher {
    config: Arc<DocsConfig>,
    http: Arc<dyn HttpClient>,
}

impl DocsFetcher {
    /// Creates a fetcher backed by reqwest, honouring the configured
    /// redirect policy.
    pub fn new(config: Arc<DocsConfig>) -> Result<Self, DocsFetchError> {
        let http = ReqwestHttpClient::new(config.settings(), config.allowlist().clone())?;
        Ok(Self::with_http_client(config, Arc::new(http)))
    }

    pub fn with_http_client(config: Arc<DocsConfig>, http: Arc<dyn HttpClient>) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &DocsConfig {
        &self.config
    }

    /// Configured sources, in configuration order.
    pub fn list_doc_sources(&self) -> &[DocSource] {
        self.config.sources()
    }

    /// Fetches `target`, which may be a source name, an `http(s)` URL, or the
    /// path of a configured local source.
    ///
    /// `timeout` bounds the whole operation and defaults to the configured
    /// fetch timeout.
    pub async fn fetch_docs(
        &self,
        target: &str,
        timeout: Option<Duration>,
    ) -> Result<DocContent, DocsFetchError> {
        let target = target.trim();
        let timeout = timeout.unwrap_or(self.config.settings().timeout);
        let location = match self.config.source_by_name(target) {
            Some(source) => source.location.as_str(),
            None => target,
        };

        match tokio::time::timeout(timeout, self.fetch_location(location, timeout)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Fetch of {} exceeded {:?}", location, timeout);
                Err(DocsFetchError::Timeout {
                    target: location.to_string(),
                    timeout,
                })
            }
        }
    }

    async fn fetch_location(
        &self,
        location: &str,
        timeout: Duration,
    ) -> Result<DocContent, DocsFetchError> {
        if has_http_scheme(location) {
            let url = Url::parse(location)?;
            self.fetch_remote(url, timeout).await
        } else {
            self.fetch_local(location).await
        }
    }

    fn ensure_allowed(&self, url: &Url) -> Result<(), DocsFetchError> {
        let allowlist = self.config.allowlist();
        allowlist.check(url).map_err(|domain| {
            tracing::warn!("Rejected fetch of {}: domain {} not allowed", url, domain);
            DocsFetchError::DomainNotAllowed {
                domain,
                allowed: allowlist.to_string(),
            }
        })
    }

    async fn fetch_remote(&self, url: Url, timeout: Duration) -> Result<DocContent, DocsFetchError> {
        self.ensure_allowed(&url)?;
        tracing::info!("Fetching documentation from: {}", url);

        let mut response = self.get_checked(&url, timeout).await?;

        if html::is_html(response.content_type.as_deref(), &response.body) {
            if let Some(target) = html::meta_refresh_target(&response.body) {
                let next = response.url.join(&target)?;
                self.ensure_allowed(&next)?;
                tracing::info!("Following meta refresh from {} to {}", response.url, next);
                response = self.get_checked(&next, timeout).await?;
            }
        }

        let content = if html::is_html(response.content_type.as_deref(), &response.body) {
            html::html_to_markdown(&response.body)
        } else {
            response.body
        };
        Ok(DocContent { content })
    }

    async fn get_checked(&self, url: &Url, timeout: Duration) -> Result<HttpResponse, DocsFetchError> {
        let response = self.http.get(url, timeout).await?;
        if response.status.is_success() {
            return Ok(response);
        }

        // A redirect the client refused to follow: report a disallowed hop
        // as such rather than as a bare status code.
        if response.status.is_redirection() && self.config.settings().follow_redirects {
            if let Some(location) = response.location.as_deref() {
                let next = response.url.join(location)?;
                self.ensure_allowed(&next)?;
            }
        }

        Err(DocsFetchError::HttpStatus {
            url: response.url.to_string(),
            status: response.status,
        })
    }

    async fn fetch_local(&self, location: &str) -> Result<DocContent, DocsFetchError> {
        let path = normalize_local_path(location)
            .map_err(|_| DocsFetchError::NotFound(location.to_string()))?;
        if !self.config.is_local_file_allowed(&path) {
            tracing::warn!("Rejected read of unconfigured local path {}", path.display());
            return Err(DocsFetchError::NotFound(location.to_string()));
        }

        tracing::info!("Reading documentation from: {}", path.display());
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| DocsFetchError::Io {
                path: path.clone(),
                source,
            })?;

        let content = if has_html_extension(&path) || html::is_html(None, &text) {
            html::html_to_markdown(&text)
        } else {
            text
        };
        Ok(DocContent { content })
    }
}

fn has_html_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchSettings, SourceEntry, parse_url_entries};
    use async_trait::async_trait;
    use mockito::Server;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Records every requested URL and answers with a fixed body.
    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl RecordingClient {
        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for RecordingClient {
        async fn get(&self, url: &Url, _timeout: Duration) -> Result<HttpResponse, DocsFetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(HttpResponse {
                url: url.clone(),
                status: StatusCode::OK,
                location: None,
                content_type: Some("text/plain".to_string()),
                body: format!("content of {url}"),
            })
        }
    }

    fn config(entries: Vec<SourceEntry>, domains: &[&str], follow_redirects: bool) -> Arc<DocsConfig> {
        let settings = FetchSettings {
            follow_redirects,
            ..FetchSettings::default()
        };
        Arc::new(DocsConfig::build(entries, domains, settings).unwrap())
    }

    fn fetcher(entries: Vec<SourceEntry>, domains: &[&str]) -> DocsFetcher {
        DocsFetcher::new(config(entries, domains, false)).unwrap()
    }

    #[tokio::test]
    async fn test_source_origin_is_auto_allowed() {
        let mut server = Server::new_async().await;
        let index = server
            .mock("GET", "/langgraph.txt")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("# LangGraph\n- [Intro](/intro.txt)")
            .create_async()
            .await;
        let other = server
            .mock("GET", "/anything.txt")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("anything")
            .create_async()
            .await;

        let fetcher = fetcher(
            vec![SourceEntry::new(
                Some("LangGraph"),
                &format!("{}/langgraph.txt", server.url()),
            )],
            &[],
        );

        let by_name = fetcher.fetch_docs("LangGraph", None).await.unwrap();
        assert!(by_name.content.starts_with("# LangGraph"));

        let result = fetcher
            .fetch_docs(&format!("{}/anything.txt", server.url()), None)
            .await
            .unwrap();
        assert_eq!(result.content, "anything");

        index.assert_async().await;
        other.assert_async().await;
    }

    #[tokio::test]
    async fn test_disallowed_domain_never_reaches_network() {
        let http = Arc::new(RecordingClient::default());
        let fetcher = DocsFetcher::with_http_client(
            config(
                parse_url_entries(&["LangGraph:https://raw.githubusercontent.com/x/langgraph.txt"]),
                &[],
                false,
            ),
            http.clone(),
        );

        let err = fetcher
            .fetch_docs("https://example.com/x.txt", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DomainNotAllowed);
        assert!(matches!(&err, DocsFetchError::DomainNotAllowed { domain, .. } if domain == "example.com"));

        // subdomains of an allowed host are not allowed
        let err = fetcher
            .fetch_docs("https://sub.raw.githubusercontent.com/x.txt", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DomainNotAllowed);

        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn test_wildcard_attempts_any_url() {
        let http = Arc::new(RecordingClient::default());
        let fetcher = DocsFetcher::with_http_client(
            config(parse_url_entries(&["Docs:https://docs.example/llms.txt"]), &["*"], false),
            http.clone(),
        );

        let result = fetcher
            .fetch_docs("https://anything.invalid/some/page.txt", None)
            .await
            .unwrap();

        assert_eq!(result.content, "content of https://anything.invalid/some/page.txt");
        assert_eq!(http.requests(), vec!["https://anything.invalid/some/page.txt"]);

        // schemes are case-insensitive
        fetcher
            .fetch_docs("HTTPS://Anything.Invalid/upper.txt", None)
            .await
            .unwrap();
        assert_eq!(http.requests()[1], "https://anything.invalid/upper.txt");
    }

    #[tokio::test]
    async fn test_uppercase_scheme_is_gated() {
        let http = Arc::new(RecordingClient::default());
        let fetcher = DocsFetcher::with_http_client(
            config(parse_url_entries(&["Docs:HTTPS://Docs.Example/llms.txt"]), &[], false),
            http.clone(),
        );

        fetcher.fetch_docs("Docs", None).await.unwrap();
        let err = fetcher
            .fetch_docs("HTTP://Blocked.Example/x.txt", None)
            .await
            .unwrap_err();

        assert!(matches!(&err, DocsFetchError::DomainNotAllowed { domain, .. } if domain == "blocked.example"));
        assert_eq!(http.requests(), vec!["https://docs.example/llms.txt"]);
    }

    #[tokio::test]
    async fn test_local_source_by_name_only() {
        let dir = tempdir().unwrap();
        let configured = dir.path().join("llms.txt");
        let other = dir.path().join("secret.txt");
        fs::write(&configured, "# Local docs").unwrap();
        fs::write(&other, "secret").unwrap();

        let fetcher = fetcher(
            vec![SourceEntry::new(Some("Local"), configured.to_str().unwrap())],
            &["*"],
        );

        let by_name = fetcher.fetch_docs("Local", None).await.unwrap();
        assert_eq!(by_name.content, "# Local docs");

        let by_path = fetcher.fetch_docs(configured.to_str().unwrap(), None).await.unwrap();
        assert_eq!(by_path.content, "# Local docs");

        let err = fetcher.fetch_docs(other.to_str().unwrap(), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = fetcher.fetch_docs("NoSuchSource", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_missing_local_file_is_fetch_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone.txt");
        let fetcher = fetcher(
            vec![SourceEntry::new(Some("Gone"), missing.to_str().unwrap())],
            &[],
        );

        let err = fetcher.fetch_docs("Gone", None).await.unwrap_err();
        assert!(matches!(err, DocsFetchError::Io { .. }));
        assert_eq!(err.kind(), ErrorKind::FetchError);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/missing.txt")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = fetcher(
            vec![SourceEntry::new(Some("Docs"), &format!("{}/missing.txt", server.url()))],
            &[],
        );

        let err = fetcher.fetch_docs("Docs", None).await.unwrap_err();
        m.assert_async().await;
        assert!(matches!(err, DocsFetchError::HttpStatus { status, .. } if status == StatusCode::NOT_FOUND));
        assert_eq!(err.kind(), ErrorKind::FetchError);
    }

    #[tokio::test]
    async fn test_redirects() {
        let mut server = Server::new_async().await;
        let _old = server
            .mock("GET", "/old.txt")
            .with_status(302)
            .with_header("location", "/new.txt")
            .create_async()
            .await;
        let _new = server
            .mock("GET", "/new.txt")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("moved here")
            .create_async()
            .await;
        let _escape = server
            .mock("GET", "/escape.txt")
            .with_status(302)
            .with_header("location", "https://evil.example/payload.txt")
            .create_async()
            .await;
        let entries = || vec![SourceEntry::new(Some("Docs"), &format!("{}/old.txt", server.url()))];

        // not followed unless enabled
        let strict = fetcher(entries(), &[]);
        let err = strict.fetch_docs("Docs", None).await.unwrap_err();
        assert!(matches!(err, DocsFetchError::HttpStatus { status, .. } if status == StatusCode::FOUND));

        // an unfollowed redirect is a plain status error, whatever its target
        let err = strict
            .fetch_docs(&format!("{}/escape.txt", server.url()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DocsFetchError::HttpStatus { status, .. } if status == StatusCode::FOUND));
        assert_eq!(err.kind(), ErrorKind::FetchError);

        let following = DocsFetcher::new(config(entries(), &[], true)).unwrap();
        let result = following.fetch_docs("Docs", None).await.unwrap();
        assert_eq!(result.content, "moved here");

        let err = following
            .fetch_docs(&format!("{}/escape.txt", server.url()), None)
            .await
            .unwrap_err();
        assert!(matches!(&err, DocsFetchError::DomainNotAllowed { domain, .. } if domain == "evil.example"));
    }

    #[tokio::test]
    async fn test_html_and_meta_refresh() {
        let mut server = Server::new_async().await;
        let _index = server
            .mock("GET", "/index.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<html><head><meta http-equiv="refresh" content="0; url=/real.html"></head></html>"#)
            .create_async()
            .await;
        let _real = server
            .mock("GET", "/real.html")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><body><h2>Guide</h2><p>Read <a href=\"/a.txt\">this</a>.</p></body></html>")
            .create_async()
            .await;
        let _away = server
            .mock("GET", "/away.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<meta http-equiv="refresh" content="0; url=https://evil.example/">"#)
            .create_async()
            .await;

        let fetcher = fetcher(
            vec![SourceEntry::new(Some("Docs"), &format!("{}/index.html", server.url()))],
            &[],
        );

        let result = fetcher.fetch_docs("Docs", None).await.unwrap();
        assert_eq!(result.content, "## Guide\n\nRead [this](/a.txt).");

        let err = fetcher
            .fetch_docs(&format!("{}/away.html", server.url()), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DomainNotAllowed);
    }

    #[tokio::test]
    async fn test_timeout() {
        let http = Arc::new(RecordingClient {
            delay: Some(Duration::from_secs(5)),
            ..RecordingClient::default()
        });
        let fetcher = DocsFetcher::with_http_client(
            config(parse_url_entries(&["Slow:https://slow.example/llms.txt"]), &[], false),
            http,
        );

        let err = fetcher
            .fetch_docs("Slow", Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, DocsFetchError::Timeout { .. }));
        assert_eq!(err.kind(), ErrorKind::FetchError);
    }

    #[tokio::test]
    async fn test_listing_is_stable_across_fetches() {
        let http = Arc::new(RecordingClient::default());
        let fetcher = DocsFetcher::with_http_client(
            config(
                parse_url_entries(&[
                    "Zeta:https://z.example/llms.txt",
                    "Alpha:https://a.example/llms.txt",
                    "Mid:https://m.example/llms.txt",
                ]),
                &[],
                false,
            ),
            http,
        );

        let before = fetcher.list_doc_sources().to_vec();
        fetcher.fetch_docs("Alpha", None).await.unwrap();
        let _ = fetcher.fetch_docs("https://blocked.example/", None).await;
        let after = fetcher.list_doc_sources().to_vec();

        let names: Vec<_> = after.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
        assert_eq!(before, after);
    }

    #[test]
    fn test_error_contents_are_structured() {
        let err = DocsFetchError::DomainNotAllowed {
            domain: "example.com".to_string(),
            allowed: "docs.example".to_string(),
        };
        let contents = err.into_contents();
        let text = &contents[0].as_text().unwrap().text;
        let value: serde_json::Value = serde_json::from_str(text).unwrap();

        assert_eq!(value["kind"], "DomainNotAllowed");
        assert!(value["detail"].as_str().unwrap().contains("example.com"));
    }
}
