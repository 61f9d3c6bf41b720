//! HTTP client seam used by the fetcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderName, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::allowlist::DomainAllowlist;
use crate::config::FetchSettings;
use crate::docs_fetcher::DocsFetchError;

pub const MAX_REDIRECTS: usize = 10;

/// The parts of an HTTP response the fetcher cares about.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// URL of the final response, after any followed redirects.
    pub url: Url,
    pub status: StatusCode,
    pub location: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<HttpResponse, DocsFetchError>;
}

/// [`HttpClient`] backed by reqwest.
///
/// Redirects are followed only when enabled, and only towards hosts the
/// allowlist permits. A redirect to any other host stops the chain and the
/// 3xx response is handed back to the caller.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(settings: &FetchSettings, allowlist: DomainAllowlist) -> Result<Self, reqwest::Error> {
        let follow_redirects = settings.follow_redirects;
        let policy = Policy::custom(move |attempt| {
            if !follow_redirects {
                attempt.stop()
            } else if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if allowlist.permits(attempt.url()) {
                attempt.follow()
            } else {
                tracing::warn!("Refusing redirect to disallowed URL {}", attempt.url());
                attempt.stop()
            }
        });

        let client = Client::builder()
            .redirect(policy)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<HttpResponse, DocsFetchError> {
        let map_err = |err: reqwest::Error| {
            if err.is_timeout() {
                DocsFetchError::Timeout {
                    target: url.to_string(),
                    timeout,
                }
            } else {
                DocsFetchError::RequestError(err)
            }
        };

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(map_err)?;

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let location = header(LOCATION);
        let content_type = header(CONTENT_TYPE);
        let status = response.status();
        let final_url = response.url().clone();
        let body = response.text().await.map_err(map_err)?;

        Ok(HttpResponse {
            url: final_url,
            status,
            location,
            content_type,
            body,
        })
    }
}
