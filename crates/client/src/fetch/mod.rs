//! Network transport used by the caching worker.
//!
//! ### Semantics
//! - Every request is attempted exactly once: no retries, no backoff.
//! - Any HTTP status is a successful fetch; only transport failures are errors.
//! - No timeout unless one is configured.
//!
//! ### Response Types
//! - Same-origin responses are `basic`, everything else is `cors`.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, header};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub use self::url::{UrlError, host_matches, is_network_scheme, resolve, same_origin};

use shellcache_core::{Error, Request, Response, ResponseType};

/// Outbound network capability.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform `request` once. Resolves for any HTTP status; fails only when no response arrives.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Optional request timeout (default: none)
    pub timeout: Option<Duration>,

    /// Maximum number of redirects to follow (default: 20)
    pub max_redirects: usize,

    /// Origin used to tell `basic` from `cors` responses.
    pub origin: Option<::url::Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "shellcache/0.1".to_string(), timeout: None, max_redirects: 20, origin: None }
    }
}

/// reqwest-backed network transport.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn response_type(&self, url: &::url::Url) -> ResponseType {
        match &self.config.origin {
            Some(origin) if !same_origin(origin, url) => ResponseType::Cors,
            _ => ResponseType::Basic,
        }
    }
}

fn collect_headers(headers: &header::HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    out
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {e}", request.url)))?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = collect_headers(response.headers());

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {e}")))?;

        tracing::debug!(
            "fetched {} -> {} {} in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            response_type: self.response_type(&final_url),
            url: final_url.to_string(),
            headers,
            body,
        })
    }
}
