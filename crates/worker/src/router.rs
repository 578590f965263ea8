//! Request router and caching policy engine.
//!
//! ### Ignore Filter
//! - Non-http(s) schemes and excluded hosts pass through untouched.
//!
//! ### Navigation (network-first)
//! - Network response is returned immediately; a copy goes to the runtime
//!   bucket in the background.
//! - Offline: cached entry for the request, then the fallback document.
//!
//! ### Asset (cache-first)
//! - Cached entry wins with no network access.
//! - Miss: fetch; only status 200 non-error responses are stored.
//!
//! Background writes are best-effort: failures are logged, never returned.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use shellcache_client::{Network, host_matches, is_network_scheme};
use shellcache_core::{CacheStorage, Error, Request, Response, ResponseType};
use tokio::task::JoinSet;

use crate::policy::CachePolicy;

/// Deferred response produced by an intercepted request.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Result<Response, Error>> + Send + 'static>>;

/// Routing decision for one request.
pub enum Route {
    /// Let the host perform the request untouched.
    PassThrough,
    /// The worker answers the request.
    Intercept(ResponseFuture),
}

impl Route {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Route::PassThrough)
    }
}

/// How a request is classified before a strategy is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Ignored,
    Navigation,
    Asset,
}

struct RouterInner {
    policy: Arc<CachePolicy>,
    store: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    writes: Mutex<JoinSet<()>>,
}

/// Policy engine for the active generation. Cloning shares state.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn new(policy: Arc<CachePolicy>, store: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self { inner: Arc::new(RouterInner { policy, store, network, writes: Mutex::new(JoinSet::new()) }) }
    }

    pub fn classify(&self, request: &Request) -> RequestKind {
        if !is_network_scheme(&request.url) || host_matches(&request.url, &self.inner.policy.excluded_hosts) {
            RequestKind::Ignored
        } else if request.accepts_html() {
            RequestKind::Navigation
        } else {
            RequestKind::Asset
        }
    }

    /// Decide how to answer `request`.
    pub fn route(&self, request: Request) -> Route {
        let kind = self.classify(&request);
        tracing::debug!(url = %request.url, ?kind, "routing request");

        match kind {
            RequestKind::Ignored => Route::PassThrough,
            RequestKind::Navigation => Route::Intercept(Box::pin(self.clone().network_first(request))),
            RequestKind::Asset => Route::Intercept(Box::pin(self.clone().cache_first(request))),
        }
    }

    async fn network_first(self, request: Request) -> Result<Response, Error> {
        let fetched = self.inner.network.fetch(&request).await;
        let network_err = match fetched {
            Ok(response) => {
                self.store_in_background(request, response.clone());
                return Ok(response);
            }
            Err(err) => err,
        };

        tracing::debug!(url = %request.url, error = %network_err, "navigation offline, falling back to cache");

        if let Some(cached) = self.inner.store.match_any(&request).await? {
            return Ok(cached);
        }

        let fallback = Request::get(self.inner.policy.offline_fallback.clone());
        match self.inner.store.match_any(&fallback).await? {
            Some(shell) => Ok(shell),
            None => Err(Error::OfflineNoFallback(format!("{}: {network_err}", request.url))),
        }
    }

    async fn cache_first(self, request: Request) -> Result<Response, Error> {
        if let Some(cached) = self.inner.store.match_any(&request).await? {
            tracing::debug!(url = %request.url, "cache hit");
            return Ok(cached);
        }

        let response = self.inner.network.fetch(&request).await?;

        if response.status != 200 || response.response_type == ResponseType::Error {
            tracing::debug!(url = %request.url, status = response.status, "not caching response");
            return Ok(response);
        }

        self.store_in_background(request, response.clone());
        Ok(response)
    }

    /// Queue a runtime-bucket write without holding up the caller.
    fn store_in_background(&self, request: Request, response: Response) {
        let store = self.inner.store.clone();
        let bucket = self.inner.policy.runtime_cache.clone();

        let mut writes = self.inner.writes.lock().unwrap_or_else(PoisonError::into_inner);
        while writes.try_join_next().is_some() {}
        writes.spawn(async move {
            if let Err(err) = store.put(&bucket, &request, &response).await {
                tracing::warn!(url = %request.url, bucket = %bucket, error = %err, "runtime cache write failed");
            }
        });
    }

    /// Wait for every background write queued so far to finish.
    ///
    /// Writes queued while this drains are left for the next flush.
    pub async fn flush(&self) {
        let mut writes = std::mem::take(&mut *self.inner.writes.lock().unwrap_or_else(PoisonError::into_inner));
        while let Some(result) = writes.join_next().await {
            if let Err(err) = result {
                tracing::warn!(error = %err, "runtime cache write task panicked");
            }
        }
    }
}
