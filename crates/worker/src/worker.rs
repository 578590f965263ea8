//! Event dispatch for one worker generation.
//!
//! The host hands every lifecycle and request event to [`Worker::handle`] and
//! awaits the returned future; completion of that future is the event's
//! deferred-completion signal.

use std::sync::Arc;

use serde::Deserialize;
use shellcache_client::Network;
use shellcache_core::{CacheStorage, Error, Request, Response};

use crate::lifecycle::{ActivationReport, Lifecycle, LifecycleState};
use crate::policy::CachePolicy;
use crate::router::{Route, Router};

/// Events delivered by the host runtime.
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Message(serde_json::Value),
}

/// Result of handling one event.
#[derive(Debug)]
pub enum EventOutcome {
    /// Install finished successfully.
    Installed,
    /// Activation finished; stale buckets were cleaned.
    Activated(ActivationReport),
    /// The worker answered a fetch.
    Response(Response),
    /// The host should perform the fetch itself.
    PassThrough,
    /// A client asked this generation to activate without waiting.
    SkipWaiting,
    /// The message was not recognized.
    Ignored,
}

/// Messages clients may post to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
}

impl ClientMessage {
    /// Parse a message payload; anything unrecognized yields `None`.
    pub fn parse(payload: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }
}

/// One deployed generation: its lifecycle manager and policy engine.
pub struct Worker {
    policy: Arc<CachePolicy>,
    lifecycle: Lifecycle,
    router: Router,
}

impl Worker {
    pub fn new(policy: CachePolicy, store: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        let policy = Arc::new(policy);
        Self {
            lifecycle: Lifecycle::new(policy.clone(), store.clone(), network.clone()),
            router: Router::new(policy.clone(), store, network),
            policy,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    /// Handle one event to completion.
    pub async fn handle(&self, event: Event) -> Result<EventOutcome, Error> {
        match event {
            Event::Install => {
                self.lifecycle.install().await?;
                Ok(EventOutcome::Installed)
            }
            Event::Activate => Ok(EventOutcome::Activated(self.lifecycle.activate().await?)),
            Event::Fetch(request) => match self.router.route(request) {
                Route::PassThrough => Ok(EventOutcome::PassThrough),
                Route::Intercept(response) => Ok(EventOutcome::Response(response.await?)),
            },
            Event::Message(payload) => match ClientMessage::parse(&payload) {
                Some(ClientMessage::SkipWaiting) => {
                    tracing::info!(bucket = %self.policy.static_cache, "client requested skip waiting");
                    self.lifecycle.skip_waiting().await;
                    Ok(EventOutcome::SkipWaiting)
                }
                None => {
                    tracing::debug!(%payload, "ignoring unrecognized message");
                    Ok(EventOutcome::Ignored)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockNetwork, asset, policy, url};
    use serde_json::json;
    use shellcache_core::CacheDb;

    async fn setup() -> (Worker, Arc<MockNetwork>) {
        let store = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(MockNetwork::new());
        network.ok(&url("/"), "root");
        network.ok(&url("/index.html"), "<html>");
        let mut policy = policy("v1", &["/", "/index.html"]);
        policy.skip_waiting_on_install = false;
        (Worker::new(policy, store, network.clone()), network)
    }

    #[test]
    fn test_parse_skip_waiting() {
        assert_eq!(ClientMessage::parse(&json!({"type": "SKIP_WAITING"})), Some(ClientMessage::SkipWaiting));
    }

    #[test]
    fn test_parse_unrecognized() {
        for payload in [json!({"type": "CLAIM"}), json!({}), json!("SKIP_WAITING"), json!(null), json!([1, 2])] {
            assert_eq!(ClientMessage::parse(&payload), None);
        }
    }

    #[tokio::test]
    async fn test_unknown_message_ignored() {
        let (worker, _network) = setup().await;
        let outcome = worker.handle(Event::Message(json!({"type": "PING"}))).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Ignored));
        assert!(!worker.lifecycle().skip_waiting_requested());
    }

    #[tokio::test]
    async fn test_full_lifecycle_through_events() {
        let (worker, _network) = setup().await;

        assert!(matches!(worker.handle(Event::Install).await.unwrap(), EventOutcome::Installed));
        assert_eq!(worker.state().await, LifecycleState::Installed);

        let outcome = worker.handle(Event::Message(json!({"type": "SKIP_WAITING"}))).await.unwrap();
        assert!(matches!(outcome, EventOutcome::SkipWaiting));
        assert!(worker.lifecycle().skip_waiting_requested());

        assert!(matches!(worker.handle(Event::Activate).await.unwrap(), EventOutcome::Activated(_)));
        assert_eq!(worker.state().await, LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_fetch_event_serves_precached_asset() {
        let (worker, network) = setup().await;
        worker.handle(Event::Install).await.unwrap();
        worker.handle(Event::Activate).await.unwrap();
        let calls_after_install = network.calls().len();

        let outcome = worker.handle(Event::Fetch(asset("/index.html"))).await.unwrap();
        match outcome {
            EventOutcome::Response(response) => assert_eq!(&response.body[..], b"<html>"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(network.calls().len(), calls_after_install);
    }

    #[tokio::test]
    async fn test_fetch_event_pass_through() {
        let (worker, _network) = setup().await;
        let request = Request::parse("https://wa.me/33600000000").unwrap();
        let outcome = worker.handle(Event::Fetch(request)).await.unwrap();
        assert!(matches!(outcome, EventOutcome::PassThrough));
    }
}
