//! Scripted network double and fixtures shared by the worker tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use shellcache_client::Network;
use shellcache_core::{AppConfig, Error, Request, Response};

use crate::policy::CachePolicy;

pub const ORIGIN: &str = "https://app.test/";

/// Network double: canned responses per URL, failures for everything else.
#[derive(Default)]
pub struct MockNetwork {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for `url`.
    pub fn respond(&self, url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    /// Serve a 200 with `body` for `url`.
    pub fn ok(&self, url: &str, body: &str) {
        self.respond(url, Response::new(url, 200, body.to_string()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every URL fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{url}: offline")));
        }
        let route = self.routes.lock().unwrap().get(&url).cloned();
        route.ok_or_else(|| Error::Network(format!("{url}: connection refused")))
    }
}

/// Policy for `https://app.test/` with the given manifest and bucket version.
pub fn policy(version: &str, manifest: &[&str]) -> CachePolicy {
    let config = AppConfig {
        origin: ORIGIN.into(),
        static_cache: format!("static-{version}"),
        runtime_cache: format!("runtime-{version}"),
        precache: manifest.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    CachePolicy::from_config(&config).unwrap()
}

pub fn url(path: &str) -> String {
    format!("https://app.test{path}")
}

pub fn navigation(path: &str) -> Request {
    Request::parse(&url(path))
        .unwrap()
        .with_header("accept", "text/html,application/xhtml+xml,*/*;q=0.8")
}

pub fn asset(path: &str) -> Request {
    Request::parse(&url(path)).unwrap().with_header("accept", "*/*")
}
