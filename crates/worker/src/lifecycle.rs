//! Generation lifecycle: install, activate, skip-waiting.
//!
//! ### Install
//! - Opens the static bucket and fetches every manifest URL concurrently.
//! - All or nothing: the first failed fetch or non-ok status cancels the rest
//!   and nothing is written.
//! - Commits the whole manifest in one store transaction.
//!
//! ### Activate
//! - Deletes every bucket that is neither the current static nor runtime bucket.
//! - Claims open clients.
//!
//! State machine: `installing → installed → activating → active`, with
//! `redundant` for failed installs and displaced generations.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use shellcache_client::Network;
use shellcache_core::{CacheStorage, Error, Request, Response};
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::policy::CachePolicy;

/// Where a generation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// What activation cleaned up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// Stale buckets that were deleted.
    pub deleted: Vec<String>,
    /// Stale buckets whose deletion failed.
    pub failed: Vec<String>,
}

/// Lifecycle manager for one generation.
pub struct Lifecycle {
    policy: Arc<CachePolicy>,
    store: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: RwLock<LifecycleState>,
    install_started: AtomicBool,
    skip_waiting: AtomicBool,
    claimed: AtomicBool,
}

impl Lifecycle {
    pub fn new(policy: Arc<CachePolicy>, store: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            policy,
            store,
            network,
            state: RwLock::new(LifecycleState::Installing),
            install_started: AtomicBool::new(false),
            skip_waiting: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    /// True once install succeeded with skip-waiting or a client asked to skip waiting.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// True once activation has claimed the open clients.
    pub fn has_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    /// Ask to be promoted without waiting for the previous generation's clients.
    ///
    /// Returns true when the generation is installed and can be promoted now.
    /// Ignored once the generation is activating, active or redundant.
    pub async fn skip_waiting(&self) -> bool {
        let state = self.state.read().await;
        match *state {
            LifecycleState::Installing => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                false
            }
            LifecycleState::Installed => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    /// Move from `from` to `to`, failing if the current state differs.
    async fn transition(&self, action: &'static str, from: LifecycleState, to: LifecycleState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::InvalidState { action, state: state.to_string() });
        }
        *state = to;
        Ok(())
    }

    /// Pre-populate the static bucket from the manifest.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` wrapping the first fetch or store failure;
    /// the generation becomes redundant.
    pub async fn install(&self) -> Result<(), Error> {
        {
            let state = self.state.write().await;
            if *state != LifecycleState::Installing || self.install_started.swap(true, Ordering::SeqCst) {
                return Err(Error::InvalidState { action: "install", state: state.to_string() });
            }
        }

        tracing::info!(bucket = %self.policy.static_cache, entries = self.policy.manifest.len(), "installing");

        match self.precache().await {
            Ok(()) => {
                self.transition("install", LifecycleState::Installing, LifecycleState::Installed)
                    .await?;
                if self.policy.skip_waiting_on_install {
                    self.skip_waiting.store(true, Ordering::SeqCst);
                }
                tracing::info!(bucket = %self.policy.static_cache, "install complete");
                Ok(())
            }
            Err(err) => {
                *self.state.write().await = LifecycleState::Redundant;
                tracing::error!(error = %err, "install failed");
                Err(Error::InstallFailed(Box::new(err)))
            }
        }
    }

    async fn precache(&self) -> Result<(), Error> {
        self.store.open(&self.policy.static_cache).await?;

        let mut join_set = JoinSet::new();
        for (index, url) in self.policy.manifest.iter().enumerate() {
            let network = self.network.clone();
            let request = Request::get(url.clone());
            join_set.spawn(async move {
                let result = network.fetch(&request).await;
                (index, request, result)
            });
        }

        let mut fetched: Vec<Option<(Request, Response)>> = vec![None; self.policy.manifest.len()];

        while let Some(joined) = join_set.join_next().await {
            let outcome = match joined {
                Ok((index, request, Ok(response))) if response.ok() => {
                    fetched[index] = Some((request, response));
                    Ok(())
                }
                Ok((_, request, Ok(response))) => {
                    Err(Error::HttpStatus { url: request.url.to_string(), status: response.status })
                }
                Ok((_, _, Err(err))) => Err(err),
                Err(join_err) => Err(Error::Network(format!("manifest fetch task failed: {join_err}"))),
            };

            if let Err(err) = outcome {
                join_set.shutdown().await;
                return Err(err);
            }
        }

        let entries: Vec<(Request, Response)> = fetched.into_iter().flatten().collect();
        self.store.put_all(&self.policy.static_cache, entries).await
    }

    /// Delete stale buckets and claim clients.
    ///
    /// Deletion failures are logged and reported but do not stop activation.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.transition("activate", LifecycleState::Installed, LifecycleState::Activating)
            .await?;
        tracing::info!(static_cache = %self.policy.static_cache, runtime_cache = %self.policy.runtime_cache, "activating");

        let mut report = ActivationReport::default();
        match self.store.keys().await {
            Ok(names) => {
                for name in names.into_iter().filter(|n| !self.policy.is_current(n)) {
                    match self.store.delete(&name).await {
                        Ok(_) => {
                            tracing::info!(bucket = %name, "deleted stale cache");
                            report.deleted.push(name);
                        }
                        Err(err) => {
                            tracing::warn!(bucket = %name, error = %err, "failed to delete stale cache");
                            report.failed.push(name);
                        }
                    }
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to enumerate caches"),
        }

        self.claimed.store(true, Ordering::SeqCst);
        *self.state.write().await = LifecycleState::Active;
        tracing::info!("activation complete");
        Ok(report)
    }

    /// Retire this generation after a newer one took over or its install failed.
    pub async fn mark_redundant(&self) {
        *self.state.write().await = LifecycleState::Redundant;
    }
}
