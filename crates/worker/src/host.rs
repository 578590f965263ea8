//! Minimal in-process host runtime.
//!
//! Tracks the active and waiting generations and the open clients, and
//! decides when a newly installed generation takes over:
//!
//! - immediately if nothing is active, the generation asked to skip waiting,
//!   or the active generation controls no clients;
//! - otherwise after the last client of the active generation is released,
//!   or when a client posts `SKIP_WAITING`.
//!
//! A failed install leaves the current active generation untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use shellcache_client::Network;
use shellcache_core::{CacheStorage, Error, Request, Response};
use tokio::sync::RwLock;

use crate::lifecycle::{ActivationReport, LifecycleState};
use crate::worker::{Event, EventOutcome, Worker};

pub type GenerationId = u64;
pub type ClientId = u64;

#[derive(Clone)]
struct Generation {
    id: GenerationId,
    worker: Arc<Worker>,
}

#[derive(Default)]
struct HostState {
    active: Option<Generation>,
    waiting: Option<Generation>,
    clients: BTreeMap<ClientId, Option<GenerationId>>,
    next_generation: GenerationId,
    next_client: ClientId,
}

impl HostState {
    fn active_has_clients(&self) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        self.clients.values().any(|controller| *controller == Some(active.id))
    }
}

/// What happened to a registered generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RegisterOutcome {
    Activated { generation: GenerationId, report: ActivationReport },
    Waiting { generation: GenerationId },
}

/// Point-in-time view of the registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatus {
    pub active: Option<GenerationStatus>,
    pub waiting: Option<GenerationStatus>,
    pub clients: BTreeMap<ClientId, Option<GenerationId>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationStatus {
    pub generation: GenerationId,
    pub state: LifecycleState,
    pub static_cache: String,
    pub runtime_cache: String,
}

/// Host for a sequence of worker generations sharing one store and network.
pub struct Registration {
    store: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: RwLock<HostState>,
}

impl Registration {
    pub fn new(store: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self { store, network, state: RwLock::new(HostState::default()) }
    }

    pub fn store(&self) -> Arc<dyn CacheStorage> {
        self.store.clone()
    }

    pub fn network(&self) -> Arc<dyn Network> {
        self.network.clone()
    }

    /// Install `worker` and, when allowed, activate it.
    ///
    /// # Errors
    ///
    /// Returns the install error; the previous active generation keeps serving.
    pub async fn register(&self, worker: Worker) -> Result<RegisterOutcome, Error> {
        let id = {
            let mut state = self.state.write().await;
            state.next_generation += 1;
            state.next_generation
        };
        let generation = Generation { id, worker: Arc::new(worker) };

        if let Err(err) = generation.worker.handle(Event::Install).await {
            tracing::error!(generation = id, error = %err, "generation failed to install");
            return Err(err);
        }

        let promote_now = {
            let state = self.state.read().await;
            state.active.is_none()
                || generation.worker.lifecycle().skip_waiting_requested()
                || !state.active_has_clients()
        };

        if promote_now {
            let report = self.promote(generation).await?;
            return Ok(RegisterOutcome::Activated { generation: id, report });
        }

        let displaced = self.state.write().await.waiting.replace(generation);
        if let Some(old) = displaced {
            old.worker.lifecycle().mark_redundant().await;
        }
        tracing::info!(generation = id, "generation installed, waiting for clients to release");
        Ok(RegisterOutcome::Waiting { generation: id })
    }

    /// Activate `generation`, retire the previous one, and claim every client.
    async fn promote(&self, generation: Generation) -> Result<ActivationReport, Error> {
        let report = match generation.worker.handle(Event::Activate).await? {
            EventOutcome::Activated(report) => report,
            _ => ActivationReport::default(),
        };

        let (previous, superseded) = {
            let mut state = self.state.write().await;
            let superseded = state.waiting.take().filter(|w| w.id != generation.id);
            if generation.worker.lifecycle().has_claimed() {
                for controller in state.clients.values_mut() {
                    *controller = Some(generation.id);
                }
            }
            (state.active.replace(generation.clone()), superseded)
        };

        if let Some(superseded) = superseded {
            tracing::info!(generation = superseded.id, by = generation.id, "waiting generation superseded");
            superseded.worker.lifecycle().mark_redundant().await;
        }

        if let Some(previous) = previous {
            previous.worker.lifecycle().mark_redundant().await;
            previous.worker.router().flush().await;
        }

        tracing::info!(generation = generation.id, "generation active");
        Ok(report)
    }

    async fn promote_waiting(&self) -> Result<Option<ActivationReport>, Error> {
        let waiting = self.state.read().await.waiting.clone();
        match waiting {
            Some(generation) if generation.worker.state().await == LifecycleState::Installed => {
                Ok(Some(self.promote(generation).await?))
            }
            _ => Ok(None),
        }
    }

    /// Deliver a client message to the waiting generation, or the active one if none waits.
    ///
    /// A `SKIP_WAITING` received by the waiting generation promotes it at once.
    pub async fn post_message(&self, payload: serde_json::Value) -> Result<EventOutcome, Error> {
        let (target, is_waiting) = {
            let state = self.state.read().await;
            match (&state.waiting, &state.active) {
                (Some(waiting), _) => (Some(waiting.clone()), true),
                (None, Some(active)) => (Some(active.clone()), false),
                (None, None) => (None, false),
            }
        };

        let Some(target) = target else {
            return Ok(EventOutcome::Ignored);
        };

        let outcome = target.worker.handle(Event::Message(payload)).await?;
        if is_waiting && matches!(outcome, EventOutcome::SkipWaiting) {
            self.promote_waiting().await?;
        }
        Ok(outcome)
    }

    /// Open a browsing context, controlled by the active generation if there is one.
    pub async fn connect_client(&self) -> ClientId {
        let mut state = self.state.write().await;
        state.next_client += 1;
        let id = state.next_client;
        let controller = state.active.as_ref().map(|g| g.id);
        state.clients.insert(id, controller);
        id
    }

    /// Close a browsing context. Releasing the last client of the active
    /// generation lets a waiting generation take over.
    pub async fn release_client(&self, client: ClientId) -> Result<bool, Error> {
        let ready = {
            let mut state = self.state.write().await;
            if state.clients.remove(&client).is_none() {
                return Ok(false);
            }
            state.waiting.is_some() && !state.active_has_clients()
        };

        if ready {
            self.promote_waiting().await?;
        }
        Ok(true)
    }

    /// Dispatch a request to the active generation; pass-through and
    /// uncontrolled requests go straight to the network.
    pub async fn fetch(&self, request: Request) -> Result<Response, Error> {
        let active = self.state.read().await.active.clone();

        let Some(active) = active else {
            return self.network.fetch(&request).await;
        };

        match active.worker.handle(Event::Fetch(request.clone())).await? {
            EventOutcome::Response(response) => Ok(response),
            _ => self.network.fetch(&request).await,
        }
    }

    /// Wait for background cache writes of the active generation.
    pub async fn flush(&self) {
        let active = self.state.read().await.active.clone();
        if let Some(active) = active {
            active.worker.router().flush().await;
        }
    }

    pub async fn status(&self) -> RegistrationStatus {
        let (active, waiting, clients) = {
            let state = self.state.read().await;
            (state.active.clone(), state.waiting.clone(), state.clients.clone())
        };

        RegistrationStatus {
            active: match active {
                Some(g) => Some(generation_status(&g).await),
                None => None,
            },
            waiting: match waiting {
                Some(g) => Some(generation_status(&g).await),
                None => None,
            },
            clients,
        }
    }
}

async fn generation_status(generation: &Generation) -> GenerationStatus {
    let policy = generation.worker.policy();
    GenerationStatus {
        generation: generation.id,
        state: generation.worker.state().await,
        static_cache: policy.static_cache.clone(),
        runtime_cache: policy.runtime_cache.clone(),
    }
}
