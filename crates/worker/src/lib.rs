//! Offline caching agent for a single-origin web app.
//!
//! A [`Worker`] is one deployed generation: it precaches the app shell on
//! install, deletes stale buckets on activate, and routes every request
//! through a network-first (navigation) or cache-first (asset) strategy.
//! [`Registration`] plays the host runtime that sequences generations and
//! tracks open clients.

pub mod commands;
pub mod host;
pub mod lifecycle;
pub mod policy;
pub mod router;
pub mod worker;

#[cfg(test)]
mod testing;

pub use host::{ClientId, GenerationId, RegisterOutcome, Registration, RegistrationStatus};
pub use lifecycle::{ActivationReport, Lifecycle, LifecycleState};
pub use policy::CachePolicy;
pub use router::{RequestKind, Route, Router};
pub use worker::{ClientMessage, Event, EventOutcome, Worker};
