//! Network transport for shellcache.
//!
//! This crate provides the `Network` seam the caching worker fetches through,
//! its reqwest implementation, and URL helpers shared by routing and install.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network, UrlError, host_matches, is_network_scheme, resolve, same_origin};
