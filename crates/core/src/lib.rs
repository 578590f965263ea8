//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Request and response snapshot types
//! - Cache generation store with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStorage};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Request, Response, ResponseType};
