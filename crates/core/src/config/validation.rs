//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;
use url::Url;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { field: field.into(), reason: reason.into() }
    }
}

impl AppConfig {
    /// Parse the configured origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin does not parse or is not http(s).
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin).map_err(|e| ConfigError::invalid("origin", e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::invalid("origin", format!("unsupported scheme: {scheme}"))),
        }
    }

    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - a bucket name is empty or both bucket names are equal
    /// - `origin` is not an http(s) URL
    /// - a manifest entry or the offline fallback does not resolve against the origin
    /// - `user_agent` is empty
    /// - `timeout_ms` is set below 100ms
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.static_cache.trim().is_empty() {
            return Err(ConfigError::invalid("static_cache", "must not be empty"));
        }
        if self.runtime_cache.trim().is_empty() {
            return Err(ConfigError::invalid("runtime_cache", "must not be empty"));
        }
        if self.static_cache == self.runtime_cache {
            return Err(ConfigError::invalid("static_cache", "must differ from runtime_cache"));
        }

        let origin = self.origin_url()?;

        for entry in &self.precache {
            origin
                .join(entry)
                .map_err(|e| ConfigError::invalid("precache", format!("{entry}: {e}")))?;
        }

        if self.offline_fallback.is_empty() {
            return Err(ConfigError::invalid("offline_fallback", "must not be empty"));
        }
        origin
            .join(&self.offline_fallback)
            .map_err(|e| ConfigError::invalid("offline_fallback", e.to_string()))?;

        if self.user_agent.is_empty() {
            return Err(ConfigError::invalid("user_agent", "must not be empty"));
        }

        if let Some(ms) = self.timeout_ms
            && ms < 100
        {
            return Err(ConfigError::invalid("timeout_ms", "must be at least 100ms"));
        }

        if self.excluded_hosts.iter().any(|h| h.is_empty()) {
            tracing::warn!("excluded_hosts contains an empty entry, which matches every host");
        }

        Ok(())
    }
}
