//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the application is served from. Root-relative manifest
    /// entries and the offline fallback resolve against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Name of the static (pre-populated) bucket for this generation.
    #[serde(default = "default_static_cache")]
    pub static_cache: String,

    /// Name of the runtime bucket for this generation.
    #[serde(default = "default_runtime_cache")]
    pub runtime_cache: String,

    /// Static manifest fetched at install time, in order.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Hostname substrings that are never intercepted.
    ///
    /// Set via SHELLCACHE_EXCLUDED_HOSTS environment variable.
    #[serde(default = "default_excluded_hosts")]
    pub excluded_hosts: Vec<String>,

    /// Document served to navigations when offline and uncached.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,

    /// Whether a successful install promotes the new generation at once.
    ///
    /// When false the generation waits until its clients are released or a
    /// client posts `{"type": "SKIP_WAITING"}`.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Optional transport timeout in milliseconds. Unset means no timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_static_cache() -> String {
    "static-v1".into()
}

fn default_runtime_cache() -> String {
    "runtime-v1".into()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/reserver.html",
        "/logo.svg",
        "/photo/front.jpg",
        "/photo/angle.jpg",
        "/photo/side.jpg",
        "/manifest.json",
        "https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700&display=swap",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_excluded_hosts() -> Vec<String> {
    ["googleapis.com", "maps.googleapis.com", "googletagmanager.com", "project-osrm.org", "wa.me"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_offline_fallback() -> String {
    "/index.html".into()
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            static_cache: default_static_cache(),
            runtime_cache: default_runtime_cache(),
            precache: default_precache(),
            excluded_hosts: default_excluded_hosts(),
            offline_fallback: default_offline_fallback(),
            skip_waiting_on_install: true,
            user_agent: default_user_agent(),
            timeout_ms: None,
        }
    }
}

impl AppConfig {
    /// Transport timeout as Duration, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The layered figment used by [`AppConfig::load`].
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Extract and validate a configuration from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
