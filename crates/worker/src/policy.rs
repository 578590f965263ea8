//! Resolved caching policy injected into a worker generation.

use shellcache_client::resolve;
use shellcache_core::{AppConfig, ConfigError};
use url::Url;

/// Everything a generation needs to know about its caches, built once per deployment.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Bucket pre-populated at install.
    pub static_cache: String,
    /// Bucket filled while serving requests.
    pub runtime_cache: String,
    /// Static manifest, resolved and in configured order.
    pub manifest: Vec<Url>,
    /// Hostname substrings that are never intercepted.
    pub excluded_hosts: Vec<String>,
    /// Document served to offline navigations with no cached entry.
    pub offline_fallback: Url,
    /// Promote as soon as install succeeds.
    pub skip_waiting_on_install: bool,
}

impl CachePolicy {
    /// Resolve manifest entries and the fallback document against the configured origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin or any entry does not resolve.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let origin = config.origin_url()?;

        let manifest = config
            .precache
            .iter()
            .map(|entry| {
                resolve(&origin, entry).map_err(|e| ConfigError::Invalid {
                    field: "precache".into(),
                    reason: format!("{entry}: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let offline_fallback = resolve(&origin, &config.offline_fallback)
            .map_err(|e| ConfigError::Invalid { field: "offline_fallback".into(), reason: e.to_string() })?;

        Ok(Self {
            static_cache: config.static_cache.clone(),
            runtime_cache: config.runtime_cache.clone(),
            manifest,
            excluded_hosts: config.excluded_hosts.clone(),
            offline_fallback,
            skip_waiting_on_install: config.skip_waiting_on_install,
        })
    }

    /// True for the two bucket names owned by this generation.
    pub fn is_current(&self, bucket: &str) -> bool {
        bucket == self.static_cache || bucket == self.runtime_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config() {
        let policy = CachePolicy::from_config(&AppConfig::default()).unwrap();
        assert_eq!(policy.static_cache, "static-v1");
        assert_eq!(policy.runtime_cache, "runtime-v1");
        assert_eq!(policy.manifest.len(), 9);
        assert_eq!(policy.manifest[0].as_str(), "http://localhost:8080/");
        assert_eq!(policy.manifest[1].as_str(), "http://localhost:8080/index.html");
        assert_eq!(policy.manifest[8].host_str(), Some("fonts.googleapis.com"));
        assert_eq!(policy.offline_fallback.as_str(), "http://localhost:8080/index.html");
        assert!(policy.skip_waiting_on_install);
    }

    #[test]
    fn test_is_current() {
        let policy = CachePolicy::from_config(&AppConfig::default()).unwrap();
        assert!(policy.is_current("static-v1"));
        assert!(policy.is_current("runtime-v1"));
        assert!(!policy.is_current("static-v0"));
        assert!(!policy.is_current("runtime-v1-old"));
    }

    #[test]
    fn test_two_configurations_side_by_side() {
        let v1 = CachePolicy::from_config(&AppConfig::default()).unwrap();
        let v2 = CachePolicy::from_config(&AppConfig {
            static_cache: "static-v2".into(),
            runtime_cache: "runtime-v2".into(),
            origin: "https://app.test/".into(),
            ..Default::default()
        })
        .unwrap();
        assert!(!v2.is_current(&v1.static_cache));
        assert_eq!(v2.offline_fallback.as_str(), "https://app.test/index.html");
    }

    #[test]
    fn test_rejects_bad_manifest_entry() {
        let config = AppConfig { precache: vec!["mailto:someone@example.com".into()], ..Default::default() };
        let result = CachePolicy::from_config(&config);
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "precache"));
    }
}
