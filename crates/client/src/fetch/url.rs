//! URL helpers for routing decisions and manifest resolution.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// True for schemes that go over the network transport (`http`, `https`).
pub fn is_network_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// True when the URL's host contains any of `hosts` as a substring.
///
/// Matching is plain substring containment, so `googleapis.com` also covers
/// `maps.googleapis.com` and `fonts.googleapis.com`.
pub fn host_matches(url: &Url, hosts: &[String]) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    hosts.iter().any(|entry| host.contains(entry.as_str()))
}

/// Resolve a manifest entry (root-relative path or absolute URL) against `origin`.
///
/// Entries are taken exactly as configured: no wildcard expansion, query kept.
pub fn resolve(origin: &Url, entry: &str) -> Result<Url, UrlError> {
    let trimmed = entry.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let resolved = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if !is_network_scheme(&resolved) {
        return Err(UrlError::UnsupportedScheme(resolved.scheme().to_string()));
    }

    Ok(resolved)
}

/// True when both URLs share scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://app.test/").unwrap()
    }

    #[test]
    fn test_network_scheme() {
        assert!(is_network_scheme(&Url::parse("http://app.test/").unwrap()));
        assert!(is_network_scheme(&Url::parse("https://app.test/").unwrap()));
        assert!(!is_network_scheme(&Url::parse("chrome-extension://abc/x.js").unwrap()));
        assert!(!is_network_scheme(&Url::parse("data:text/plain,hi").unwrap()));
    }

    #[test]
    fn test_host_matches_substring() {
        let hosts = vec!["googleapis.com".to_string(), "wa.me".to_string()];
        assert!(host_matches(&Url::parse("https://maps.googleapis.com/maps/api/js").unwrap(), &hosts));
        assert!(host_matches(&Url::parse("https://wa.me/33600000000").unwrap(), &hosts));
        assert!(!host_matches(&Url::parse("https://app.test/index.html").unwrap(), &hosts));
    }

    #[test]
    fn test_host_matches_empty_list() {
        assert!(!host_matches(&Url::parse("https://app.test/").unwrap(), &[]));
    }

    #[test]
    fn test_resolve_root_relative() {
        let url = resolve(&origin(), "/photo/front.jpg").unwrap();
        assert_eq!(url.as_str(), "https://app.test/photo/front.jpg");
        assert_eq!(resolve(&origin(), "/").unwrap().as_str(), "https://app.test/");
    }

    #[test]
    fn test_resolve_absolute_keeps_query() {
        let url = resolve(&origin(), "https://fonts.googleapis.com/css2?family=Inter&display=swap").unwrap();
        assert_eq!(url.host_str(), Some("fonts.googleapis.com"));
        assert_eq!(url.query(), Some("family=Inter&display=swap"));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&origin(), "  "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve(&origin(), "file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_same_origin() {
        let a = Url::parse("https://app.test/a").unwrap();
        assert!(same_origin(&a, &Url::parse("https://app.test/b?x=1").unwrap()));
        assert!(!same_origin(&a, &Url::parse("http://app.test/a").unwrap()));
        assert!(!same_origin(&a, &Url::parse("https://cdn.app.test/a").unwrap()));
    }
}
