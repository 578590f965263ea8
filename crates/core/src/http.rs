//! Request and response snapshot types.
//!
//! These are the values that flow between the host, the policy engine, the
//! network transport, and the cache store. Header names are kept lowercase.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// An intercepted outgoing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub url: Url,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Request {
    /// Build a GET request for `url`.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, headers: BTreeMap::new() }
    }

    /// Parse `url` and build a GET request for it.
    pub fn parse(url: &str) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::get(url))
    }

    /// Set a header, replacing any previous value.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Replace the method.
    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// True when the request declares it accepts `text/html`.
    pub fn accepts_html(&self) -> bool {
        self.header("accept").is_some_and(|accept| accept.contains("text/html"))
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// How a response was obtained, mirroring the browser's response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    Basic,
    /// Cross-origin response with readable body.
    Cors,
    /// Cross-origin response without CORS; status and body are hidden.
    Opaque,
    /// Network error result.
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(ResponseType::Basic),
            "cors" => Some(ResponseType::Cors),
            "opaque" => Some(ResponseType::Opaque),
            "error" => Some(ResponseType::Error),
            _ => None,
        }
    }
}

/// An immutable response snapshot.
///
/// The body is reference counted, so `clone()` is how a copy for storage is
/// taken while the caller keeps its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    pub response_type: ResponseType,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Bytes,
}

impl Response {
    /// A basic response with the given status and body.
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status,
            status_text: String::new(),
            response_type: ResponseType::Basic,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// The network error result: status 0, empty body.
    pub fn error() -> Self {
        Self {
            url: String::new(),
            status: 0,
            status_text: String::new(),
            response_type: ResponseType::Error,
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Status in the 200-299 range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header names listed in `Vary`, lowercased.
    pub fn vary(&self) -> Vec<String> {
        self.header("vary")
            .map(|v| {
                v.split(',')
                    .map(|name| name.trim().to_ascii_lowercase())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_html() {
        let req = Request::parse("https://example.com/").unwrap().with_header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        );
        assert!(req.accepts_html());

        let req = Request::parse("https://example.com/app.js").unwrap().with_header("accept", "*/*");
        assert!(!req.accepts_html());

        let req = Request::parse("https://example.com/app.js").unwrap();
        assert!(!req.accepts_html());
    }

    #[test]
    fn test_header_case_insensitive() {
        let req = Request::parse("https://example.com/").unwrap().with_header("X-Custom", "1");
        assert_eq!(req.header("x-custom"), Some("1"));
        assert_eq!(req.header("X-CUSTOM"), Some("1"));
    }

    #[test]
    fn test_response_ok_range() {
        assert!(Response::new("/", 200, "").ok());
        assert!(Response::new("/", 204, "").ok());
        assert!(!Response::new("/", 304, "").ok());
        assert!(!Response::new("/", 404, "").ok());
        assert!(!Response::error().ok());
    }

    #[test]
    fn test_vary_names() {
        let resp = Response::new("/", 200, "").with_header("Vary", "Accept, Accept-Encoding,");
        assert_eq!(resp.vary(), vec!["accept".to_string(), "accept-encoding".to_string()]);
        assert!(Response::new("/", 200, "").vary().is_empty());
    }

    #[test]
    fn test_clone_is_independent_snapshot() {
        let original = Response::new("/", 200, "hello");
        let copy = original.clone();
        drop(original);
        assert_eq!(&copy.body[..], b"hello");
    }

    #[test]
    fn test_response_type_round_trip_names() {
        for ty in [ResponseType::Basic, ResponseType::Cors, ResponseType::Opaque, ResponseType::Error] {
            assert_eq!(ResponseType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(ResponseType::parse("bogus"), None);
    }
}
