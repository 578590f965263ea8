//! Request key generation.

use sha2::{Digest, Sha256};
use url::Url;

/// Compute the lookup key for a request: SHA-256 over method and URL without fragment.
///
/// Header-based disambiguation (`Vary`) is applied on top of this key when
/// entries are matched.
pub fn compute_cache_key(method: &str, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
