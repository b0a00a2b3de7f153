//! [`CacheKeyer`]: deterministic mapping from a request to a storage key,
//! and from a `Vary`-bearing root entry plus a request to a variant key.

use http::{Method, Uri};

/// The separator between a root key's hash and a variant key, `\u{1f}`
/// (INFORMATION SEPARATOR ONE). Cannot appear in a canonicalized URI or in
/// a lowercased, header-folded variant value, so composite keys never
/// collide with a plain root key.
pub const VARIANT_SEPARATOR: char = '\u{1f}';

/// Deterministic, side-effect-free request-to-key mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheKeyer;

impl CacheKeyer {
    /// Build the canonical storage key for a request: the effective
    /// request URI (scheme lowercased, host lowercased, default port
    /// elided, path as-is, query preserved) plus the method if it is not
    /// `GET`.
    pub fn storage_key(&self, method: &Method, uri: &Uri) -> String {
        let canonical_uri = canonicalize_uri(uri);
        if method == Method::GET {
            canonical_uri
        } else {
            format!("{} {}", method.as_str(), canonical_uri)
        }
    }

    /// Compose a root key and a variant key into the key a variant child is
    /// stored under: `hash(root_key) || separator || variant_key`.
    pub fn variant_key(&self, root_key: &str, variant: &str) -> String {
        let hash = blake3::hash(root_key.as_bytes());
        format!("{}{}{}", hash.to_hex(), VARIANT_SEPARATOR, variant)
    }
}

/// Scheme-case-normalized, host-lowercased, default-port-elided URI,
/// preserving path and query verbatim.
fn canonicalize_uri(uri: &Uri) -> String {
    let scheme = uri.scheme_str().unwrap_or("http").to_ascii_lowercase();
    let default_port = match scheme.as_str() {
        "https" => Some(443),
        "http" => Some(80),
        _ => None,
    };
    let host = uri.host().unwrap_or("").to_ascii_lowercase();
    let port_part = match uri.port_u16() {
        Some(p) if Some(p) != default_port => format!(":{p}"),
        _ => String::new(),
    };
    let path_and_query =
        uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{scheme}://{host}{port_part}{path_and_query}")
}
