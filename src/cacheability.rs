//! [`CacheabilityPolicy`]: request admission, response storability, and
//! unsafe-method invalidation targets (spec §4.3).
//!
//! Ported from the storability checks in
//! `examples/kornelski-rusty-http-cache-semantics` (`is_storable`,
//! `allows_storing_authenticated`, the hop-by-hop header set) but
//! restructured into the three explicit decisions §4.3 names instead of
//! one boolean.

use http::{HeaderMap, HeaderName, Method, StatusCode, Uri};

use crate::cache_control::{pragma_no_cache, CacheControl};

/// Status codes cacheable by default without an explicit expiration
/// (§4.3b). 206 is included here only as a default-set member; actual
/// admission still requires range-caching support, which this crate does
/// not provide (spec §1 Non-goals) — see [`CacheabilityPolicy::is_response_storable`].
pub const DEFAULT_CACHEABLE_STATUSES: &[StatusCode] = &[
    StatusCode::OK,
    StatusCode::NON_AUTHORITATIVE_INFORMATION,
    StatusCode::NO_CONTENT,
    StatusCode::PARTIAL_CONTENT,
    StatusCode::MULTIPLE_CHOICES,
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::PERMANENT_REDIRECT,
    StatusCode::NOT_FOUND,
    StatusCode::METHOD_NOT_ALLOWED,
    StatusCode::GONE,
    StatusCode::URI_TOO_LONG,
    StatusCode::NOT_IMPLEMENTED,
];

/// Headers that are meaningful only for a single transport hop and must
/// never be copied into a stored entry or a combined response.
pub const HOP_BY_HOP_HEADERS: &[HeaderName] = &[
    http::header::CONNECTION,
    http::header::PROXY_AUTHENTICATE,
    http::header::PROXY_AUTHORIZATION,
    http::header::TE,
    http::header::TRAILER,
    http::header::TRANSFER_ENCODING,
    http::header::UPGRADE,
];

/// Methods this crate's request-admission logic treats as read-only by
/// default. Invalidation-eligible methods are the complement over the
/// "unsafe" set named in §4.3c.
const UNSAFE_METHODS: &[Method] =
    &[Method::POST, Method::PUT, Method::DELETE, Method::PATCH];

/// Decides admission, storability, and invalidation targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheabilityPolicy {
    pub shared_cache: bool,
    pub range_caching_enabled: bool,
}

impl CacheabilityPolicy {
    /// §4.3(a): may this request attempt to use the cache at all?
    pub fn request_may_use_cache(
        &self,
        method: &Method,
        request_headers: &HeaderMap,
        cache_methods: &[Method],
    ) -> bool {
        if method != Method::GET && method != Method::HEAD
            && !cache_methods.contains(method)
        {
            return false;
        }
        let cc = CacheControl::parse(request_headers);
        if cc.no_store() {
            return false;
        }
        if pragma_no_cache(request_headers) {
            return false;
        }
        // no-cache alone still permits conditional revalidation, so it does
        // not block admission by itself — the executor treats it as "must
        // revalidate" rather than "bypass".
        true
    }

    /// §4.3(b): may this response be stored?
    pub fn is_response_storable(
        &self,
        request_headers: &HeaderMap,
        status: StatusCode,
        response_headers: &HeaderMap,
        cacheable_statuses: &[StatusCode],
    ) -> bool {
        let response_cc = CacheControl::parse(response_headers);
        if response_cc.no_store() {
            return false;
        }
        if response_cc.private() && self.shared_cache {
            return false;
        }
        if vary_is_wildcard(response_headers) {
            return false;
        }
        if status == StatusCode::PARTIAL_CONTENT && !self.range_caching_enabled {
            return false;
        }

        let request_cc = CacheControl::parse(request_headers);
        if request_headers.contains_key(http::header::AUTHORIZATION)
            && self.shared_cache
            && !(response_cc.must_revalidate()
                || response_cc.public()
                || response_cc.s_maxage().is_some())
        {
            return false;
        }
        let _ = request_cc; // authorization check above is the only use today

        let has_explicit_expiration = response_cc.max_age().is_some()
            || response_cc.s_maxage().is_some()
            || response_headers.contains_key(http::header::EXPIRES);

        if !cacheable_statuses.contains(&status) && !has_explicit_expiration {
            return false;
        }

        true
    }

    /// §4.3(c): for an unsafe-method response, the set of URIs to
    /// invalidate. Only called when `status` is 2xx/3xx (the executor
    /// enforces this before calling).
    pub fn invalidation_targets(
        &self,
        request_uri: &Uri,
        response_headers: &HeaderMap,
    ) -> Vec<Uri> {
        let mut targets = vec![request_uri.clone()];
        let request_host = request_uri.host().map(|h| h.to_ascii_lowercase());

        for header_name in [http::header::LOCATION, http::header::CONTENT_LOCATION] {
            if let Some(value) = response_headers.get(header_name) {
                if let Ok(value) = value.to_str() {
                    if let Ok(uri) = value.parse::<Uri>() {
                        let same_host =
                            uri.host().map(|h| h.to_ascii_lowercase()) == request_host;
                        if same_host {
                            targets.push(uri);
                        }
                    }
                }
            }
        }
        targets
    }

    /// Whether `method` is one of the unsafe methods that trigger
    /// invalidation on a successful response.
    pub fn is_unsafe_method(&self, method: &Method) -> bool {
        UNSAFE_METHODS.contains(method)
    }
}

fn vary_is_wildcard(headers: &HeaderMap) -> bool {
    headers.get_all(http::header::VARY).iter().any(|v| {
        v.to_str().map(|s| s.trim() == "*").unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vary_star_never_stored() {
        let policy = CacheabilityPolicy::default();
        let mut headers = HeaderMap::new();
        headers.insert(http::header::VARY, "*".parse().unwrap());
        headers.insert(http::header::CACHE_CONTROL, "max-age=600".parse().unwrap());
        assert!(!policy.is_response_storable(
            &HeaderMap::new(),
            StatusCode::OK,
            &headers,
            DEFAULT_CACHEABLE_STATUSES,
        ));
    }

    #[test]
    fn no_store_rejects_storage() {
        let policy = CacheabilityPolicy::default();
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CACHE_CONTROL, "no-store".parse().unwrap());
        assert!(!policy.is_response_storable(
            &HeaderMap::new(),
            StatusCode::OK,
            &headers,
            DEFAULT_CACHEABLE_STATUSES,
        ));
    }

    #[test]
    fn default_status_without_expiration_is_storable() {
        let policy = CacheabilityPolicy::default();
        assert!(policy.is_response_storable(
            &HeaderMap::new(),
            StatusCode::OK,
            &HeaderMap::new(),
            DEFAULT_CACHEABLE_STATUSES,
        ));
    }

    #[test]
    fn non_default_status_without_expiration_is_not_storable() {
        let policy = CacheabilityPolicy::default();
        assert!(!policy.is_response_storable(
            &HeaderMap::new(),
            StatusCode::IM_A_TEAPOT,
            &HeaderMap::new(),
            DEFAULT_CACHEABLE_STATUSES,
        ));
    }

    #[test]
    fn authorization_without_override_blocks_shared_cache_storage() {
        let policy = CacheabilityPolicy { shared_cache: true, ..Default::default() };
        let mut req = HeaderMap::new();
        req.insert(http::header::AUTHORIZATION, "Bearer x".parse().unwrap());
        assert!(!policy.is_response_storable(
            &req,
            StatusCode::OK,
            &HeaderMap::new(),
            DEFAULT_CACHEABLE_STATUSES,
        ));
    }

    #[test]
    fn invalidation_targets_include_same_host_location() {
        let policy = CacheabilityPolicy::default();
        let request_uri: Uri = "http://example.com/item/42".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::LOCATION,
            "http://example.com/item/42/canonical".parse().unwrap(),
        );
        let targets = policy.invalidation_targets(&request_uri, &headers);
        assert_eq!(targets.len(), 2);
    }
}
