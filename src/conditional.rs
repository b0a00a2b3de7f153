//! [`ConditionalRequestBuilder`]: adds validators to a revalidation
//! request without mutating the caller's request (spec §4.5).

use http::{HeaderMap, HeaderValue};

use crate::entry::CacheEntry;

/// Builds conditional (validator-bearing) requests from a candidate entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalRequestBuilder;

impl ConditionalRequestBuilder {
    /// Return a new header map equal to `base_request_headers` plus
    /// whatever validators `entry` supports. Never mutates
    /// `base_request_headers` in place.
    ///
    /// If the entry carries neither an `ETag` nor a `Last-Modified`, the
    /// returned headers are unchanged from `base_request_headers` — the
    /// caller then performs a full, unconditional fetch rather than a
    /// revalidation.
    pub fn build(
        &self,
        base_request_headers: &HeaderMap,
        entry: &CacheEntry,
    ) -> HeaderMap {
        let mut headers = base_request_headers.clone();

        let etag = entry.response_headers.get(http::header::ETAG).cloned();
        let last_modified =
            entry.response_headers.get(http::header::LAST_MODIFIED).cloned();

        if let Some(etag) = &etag {
            headers.insert(http::header::IF_NONE_MATCH, etag.clone());
        }
        if let Some(last_modified) = &last_modified {
            if etag.is_none() {
                headers.insert(http::header::IF_MODIFIED_SINCE, last_modified.clone());
            }
        }

        headers
    }

    /// Whether `build` would add any validator for `entry` — i.e. whether
    /// the resulting request is actually conditional.
    pub fn is_conditional(&self, entry: &CacheEntry) -> bool {
        entry.response_headers.contains_key(http::header::ETAG)
            || entry.response_headers.contains_key(http::header::LAST_MODIFIED)
    }
}

/// Whether `value` is a weak validator (`W/"..."`).
pub fn is_weak_etag(value: &HeaderValue) -> bool {
    value.to_str().map(|s| s.starts_with("W/")).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use std::time::SystemTime;

    fn entry_with_etag(etag: &str) -> CacheEntry {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ETAG, etag.parse().unwrap());
        let now = SystemTime::now();
        CacheEntry::new(
            now,
            now,
            Method::GET,
            "http://example.com/".parse().unwrap(),
            HeaderMap::new(),
            StatusCode::OK,
            headers,
            Some(crate::resource::Resource::from_bytes(&b"x"[..])),
            vec![],
        )
    }

    #[test]
    fn adds_if_none_match_for_etag() {
        let builder = ConditionalRequestBuilder;
        let entry = entry_with_etag(r#""v1""#);
        let headers = builder.build(&HeaderMap::new(), &entry);
        assert_eq!(headers.get(http::header::IF_NONE_MATCH).unwrap(), r#""v1""#);
        assert!(!headers.contains_key(http::header::IF_MODIFIED_SINCE));
    }

    #[test]
    fn no_validators_means_not_conditional() {
        let builder = ConditionalRequestBuilder;
        let now = SystemTime::now();
        let entry = CacheEntry::new(
            now,
            now,
            http::Method::GET,
            "http://example.com/".parse().unwrap(),
            HeaderMap::new(),
            http::StatusCode::OK,
            HeaderMap::new(),
            Some(crate::resource::Resource::from_bytes(&b"x"[..])),
            vec![],
        );
        assert!(!builder.is_conditional(&entry));
        let headers = builder.build(&HeaderMap::new(), &entry);
        assert!(headers.is_empty());
    }
}
