//! [`ResponseCombiner`]: merges a validated 304 with its stored entry
//! (spec §4.6).

use std::time::SystemTime;

use http::{HeaderMap, StatusCode};

use crate::cacheability::HOP_BY_HOP_HEADERS;
use crate::conditional::is_weak_etag;
use crate::entry::CacheEntry;

/// Headers a 304 is never allowed to overlay onto the stored entry, even
/// when present on the 304 itself (the framing-sensitive `Content-Length`
/// plus every hop-by-hop header).
fn excluded_from_overlay(name: &http::HeaderName) -> bool {
    name == http::header::CONTENT_LENGTH || HOP_BY_HOP_HEADERS.contains(name)
}

/// Merges a 304 response into a stored candidate entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseCombiner;

impl ResponseCombiner {
    /// Validate that `not_modified` (a 304 response's headers) actually
    /// refers to `candidate` — by strong/weak ETag match, or by
    /// Last-Modified/Date monotonicity when no ETag is present.
    pub fn validates(
        &self,
        candidate: &CacheEntry,
        not_modified_headers: &HeaderMap,
    ) -> bool {
        let stored_etag = candidate.response_headers.get(http::header::ETAG);
        let fresh_etag = not_modified_headers.get(http::header::ETAG);
        if let (Some(stored), Some(fresh)) = (stored_etag, fresh_etag) {
            return etag_values_match(stored, fresh);
        }
        if fresh_etag.is_some() && stored_etag.is_none() {
            // The origin started sending an ETag it never had before;
            // accept it as a validation (the candidate predates the
            // validator being introduced).
            return true;
        }
        let stored_lm = candidate.response_headers.get(http::header::LAST_MODIFIED);
        let fresh_lm = not_modified_headers.get(http::header::LAST_MODIFIED);
        match (stored_lm, fresh_lm) {
            (Some(stored), Some(fresh)) => stored == fresh,
            // No validators on either side: trust the 304 (the server is
            // asserting "unchanged" even without a strong validator).
            _ => true,
        }
    }

    /// Merge a validated 304 into `candidate`, producing the new entry to
    /// store. `request_time`/`response_time` are the fresh values from the
    /// revalidation exchange that produced the 304.
    pub fn merge(
        &self,
        candidate: &CacheEntry,
        not_modified_headers: &HeaderMap,
        request_time: SystemTime,
        response_time: SystemTime,
    ) -> CacheEntry {
        let mut merged = strip_1xx_warnings(&candidate.response_headers);

        for name in not_modified_headers.keys() {
            if excluded_from_overlay(name) {
                continue;
            }
            merged.remove(name);
            for value in not_modified_headers.get_all(name) {
                merged.append(name.clone(), value.clone());
            }
        }

        CacheEntry::new(
            request_time,
            response_time,
            candidate.request_method.clone(),
            candidate.request_uri.clone(),
            candidate.request_headers.clone(),
            candidate.status,
            merged,
            candidate.body.clone(),
            candidate.variants.clone(),
        )
    }

    /// A non-304 final response during revalidation replaces the stored
    /// entry outright; this is just `CacheEntry::new` with the fresh
    /// response's own fields, kept here so callers have one entry point
    /// for "what replaces the candidate" regardless of outcome.
    pub fn replace(
        &self,
        request_method: http::Method,
        request_uri: http::Uri,
        request_headers: HeaderMap,
        request_time: SystemTime,
        response_time: SystemTime,
        status: StatusCode,
        response_headers: HeaderMap,
        body: Option<crate::resource::Resource>,
    ) -> CacheEntry {
        CacheEntry::new(
            request_time,
            response_time,
            request_method,
            request_uri,
            request_headers,
            status,
            response_headers,
            body,
            vec![],
        )
    }
}

fn etag_values_match(a: &http::HeaderValue, b: &http::HeaderValue) -> bool {
    // Weak comparison is sufficient for revalidation matching (RFC 7232 §2.3.2);
    // strong validators compare equal under it too.
    let strip_weak = |v: &http::HeaderValue| -> String {
        let s = v.to_str().unwrap_or_default();
        if is_weak_etag(v) { s.trim_start_matches("W/").to_string() } else { s.to_string() }
    };
    strip_weak(a) == strip_weak(b)
}

fn strip_1xx_warnings(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers.iter() {
        if name == http::header::WARNING {
            if let Ok(s) = value.to_str() {
                if s.trim_start().starts_with('1') {
                    continue;
                }
            }
        }
        out.append(name.clone(), value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn candidate_entry() -> CacheEntry {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ETAG, r#""v1""#.parse().unwrap());
        headers.insert(http::header::DATE, "Mon, 01 Jan 2024 00:00:00 GMT".parse().unwrap());
        headers.insert(http::header::WARNING, "110 - \"Response is Stale\"".parse().unwrap());
        let now = SystemTime::now();
        CacheEntry::new(
            now,
            now,
            Method::GET,
            "http://example.com/".parse().unwrap(),
            HeaderMap::new(),
            StatusCode::OK,
            headers,
            Some(crate::resource::Resource::from_bytes(&b"hello"[..])),
            vec![],
        )
    }

    #[test]
    fn validates_on_matching_etag() {
        let combiner = ResponseCombiner;
        let mut fresh = HeaderMap::new();
        fresh.insert(http::header::ETAG, r#""v1""#.parse().unwrap());
        assert!(combiner.validates(&candidate_entry(), &fresh));
    }

    #[test]
    fn rejects_mismatched_etag() {
        let combiner = ResponseCombiner;
        let mut fresh = HeaderMap::new();
        fresh.insert(http::header::ETAG, r#""v2""#.parse().unwrap());
        assert!(!combiner.validates(&candidate_entry(), &fresh));
    }

    #[test]
    fn merge_updates_date_strips_1xx_warning_keeps_body() {
        let combiner = ResponseCombiner;
        let candidate = candidate_entry();
        let mut fresh = HeaderMap::new();
        fresh.insert(http::header::DATE, "Mon, 01 Jan 2024 00:10:00 GMT".parse().unwrap());
        let now = SystemTime::now();
        let merged = combiner.merge(&candidate, &fresh, now, now);
        assert_eq!(
            merged.response_headers.get(http::header::DATE).unwrap(),
            "Mon, 01 Jan 2024 00:10:00 GMT"
        );
        assert!(!merged.response_headers.contains_key(http::header::WARNING));
        assert_eq!(merged.body.unwrap().len(), 5);
    }
}
