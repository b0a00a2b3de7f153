//! [`CacheEntry`]: the immutable record of a cached response.

use std::time::SystemTime;

use http::{HeaderMap, Method, StatusCode, Uri};
use serde::{Deserialize, Serialize};

use crate::resource::Resource;

/// An immutable record of a cached response.
///
/// Entries are never mutated in place — a 304 merge or a replacement fetch
/// produces a *new* `CacheEntry`; the old one, and the [`Resource`] it
/// owned, is dropped and disposed by the caller that superseded it.
///
/// Invariants upheld by every constructor in this crate (never by callers
/// reaching into the fields directly):
/// 1. `request_time <= response_time`.
/// 2. If `variants` is non-empty, `body` is `None` — a variant root entry
///    carries no body, only the index of its children.
/// 3. `status` is in `100..=599`.
/// 4. `response_headers`/`request_headers` preserve the iteration order and
///    multiplicity they were built with ([`HeaderMap`] already guarantees
///    this on its own).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Instant the revalidation/fetch request was sent.
    pub request_time: SystemTime,
    /// Instant the response was received.
    pub response_time: SystemTime,
    /// Method that produced this entry (normally GET or HEAD).
    pub request_method: Method,
    /// Effective request URI at storage time.
    pub request_uri: Uri,
    /// Subset of the original request headers needed to re-match `Vary`.
    pub request_headers: HeaderMap,
    /// Response status code.
    pub status: StatusCode,
    /// Ordered response headers, preserving multiplicity.
    pub response_headers: HeaderMap,
    /// The response body, absent for variant-root entries.
    pub body: Option<Resource>,
    /// Variant keys, non-empty only for a variant-root entry (see
    /// [`crate::variant`]).
    pub variants: Vec<String>,
}

impl CacheEntry {
    /// Build a new entry, checking the structural invariants that must
    /// always hold. Panics in debug builds if violated by caller error;
    /// this is only ever called from within this crate with
    /// already-validated inputs.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_time: SystemTime,
        response_time: SystemTime,
        request_method: Method,
        request_uri: Uri,
        request_headers: HeaderMap,
        status: StatusCode,
        response_headers: HeaderMap,
        body: Option<Resource>,
        variants: Vec<String>,
    ) -> Self {
        debug_assert!(request_time <= response_time);
        debug_assert!(!(!variants.is_empty() && body.is_some()));
        let entry = Self {
            request_time,
            response_time,
            request_method,
            request_uri,
            request_headers,
            status,
            response_headers,
            body,
            variants,
        };
        debug_assert!(entry.check_invariants().is_ok());
        entry
    }

    /// Whether this entry is a variant root (holds a variant index instead
    /// of a body).
    pub fn is_variant_root(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Verify the structural invariants, returning a description of the
    /// first violation found.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        if self.request_time > self.response_time {
            return Err("request_time must not be after response_time");
        }
        if !self.variants.is_empty() && self.body.is_some() {
            return Err("a variant-root entry must not carry a body");
        }
        if self.status.as_u16() < 100 {
            return Err("status must be >= 100");
        }
        Ok(())
    }

    /// Snapshot this entry into a plain-data record suitable for
    /// serialization by a [`crate::storage`] backend. Async because
    /// file-backed bodies must be read into memory to be persisted.
    pub async fn to_storable(&self) -> std::io::Result<StorableEntry> {
        let body = match &self.body {
            Some(r) => Some(r.open_stream().await?.to_vec()),
            None => None,
        };
        Ok(StorableEntry {
            request_time: system_time_to_secs(self.request_time),
            response_time: system_time_to_secs(self.response_time),
            request_method: self.request_method.as_str().to_string(),
            request_uri: self.request_uri.to_string(),
            request_headers: header_map_to_pairs(&self.request_headers),
            status: self.status.as_u16(),
            response_headers: header_map_to_pairs(&self.response_headers),
            body,
            variants: self.variants.clone(),
        })
    }
}

/// Plain-data mirror of [`CacheEntry`], serializable with `serde`, used by
/// disk/KV-backed [`crate::storage`] implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorableEntry {
    request_time: u64,
    response_time: u64,
    request_method: String,
    request_uri: String,
    request_headers: Vec<(String, String)>,
    status: u16,
    response_headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    variants: Vec<String>,
}

impl StorableEntry {
    /// Reconstruct a [`CacheEntry`] from its plain-data form. Returns an
    /// error (rather than panicking) on malformed data so storage backends
    /// can surface [`crate::error::CacheError::CacheEntryCorruption`].
    pub fn into_entry(self) -> Result<CacheEntry, String> {
        let request_method = self
            .request_method
            .parse::<Method>()
            .map_err(|e| e.to_string())?;
        let request_uri =
            self.request_uri.parse::<Uri>().map_err(|e| e.to_string())?;
        let status =
            StatusCode::from_u16(self.status).map_err(|e| e.to_string())?;
        let request_headers = pairs_to_header_map(&self.request_headers)?;
        let response_headers = pairs_to_header_map(&self.response_headers)?;
        let body = self.body.map(Resource::from_bytes);
        Ok(CacheEntry::new(
            secs_to_system_time(self.request_time),
            secs_to_system_time(self.response_time),
            request_method,
            request_uri,
            request_headers,
            status,
            response_headers,
            body,
            self.variants,
        ))
    }
}

fn system_time_to_secs(t: SystemTime) -> u64 {
    t.duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn secs_to_system_time(secs: u64) -> SystemTime {
    std::time::UNIX_EPOCH + std::time::Duration::from_secs(secs)
}

fn header_map_to_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

fn pairs_to_header_map(
    pairs: &[(String, String)],
) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        let name: http::HeaderName =
            name.parse().map_err(|e: http::header::InvalidHeaderName| {
                e.to_string()
            })?;
        let value: http::HeaderValue = value
            .parse()
            .map_err(|e: http::header::InvalidHeaderValue| e.to_string())?;
        map.append(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample_entry() -> CacheEntry {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::DATE, "Mon, 01 Jan 2024 00:00:00 GMT".parse().unwrap());
        let now = std::time::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        CacheEntry::new(
            now,
            now,
            Method::GET,
            "https://example.com/a".parse().unwrap(),
            HeaderMap::new(),
            StatusCode::OK,
            headers,
            Some(Resource::from_bytes(&b"hello"[..])),
            vec![],
        )
    }

    #[test]
    fn invariants_hold_for_sample() {
        assert!(sample_entry().check_invariants().is_ok());
    }

    #[tokio::test]
    async fn storable_round_trip_preserves_fields() {
        let entry = sample_entry();
        let storable = entry.to_storable().await.unwrap();
        let restored = storable.into_entry().unwrap();
        assert_eq!(restored.status, entry.status);
        assert_eq!(restored.request_uri, entry.request_uri);
        assert_eq!(
            restored.body.unwrap().open_stream().await.unwrap(),
            entry.body.unwrap().open_stream().await.unwrap()
        );
    }
}
