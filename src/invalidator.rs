//! [`Invalidator`]: unsafe-method and `Location`/`Content-Location`
//! invalidation (spec §4.10).

use http::{HeaderMap, Method, StatusCode, Uri};
use log::{debug, warn};

use crate::cacheability::CacheabilityPolicy;
use crate::events::{Event, EventSink};
use crate::keyer::CacheKeyer;
use crate::storage::Storage;

/// Removes root entries made stale by a successful unsafe-method response.
#[derive(Debug, Clone, Copy, Default)]
pub struct Invalidator {
    policy: CacheabilityPolicy,
    keyer: CacheKeyer,
}

impl Invalidator {
    /// Build an invalidator sharing the executor's cacheability policy (the
    /// `shared_cache`/`range_caching_enabled` flags do not affect
    /// invalidation, but keeping one instance avoids a second
    /// configuration surface).
    pub fn new(policy: CacheabilityPolicy) -> Self {
        Self { policy, keyer: CacheKeyer }
    }

    /// If `method` is unsafe and `status` is 2xx/3xx, remove the root entry
    /// at the request URI's key and at any same-host `Location`/
    /// `Content-Location` target (spec §4.3c, §4.10). Best-effort: storage
    /// errors are swallowed, per spec "Removal is best-effort".
    pub async fn invalidate(
        &self,
        storage: &(dyn Storage),
        sink: &(dyn EventSink),
        method: &Method,
        request_uri: &Uri,
        status: StatusCode,
        response_headers: &HeaderMap,
    ) {
        if !self.policy.is_unsafe_method(method) {
            return;
        }
        if !(status.is_success() || status.is_redirection()) {
            return;
        }

        for target in self.policy.invalidation_targets(request_uri, response_headers)
        {
            let key = self.keyer.storage_key(&Method::GET, &target);
            match storage.remove(&key).await {
                Ok(()) => {
                    debug!("invalidated cache entry for {target}");
                    sink.record(Event::Eviction);
                }
                Err(err) => {
                    warn!("invalidation of {target} failed, ignoring: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventSink;
    use crate::storage::memory::MemoryStorage;
    use http::{HeaderMap, Method, StatusCode};
    use std::time::SystemTime;

    fn sample_entry(uri: &str) -> crate::entry::CacheEntry {
        let now = SystemTime::now();
        crate::entry::CacheEntry::new(
            now,
            now,
            Method::GET,
            uri.parse().unwrap(),
            HeaderMap::new(),
            StatusCode::OK,
            HeaderMap::new(),
            Some(crate::resource::Resource::from_bytes(&b"x"[..])),
            vec![],
        )
    }

    #[tokio::test]
    async fn post_2xx_removes_request_uri_entry() {
        let storage = MemoryStorage::new();
        let keyer = CacheKeyer;
        let uri: Uri = "http://example.com/item/42".parse().unwrap();
        let key = keyer.storage_key(&Method::GET, &uri);
        storage.put(&key, sample_entry("http://example.com/item/42")).await.unwrap();

        let invalidator = Invalidator::default();
        invalidator
            .invalidate(
                &storage,
                &NullEventSink,
                &Method::POST,
                &uri,
                StatusCode::OK,
                &HeaderMap::new(),
            )
            .await;

        assert!(storage.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_method_never_invalidates() {
        let storage = MemoryStorage::new();
        let keyer = CacheKeyer;
        let uri: Uri = "http://example.com/item/42".parse().unwrap();
        let key = keyer.storage_key(&Method::GET, &uri);
        storage.put(&key, sample_entry("http://example.com/item/42")).await.unwrap();

        let invalidator = Invalidator::default();
        invalidator
            .invalidate(
                &storage,
                &NullEventSink,
                &Method::GET,
                &uri,
                StatusCode::OK,
                &HeaderMap::new(),
            )
            .await;

        assert!(storage.get(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_status_does_not_invalidate() {
        let storage = MemoryStorage::new();
        let keyer = CacheKeyer;
        let uri: Uri = "http://example.com/item/42".parse().unwrap();
        let key = keyer.storage_key(&Method::GET, &uri);
        storage.put(&key, sample_entry("http://example.com/item/42")).await.unwrap();

        let invalidator = Invalidator::default();
        invalidator
            .invalidate(
                &storage,
                &NullEventSink,
                &Method::POST,
                &uri,
                StatusCode::INTERNAL_SERVER_ERROR,
                &HeaderMap::new(),
            )
            .await;

        assert!(storage.get(&key).await.unwrap().is_some());
    }
}
