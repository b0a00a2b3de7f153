//! `MokaStorage`: a [`Storage`] backend over [`moka`]'s async in-process
//! cache, mirroring the teacher's `MokaManager` but serializing
//! [`crate::entry::StorableEntry`] with `postcard` and keeping a generation
//! counter alongside it for CAS.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use tokio::sync::Mutex;

use crate::entry::{CacheEntry, StorableEntry};
use crate::error::{CacheError, Result};

use super::{CasHandle, CasOutcome, Storage};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Versioned {
    entry: StorableEntry,
    generation: u64,
}

/// [`Storage`] backend over an in-process `moka::future::Cache`. Entries
/// are serialized so the cache's own size-aware eviction can account for
/// their weight; CAS is implemented with an auxiliary mutex since `moka`
/// has no native compare-and-swap.
pub struct MokaStorage {
    cache: Cache<String, Arc<Vec<u8>>>,
    cas_lock: Mutex<()>,
}

impl std::fmt::Debug for MokaStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStorage").finish_non_exhaustive()
    }
}

impl MokaStorage {
    /// Build a storage backend over a cache capped at `max_entries`.
    pub fn new(max_entries: u64) -> Self {
        Self::from_cache(Cache::new(max_entries))
    }

    /// Build a storage backend over a caller-configured cache (e.g. with a
    /// custom weigher or TTL).
    pub fn from_cache(cache: Cache<String, Arc<Vec<u8>>>) -> Self {
        Self { cache, cas_lock: Mutex::new(()) }
    }

    async fn read_versioned(&self, key: &str) -> Result<Option<Versioned>> {
        let Some(bytes) = self.cache.get(key).await else { return Ok(None) };
        let versioned: Versioned = postcard::from_bytes(&bytes).map_err(|e| {
            CacheError::CacheEntryCorruption(format!(
                "failed to decode moka-stored entry at {key}: {e}"
            ))
        })?;
        Ok(Some(versioned))
    }
}

#[async_trait]
impl Storage for MokaStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self.read_versioned(key).await? {
            Some(v) => Ok(Some(v.entry.into_entry().map_err(|e| {
                CacheError::CacheEntryCorruption(e)
            })?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let _guard = self.cas_lock.lock().await;
        let generation = self
            .read_versioned(key)
            .await?
            .map(|v| v.generation + 1)
            .unwrap_or(0);
        let storable = entry.to_storable().await.map_err(|e| {
            CacheError::CacheStoreFailure(format!("failed to snapshot entry: {e}"))
        })?;
        let versioned = Versioned { entry: storable, generation };
        let bytes = postcard::to_allocvec(&versioned).map_err(|e| {
            CacheError::CacheStoreFailure(format!("failed to encode entry: {e}"))
        })?;
        self.cache.insert(key.to_string(), Arc::new(bytes)).await;
        Ok(())
    }

    async fn cas_load(
        &self,
        key: &str,
    ) -> Result<(Option<CacheEntry>, CasHandle)> {
        match self.read_versioned(key).await? {
            Some(v) => {
                let entry = v.entry.into_entry().map_err(CacheError::CacheEntryCorruption)?;
                Ok((Some(entry), CasHandle(v.generation)))
            }
            None => Ok((None, CasHandle(0))),
        }
    }

    async fn cas_store(
        &self,
        key: &str,
        handle: &CasHandle,
        entry: CacheEntry,
    ) -> Result<CasOutcome> {
        let _guard = self.cas_lock.lock().await;
        let current = self.read_versioned(key).await?;
        let current_generation = current.as_ref().map(|v| v.generation);
        match current_generation {
            None if handle.0 != 0 => return Ok(CasOutcome::NotFound),
            Some(gen) if gen != handle.0 => return Ok(CasOutcome::Conflict),
            _ => {}
        }
        let storable = entry.to_storable().await.map_err(|e| {
            CacheError::CacheStoreFailure(format!("failed to snapshot entry: {e}"))
        })?;
        let next_generation = handle.0 + 1;
        let versioned = Versioned { entry: storable, generation: next_generation };
        let bytes = postcard::to_allocvec(&versioned).map_err(|e| {
            CacheError::CacheStoreFailure(format!("failed to encode entry: {e}"))
        })?;
        self.cache.insert(key.to_string(), Arc::new(bytes)).await;
        Ok(CasOutcome::Committed)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.cas_lock.lock().await;
        self.cache.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, StatusCode};
    use std::time::SystemTime;

    fn sample() -> CacheEntry {
        let now = SystemTime::now();
        CacheEntry::new(
            now,
            now,
            Method::GET,
            "http://example.com/".parse().unwrap(),
            HeaderMap::new(),
            StatusCode::OK,
            HeaderMap::new(),
            Some(crate::resource::Resource::from_bytes(&b"hello"[..])),
            vec![],
        )
    }

    #[tokio::test]
    async fn round_trips_through_postcard() {
        let storage = MokaStorage::new(16);
        storage.put("k", sample()).await.unwrap();
        let loaded = storage.get("k").await.unwrap().unwrap();
        assert_eq!(loaded.status, StatusCode::OK);
        assert_eq!(loaded.body.unwrap().open_stream().await.unwrap(), &b"hello"[..]);
    }

    #[tokio::test]
    async fn cas_store_detects_conflict() {
        let storage = MokaStorage::new(16);
        storage.put("k", sample()).await.unwrap();
        let (_, stale) = storage.cas_load("k").await.unwrap();
        storage.put("k", sample()).await.unwrap();
        let outcome = storage.cas_store("k", &stale, sample()).await.unwrap();
        assert_eq!(outcome, CasOutcome::Conflict);
    }
}
