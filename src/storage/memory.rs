//! `MemoryStorage`: the default [`Storage`] backend, a `DashMap` keyed by
//! storage key with a generation counter as the CAS handle.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::entry::CacheEntry;
use crate::error::Result;

use super::{CasHandle, CasOutcome, Storage};

#[derive(Debug)]
struct Versioned {
    entry: CacheEntry,
    generation: u64,
}

/// In-process, concurrent-safe [`Storage`] backend. Suitable as the default
/// and for the seed-scenario tests; does not persist across process
/// restarts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    map: DashMap<String, Versioned>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored. Convenience for tests and
    /// operators; not part of the [`Storage`] trait.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.map.get(key).map(|v| v.entry.clone()))
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let generation =
            self.map.get(key).map(|v| v.generation + 1).unwrap_or(0);
        self.map.insert(key.to_string(), Versioned { entry, generation });
        Ok(())
    }

    async fn cas_load(
        &self,
        key: &str,
    ) -> Result<(Option<CacheEntry>, CasHandle)> {
        match self.map.get(key) {
            Some(v) => Ok((Some(v.entry.clone()), CasHandle(v.generation))),
            None => Ok((None, CasHandle(0))),
        }
    }

    async fn cas_store(
        &self,
        key: &str,
        handle: &CasHandle,
        entry: CacheEntry,
    ) -> Result<CasOutcome> {
        match self.map.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Vacant(vac) => {
                if handle.0 != 0 {
                    return Ok(CasOutcome::NotFound);
                }
                vac.insert(Versioned { entry, generation: 0 });
                Ok(CasOutcome::Committed)
            }
            dashmap::mapref::entry::Entry::Occupied(mut occ) => {
                if occ.get().generation != handle.0 {
                    return Ok(CasOutcome::Conflict);
                }
                occ.insert(Versioned { entry, generation: handle.0 + 1 });
                Ok(CasOutcome::Committed)
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.map.remove(key);
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
            Some(crate::resource::Resource::from_bytes(&b"x"[..])),
            vec![],
        )
    }

    #[tokio::test]
    async fn cas_store_conflict_on_stale_handle() {
        let storage = MemoryStorage::new();
        storage.put("k", sample()).await.unwrap();
        let (_, stale_handle) = storage.cas_load("k").await.unwrap();
        storage.put("k", sample()).await.unwrap();
        let outcome =
            storage.cas_store("k", &stale_handle, sample()).await.unwrap();
        assert_eq!(outcome, CasOutcome::Conflict);
    }

    #[tokio::test]
    async fn cas_store_commits_against_fresh_handle() {
        let storage = MemoryStorage::new();
        storage.put("k", sample()).await.unwrap();
        let (_, handle) = storage.cas_load("k").await.unwrap();
        let outcome = storage.cas_store("k", &handle, sample()).await.unwrap();
        assert_eq!(outcome, CasOutcome::Committed);
    }

    #[tokio::test]
    async fn remove_then_get_is_none() {
        let storage = MemoryStorage::new();
        storage.put("k", sample()).await.unwrap();
        storage.remove("k").await.unwrap();
        assert!(storage.get("k").await.unwrap().is_none());
    }
}
