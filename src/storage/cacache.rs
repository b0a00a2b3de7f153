//! `CacacheStorage`: a [`Storage`] backend over [`cacache`], mirroring the
//! teacher's `CACacheManager` but against this crate's own `Storage`/
//! `CacheEntry` types, encoding with `postcard`.
//!
//! CAS atomicity is approximated with an in-process
//! `Mutex<HashMap<String, u64>>` guarding the generation counter — the
//! same best-effort level the teacher's own disk manager provides (it has
//! no CAS at all, just overwrite). True cross-process CAS on `cacache`
//! would need a separate lock-file protocol; see `DESIGN.md`.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::entry::{CacheEntry, StorableEntry};
use crate::error::{CacheError, Result};

use super::{CasHandle, CasOutcome, Storage};

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Versioned {
    entry: StorableEntry,
    generation: u64,
}

/// [`Storage`] backend persisting entries to a `cacache` content-addressed
/// store on disk.
#[derive(Debug)]
pub struct CacacheStorage {
    path: PathBuf,
    generations: Mutex<HashMap<String, u64>>,
}

impl CacacheStorage {
    /// Open (creating if absent) a `cacache` store rooted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), generations: Mutex::new(HashMap::new()) }
    }

    async fn read_versioned(&self, key: &str) -> Result<Option<Versioned>> {
        match cacache::read(&self.path, key).await {
            Ok(bytes) => {
                let versioned: Versioned =
                    postcard::from_bytes(&bytes).map_err(|e| {
                        CacheError::CacheEntryCorruption(format!(
                            "failed to decode cacache-stored entry at {key}: {e}"
                        ))
                    })?;
                Ok(Some(versioned))
            }
            Err(_) => Ok(None),
        }
    }

    async fn write_versioned(
        &self,
        key: &str,
        entry: CacheEntry,
        generation: u64,
    ) -> Result<()> {
        let storable = entry.to_storable().await.map_err(|e| {
            CacheError::CacheStoreFailure(format!("failed to snapshot entry: {e}"))
        })?;
        let versioned = Versioned { entry: storable, generation };
        let bytes = postcard::to_allocvec(&versioned).map_err(|e| {
            CacheError::CacheStoreFailure(format!("failed to encode entry: {e}"))
        })?;
        cacache::write(&self.path, key, bytes).await.map_err(|e| {
            CacheError::CacheStoreFailure(format!("cacache write failed: {e}"))
        })?;
        self.generations.lock().await.insert(key.to_string(), generation);
        Ok(())
    }
}

#[async_trait]
impl Storage for CacacheStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self.read_versioned(key).await? {
            Some(v) => Ok(Some(
                v.entry.into_entry().map_err(CacheError::CacheEntryCorruption)?,
            )),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let generation = self
            .read_versioned(key)
            .await?
            .map(|v| v.generation + 1)
            .unwrap_or(0);
        self.write_versioned(key, entry, generation).await
    }

    async fn cas_load(
        &self,
        key: &str,
    ) -> Result<(Option<CacheEntry>, CasHandle)> {
        let guard = self.generations.lock().await;
        match self.read_versioned(key).await? {
            Some(v) => {
                let entry = v.entry.into_entry().map_err(CacheError::CacheEntryCorruption)?;
                Ok((Some(entry), CasHandle(*guard.get(key).unwrap_or(&v.generation))))
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
        let mut guard = self.generations.lock().await;
        let current_generation = guard.get(key).copied();
        match current_generation {
            None => {
                if handle.0 != 0 {
                    return Ok(CasOutcome::NotFound);
                }
            }
            Some(gen) if gen != handle.0 => return Ok(CasOutcome::Conflict),
            Some(_) => {}
        }
        let next_generation = handle.0 + 1;
        let storable = entry.to_storable().await.map_err(|e| {
            CacheError::CacheStoreFailure(format!("failed to snapshot entry: {e}"))
        })?;
        let versioned = Versioned { entry: storable, generation: next_generation };
        let bytes = postcard::to_allocvec(&versioned).map_err(|e| {
            CacheError::CacheStoreFailure(format!("failed to encode entry: {e}"))
        })?;
        cacache::write(&self.path, key, bytes).await.map_err(|e| {
            CacheError::CacheStoreFailure(format!("cacache write failed: {e}"))
        })?;
        guard.insert(key.to_string(), next_generation);
        Ok(CasOutcome::Committed)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        cacache::remove(&self.path, key).await.map_err(|e| {
            CacheError::CacheStoreFailure(format!("cacache remove failed: {e}"))
        })?;
        self.generations.lock().await.remove(key);
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
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacacheStorage::new(dir.path());
        storage.put("k", sample()).await.unwrap();
        let loaded = storage.get("k").await.unwrap().unwrap();
        assert_eq!(loaded.status, StatusCode::OK);
        assert_eq!(
            loaded.body.unwrap().open_stream().await.unwrap(),
            &b"hello"[..]
        );
    }

    #[tokio::test]
    async fn cas_store_conflict_on_stale_generation() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacacheStorage::new(dir.path());
        storage.put("k", sample()).await.unwrap();
        let (_, stale) = storage.cas_load("k").await.unwrap();
        storage.put("k", sample()).await.unwrap();
        let outcome = storage.cas_store("k", &stale, sample()).await.unwrap();
        assert_eq!(outcome, CasOutcome::Conflict);
    }
}
