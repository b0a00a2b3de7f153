//! [`Storage`]: key to entry mapping with CAS update semantics (spec §4.1).

pub mod memory;

#[cfg(feature = "storage-moka")]
pub mod moka;

#[cfg(feature = "storage-cacache")]
pub mod cacache;

use async_trait::async_trait;

use crate::entry::CacheEntry;
use crate::error::Result;

/// Outcome of a [`Storage::cas_store`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write committed; the stored value matched the handle.
    Committed,
    /// Another writer committed since the handle was loaded; the caller
    /// should retry by reloading and re-deciding.
    Conflict,
    /// The key did not exist (or was removed) since the handle was loaded.
    NotFound,
}

/// An opaque version handle returned by [`Storage::cas_load`] and consumed
/// by [`Storage::cas_store`]. Implementations may use an ETag-of-value, an
/// external CAS token, or a generation counter; callers never inspect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CasHandle(pub(crate) u64);

/// Pluggable key-to-entry storage with compare-and-swap update semantics.
///
/// Implementations must be safe for concurrent callers: `cas_store`
/// commits iff the stored value is unchanged relative to the handle
/// `cas_load` returned. I/O errors are surfaced as a typed
/// [`crate::error::CacheError`]; per spec §4.1 the executor — not this
/// trait — is responsible for degrading a read failure to a miss and a
/// write failure to a skipped store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Unconditional read.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Unconditional write.
    async fn put(&self, key: &str, entry: CacheEntry) -> Result<()>;

    /// Load a value together with a version handle.
    async fn cas_load(
        &self,
        key: &str,
    ) -> Result<(Option<CacheEntry>, CasHandle)>;

    /// Atomic compare-and-set: commits only if the stored value is
    /// unchanged since `handle` was loaded.
    async fn cas_store(
        &self,
        key: &str,
        handle: &CasHandle,
        entry: CacheEntry,
    ) -> Result<CasOutcome>;

    /// Remove the entry at `key`, if present. Best-effort: implementations
    /// should not error merely because the key was already absent.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Retry a CAS update up to `max_retries` times, reloading and re-deciding
/// the value to store via `decide` on every conflict. `decide` receives the
/// freshly-loaded value (or `None` if absent) and returns the entry to
/// attempt to store.
pub async fn cas_update<S, F>(
    storage: &S,
    key: &str,
    max_retries: u32,
    mut decide: F,
) -> Result<CasOutcome>
where
    S: Storage + ?Sized,
    F: FnMut(Option<CacheEntry>) -> Option<CacheEntry>,
{
    let mut attempt = 0;
    loop {
        let (current, handle) = storage.cas_load(key).await?;
        let Some(next) = decide(current) else {
            return Ok(CasOutcome::Committed);
        };
        match storage.cas_store(key, &handle, next).await? {
            CasOutcome::Committed => return Ok(CasOutcome::Committed),
            CasOutcome::NotFound if attempt >= max_retries => {
                return Ok(CasOutcome::NotFound)
            }
            CasOutcome::Conflict if attempt >= max_retries => {
                return Err(crate::error::CacheError::CacheStoreFailure(
                    format!("update-failure after {max_retries} CAS retries"),
                ))
            }
            CasOutcome::Conflict | CasOutcome::NotFound => {
                attempt += 1;
                continue;
            }
        }
    }
}
