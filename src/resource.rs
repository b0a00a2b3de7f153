//! [`Resource`]: an opaque, reference-counted, disposable body carrier.

use std::io;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempPath;
use tokio::fs;

#[derive(Debug)]
enum Inner {
    Memory(Bytes),
    File { path: TempPath, len: u64 },
}

/// A disposable handle to a response body: either an in-heap buffer or a
/// file-backed one.
///
/// A `Resource` is created by [`crate::cacheability::CacheabilityPolicy`]
/// when storing a response, owned by exactly one [`crate::entry::CacheEntry`]
/// at a time, and disposed — for file-backed resources, by removing the
/// backing file — when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Resource(Arc<Inner>);

impl Resource {
    /// Build an in-memory resource from the given bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(Arc::new(Inner::Memory(bytes.into())))
    }

    /// Build a file-backed resource, taking ownership of the temp file at
    /// `path`. The file is removed when the last clone of this `Resource`
    /// is dropped.
    pub fn from_temp_file(path: TempPath, len: u64) -> Self {
        Self(Arc::new(Inner::File { path, len }))
    }

    /// Spill `bytes` to a new temp file under `dir` and return a
    /// file-backed resource for it.
    pub async fn spill_to_temp(
        dir: &Path,
        bytes: &[u8],
    ) -> io::Result<Self> {
        let named = tempfile::NamedTempFile::new_in(dir)?;
        let (file, path) = named.into_parts();
        let mut file = fs::File::from_std(file);
        use tokio::io::AsyncWriteExt;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(Self::from_temp_file(path, bytes.len() as u64))
    }

    /// The length of the body in bytes.
    pub fn len(&self) -> u64 {
        match &*self.0 {
            Inner::Memory(b) => b.len() as u64,
            Inner::File { len, .. } => *len,
        }
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the entire body into memory.
    pub async fn open_stream(&self) -> io::Result<Bytes> {
        match &*self.0 {
            Inner::Memory(b) => Ok(b.clone()),
            Inner::File { path, .. } => {
                let bytes = fs::read(path).await?;
                Ok(Bytes::from(bytes))
            }
        }
    }

    /// Drop this handle to the resource. Equivalent to letting it go out of
    /// scope; provided for callers that want to make disposal explicit at
    /// the point an entry is superseded.
    pub fn dispose(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_resource_round_trips() {
        let r = Resource::from_bytes(Bytes::from_static(b"hello"));
        assert_eq!(r.len(), 5);
        assert_eq!(r.open_stream().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn file_resource_disposed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let r = Resource::spill_to_temp(dir.path(), b"payload").await.unwrap();
        let path = match &*r.0 {
            Inner::File { path, .. } => path.to_path_buf(),
            _ => unreachable!(),
        };
        assert!(path.exists());
        assert_eq!(r.open_stream().await.unwrap(), Bytes::from_static(b"payload"));
        drop(r);
        assert!(!path.exists());
    }
}
