//! Durable client storage for the database image.
//!
//! The image is always read and written whole. There is no incremental format.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Holds one opaque binary image under a fixed key.
pub trait ImageStore {
    /// Returns `None` when nothing has been persisted yet.
    fn load(&self) -> impl Future<Output = io::Result<Option<Vec<u8>>>> + Send;

    /// Replaces the stored image.
    fn save(&self, image: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Removes the stored image. Used for a user-requested full reset.
    fn clear(&self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Image stored as `<dir>/<key>.sqlite`.
#[derive(Debug, Clone)]
pub struct FileImageStore {
    path: PathBuf,
}

impl FileImageStore {
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.sqlite")),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        self.path.with_extension("sqlite.tmp")
    }
}

impl ImageStore for FileImageStore {
    async fn load(&self) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save(&self, image: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Rename over the old image so a crash mid-write never leaves it torn.
        let staging = self.staging_path();
        tokio::fs::write(&staging, image).await?;
        tokio::fs::rename(&staging, &self.path).await
    }

    async fn clear(&self) -> io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// In-process image. Clones share the same slot, so a second `Database` opened
/// from a clone sees what the first one persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageStore {
    image: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryImageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_image(image: Vec<u8>) -> Self {
        Self {
            image: Arc::new(Mutex::new(Some(image))),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.image
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ImageStore for MemoryImageStore {
    async fn load(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.snapshot())
    }

    async fn save(&self, image: &[u8]) -> io::Result<()> {
        *self.image.lock().unwrap_or_else(PoisonError::into_inner) = Some(image.to_vec());
        Ok(())
    }

    async fn clear(&self) -> io::Result<()> {
        *self.image.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileImageStore::new(dir.path(), "bua");
        assert!(store.load().await.unwrap().is_none());

        store.save(b"first").await.unwrap();
        store.save(b"second").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some(&b"second"[..]));
        assert!(!store.staging_path().exists());

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        // Clearing twice is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_image() {
        let store = MemoryImageStore::new();
        let other = store.clone();
        store.save(b"abc").await.unwrap();
        assert_eq!(other.load().await.unwrap().as_deref(), Some(&b"abc"[..]));
    }
}
