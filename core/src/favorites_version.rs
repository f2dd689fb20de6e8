//! Logical clock for the favorites list.
//!
//! Readers remember the version they fetched at and refetch when it moves.
//! It orders reads against writes; it does not lock anything.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct FavoritesVersion {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for FavoritesVersion {
    fn default() -> Self {
        Self::new()
    }
}

impl FavoritesVersion {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Advance the clock. Every receiver is notified.
    pub fn invalidate(&self) -> u64 {
        self.tx.send_modify(|v| *v += 1);
        self.current()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

/// A value remembered together with the version it was fetched at.
#[derive(Debug, Clone)]
pub struct VersionedCache<T> {
    entry: Option<(u64, T)>,
}

impl<T> Default for VersionedCache<T> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<T: Clone> VersionedCache<T> {
    /// Return the cached value if it was fetched at `version`, otherwise fetch and remember it.
    pub fn get_or_refresh<E>(
        &mut self,
        version: u64,
        fetch: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        if let Some((v, ref value)) = self.entry {
            if v == version {
                return Ok(value.clone());
            }
        }
        let value = fetch()?;
        self.entry = Some((version, value.clone()));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_increments() {
        let version = FavoritesVersion::new();
        assert_eq!(version.current(), 0);
        assert_eq!(version.invalidate(), 1);
        let clone = version.clone();
        clone.invalidate();
        assert_eq!(version.current(), 2);
    }

    #[tokio::test]
    async fn test_subscriber_sees_bump() {
        let version = FavoritesVersion::new();
        let mut rx = version.subscribe();
        version.invalidate();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[test]
    fn test_cache_refetches_only_when_version_moves() {
        let mut cache = VersionedCache::default();
        let mut fetches = 0;
        let mut fetch = |n: u32| {
            fetches += 1;
            Ok::<_, ()>(n)
        };

        assert_eq!(cache.get_or_refresh(0, || fetch(10)).unwrap(), 10);
        assert_eq!(cache.get_or_refresh(0, || fetch(20)).unwrap(), 10);
        assert_eq!(cache.get_or_refresh(1, || fetch(30)).unwrap(), 30);
        assert_eq!(fetches, 2);
    }
}
