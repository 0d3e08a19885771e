//! Bounded LRU cache of decoded tracks with a bypass denylist
//!
//! Keys are resolved local paths. A denylisted path is always decoded fresh
//! and never stored; taking a path off the denylist drops whatever was cached
//! for it before.

use super::{AudioLoader, Track};
use crate::error::Result;
use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// How a decode request was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    /// Decoded and stored
    Miss,
    /// Decoded fresh because the path is denylisted
    Bypassed,
}

pub struct DecodeCache<L> {
    loader: L,
    /// `None` when the configured capacity is zero
    entries: Option<Mutex<LruCache<PathBuf, Arc<Track>>>>,
    denylist: Mutex<HashSet<PathBuf>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<L: AudioLoader> DecodeCache<L> {
    /// Cache holding at most `capacity` tracks; zero disables storage
    pub fn new(loader: L, capacity: usize) -> Self {
        Self {
            loader,
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            denylist: Mutex::new(HashSet::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .as_ref()
            .map(|entries| locked(entries).cap().get())
            .unwrap_or(0)
    }

    /// Decoded track for `path`, from the cache unless denylisted
    pub fn decode(&self, path: &Path) -> Result<(Arc<Track>, CacheOutcome)> {
        if self.is_denied(path) {
            debug!("Decode cache bypassed for {}", path.display());
            let track = Arc::new(self.loader.load(path)?);
            return Ok((track, CacheOutcome::Bypassed));
        }

        if let Some(entries) = &self.entries {
            if let Some(track) = locked(entries).get(path).cloned() {
                return Ok((track, CacheOutcome::Hit));
            }
        }

        // decode without holding the lock
        let track = Arc::new(self.loader.load(path)?);
        if let Some(entries) = &self.entries {
            if let Some((evicted, _)) = locked(entries).push(path.to_path_buf(), Arc::clone(&track)) {
                if evicted != path {
                    debug!("Evicted decoded track {}", evicted.display());
                }
            }
        }
        Ok((track, CacheOutcome::Miss))
    }

    /// Always decode `path` fresh from now on
    pub fn deny(&self, path: &Path) {
        locked(&self.denylist).insert(path.to_path_buf());
        self.invalidate(path);
    }

    /// Re-enable caching for `path`, dropping any stale entry
    pub fn allow(&self, path: &Path) {
        locked(&self.denylist).remove(path);
        self.invalidate(path);
    }

    fn invalidate(&self, path: &Path) {
        if let Some(entries) = &self.entries {
            locked(entries).pop(path);
        }
    }

    pub fn is_denied(&self, path: &Path) -> bool {
        locked(&self.denylist).contains(path)
    }

    pub fn is_cached(&self, path: &Path) -> bool {
        self.entries
            .as_ref()
            .map(|entries| locked(entries).contains(path))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map(|entries| locked(entries).len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            locked(entries).clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts loads; each load returns a distinct first sample
    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
    }

    impl AudioLoader for CountingLoader {
        fn load(&self, _path: &Path) -> Result<Track> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Track {
                samples: vec![n as f32],
                sample_rate: 8000,
                channels: 1,
            })
        }
    }

    #[test]
    fn test_lru_eviction_keeps_recent() {
        let cache = DecodeCache::new(CountingLoader::default(), 2);
        let (a, b, c) = (Path::new("/a.wav"), Path::new("/b.wav"), Path::new("/c.wav"));
        cache.decode(a).unwrap();
        cache.decode(b).unwrap();
        // touch a so b is least recent
        assert_eq!(cache.decode(a).unwrap().1, CacheOutcome::Hit);
        cache.decode(c).unwrap();

        assert!(cache.is_cached(a));
        assert!(!cache.is_cached(b));
        assert!(cache.is_cached(c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_never_stores() {
        let cache = DecodeCache::new(CountingLoader::default(), 0);
        let path = Path::new("/a.wav");
        assert_eq!(cache.decode(path).unwrap().1, CacheOutcome::Miss);
        assert_eq!(cache.decode(path).unwrap().1, CacheOutcome::Miss);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 0);
    }

    #[test]
    fn test_deny_drops_existing_entry() {
        let cache = DecodeCache::new(CountingLoader::default(), 4);
        let path = Path::new("/a.wav");
        cache.decode(path).unwrap();
        cache.deny(path);
        assert!(!cache.is_cached(path));
        assert_eq!(cache.decode(path).unwrap().1, CacheOutcome::Bypassed);
        assert!(!cache.is_cached(path));
    }
}
