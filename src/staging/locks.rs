//! Keyed locks serializing writes to the same path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// Set of per-path mutexes, created on demand and dropped when unused.
#[derive(Debug, Default)]
pub struct PathLocks {
    entries: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run `f` while holding the lock for `path`.
    pub fn with_lock<R>(&self, path: &Path, f: impl FnOnce() -> R) -> R {
        let entry = {
            let mut entries = self.entries.lock();
            Arc::clone(entries.entry(path.to_path_buf()).or_default())
        };

        let result = {
            let _guard = entry.lock();
            f()
        };

        let mut entries = self.entries.lock();
        // One reference in the map, one held here: nobody else is waiting.
        if Arc::strong_count(&entry) == 2 {
            entries.remove(path);
        }

        result
    }

    /// Number of paths currently locked or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_lock_entry_removed_after_use() {
        let locks = PathLocks::new();
        let value = locks.with_lock(Path::new("/a"), || 7);
        assert_eq!(value, 7);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_same_path_is_serialized() {
        let locks = PathLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let overlaps = Arc::clone(&overlaps);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        locks.with_lock(Path::new("/shared"), || {
                            if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            std::thread::yield_now();
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert!(locks.is_empty());
    }
}
