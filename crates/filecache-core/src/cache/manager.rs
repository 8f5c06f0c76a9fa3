//! File cache implementation

use bytes::Bytes;
use filecache_storage::{StorageBackend, format_bytes};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::diagnostics::Snapshot;
use super::list::{Admission, LruIndex};
use super::stats::CacheStats;
use crate::error::CoreError;

/// Configuration for the file cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum total bytes of cached content
    pub max_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 64 * 1024 * 1024, // 64 MB
        }
    }
}

/// Size-bounded LRU cache of whole file contents
///
/// Hits are served from memory and promoted to most recently used. Misses
/// are fetched from the storage backend without holding the cache lock, so
/// concurrent misses for different files do not wait on each other's I/O.
/// Two concurrent misses for the same file both fetch it; the later insert
/// replaces the earlier one.
pub struct FileCache {
    storage: Arc<dyn StorageBackend>,
    config: CacheConfig,
    inner: Mutex<LruIndex>,
    stats: RwLock<CacheStats>,
}

impl FileCache {
    /// Create a new file cache
    pub fn new(storage: Arc<dyn StorageBackend>, config: CacheConfig) -> Self {
        info!(
            "Initializing file cache (max_size: {} bytes, storage: {})",
            config.max_size,
            storage.describe()
        );

        Self {
            storage,
            inner: Mutex::new(LruIndex::new(config.max_size)),
            config,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Create a cache holding at most `capacity` bytes
    pub fn with_capacity(storage: Arc<dyn StorageBackend>, capacity: u64) -> Self {
        Self::new(storage, CacheConfig { max_size: capacity })
    }

    /// Read the full content of `name`
    ///
    /// Content larger than the whole capacity is returned without being
    /// cached. On a storage failure the cache is left untouched.
    pub fn read(&self, name: &str) -> Result<Bytes, CoreError> {
        let hit = self.inner.lock().get(name);
        if let Some(content) = hit {
            debug!("Cache hit: {} ({} bytes)", name, content.len());
            self.record_hit();
            return Ok(content);
        }

        self.record_miss();
        let content = match self.storage.read(name) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to fetch {}: {}", name, e);
                self.record_storage_error();
                return Err(CoreError::Storage(e));
            }
        };

        let (admission, total_size) = {
            let mut inner = self.inner.lock();
            let admission = inner.insert(name, content.clone());
            (admission, inner.total_size())
        };

        match admission {
            Admission::PassThrough => {
                debug!(
                    "Not caching {}: {} exceeds capacity {}",
                    name,
                    format_bytes(content.len() as u64),
                    format_bytes(self.config.max_size)
                );
                self.record_pass_through();
            }
            Admission::Cached {
                evicted,
                superseded,
            } => {
                if let Some(old_size) = superseded {
                    debug!("Replaced concurrently cached {} ({} bytes)", name, old_size);
                }
                for entry in &evicted {
                    debug!("Evicted {} ({} bytes)", entry.name, entry.size);
                }
                self.record_evictions(evicted.len() as u64, evicted.iter().map(|e| e.size).sum());
                debug!(
                    "Cached {} ({} bytes, total {}/{})",
                    name,
                    content.len(),
                    total_size,
                    self.config.max_size
                );
                metrics::gauge!("filecache_cached_bytes").set(total_size as f64);
            }
        }

        Ok(content)
    }

    /// Check if `name` is cached, without changing its recency
    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().contains(name)
    }

    /// Number of cached files
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Total bytes currently cached
    pub fn total_size(&self) -> u64 {
        self.inner.lock().total_size()
    }

    pub fn capacity(&self) -> u64 {
        self.config.max_size
    }

    /// Cached names, most recently used first
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().keys()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }

    /// Capture the cache structure for inspection
    pub fn diagnose(&self) -> Snapshot {
        Snapshot::capture(&self.inner.lock())
    }

    /// Write the current cache structure to the debug log
    pub fn dump(&self) {
        debug!("{}", self.diagnose());
    }

    fn record_hit(&self) {
        self.stats.write().hits += 1;
        metrics::counter!("filecache_hits_total").increment(1);
    }

    fn record_miss(&self) {
        self.stats.write().misses += 1;
        metrics::counter!("filecache_misses_total").increment(1);
    }

    fn record_pass_through(&self) {
        self.stats.write().pass_throughs += 1;
        metrics::counter!("filecache_passthrough_total").increment(1);
    }

    fn record_storage_error(&self) {
        self.stats.write().storage_errors += 1;
        metrics::counter!("filecache_storage_errors_total").increment(1);
    }

    fn record_evictions(&self, count: u64, bytes: u64) {
        if count == 0 {
            return;
        }
        {
            let mut stats = self.stats.write();
            stats.evictions += count;
            stats.evicted_bytes += bytes;
        }
        metrics::counter!("filecache_evictions_total").increment(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filecache_storage::{MemoryStorage, StorageError};
    use std::sync::Barrier;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::thread;

    fn setup(capacity: u64, files: &[(&str, usize)]) -> (Arc<MemoryStorage>, FileCache) {
        let storage = Arc::new(MemoryStorage::new());
        for (name, size) in files {
            storage.insert(*name, vec![name.as_bytes()[0]; *size]);
        }
        let cache = FileCache::with_capacity(storage.clone(), capacity);
        (storage, cache)
    }

    fn check(cache: &FileCache) {
        cache.inner.lock().assert_invariants();
    }

    fn read(cache: &FileCache, name: &str) -> Bytes {
        let content = cache.read(name).unwrap();
        check(cache);
        content
    }

    #[test]
    fn test_third_file_evicts_least_recent() {
        let (_, cache) = setup(100, &[("a", 40), ("b", 40), ("c", 40)]);

        read(&cache, "a");
        read(&cache, "b");
        read(&cache, "c");

        assert_eq!(cache.keys(), vec!["c", "b"]);
        assert!(!cache.contains("a"));
        assert_eq!(cache.total_size(), 80);
    }

    #[test]
    fn test_large_file_evicts_to_fit() {
        let (_, cache) = setup(100, &[("a", 60), ("b", 60)]);

        read(&cache, "a");
        read(&cache, "b");

        assert_eq!(cache.keys(), vec!["b"]);
        assert_eq!(cache.total_size(), 60);
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.stats().evicted_bytes, 60);
    }

    #[test]
    fn test_oversize_file_is_passed_through() {
        let (storage, cache) = setup(50, &[("x", 80)]);

        let content = read(&cache, "x");
        assert_eq!(content.len(), 80);
        assert!(content.iter().all(|b| *b == b'x'));
        assert!(cache.is_empty());
        assert_eq!(cache.total_size(), 0);

        // Never cached, no matter how often it is asked for
        read(&cache, "x");
        assert!(!cache.contains("x"));
        assert_eq!(storage.fetch_count("x"), 2);
        assert_eq!(cache.stats().pass_throughs, 2);
    }

    #[test]
    fn test_hit_protects_entry_from_eviction() {
        let (_, cache) = setup(100, &[("a", 30), ("b", 30), ("c", 50)]);

        read(&cache, "a");
        read(&cache, "b");
        read(&cache, "a");
        read(&cache, "c");

        assert_eq!(cache.keys(), vec!["c", "a"]);
        assert_eq!(cache.total_size(), 80);
    }

    #[test]
    fn test_hit_makes_entry_head_and_skips_storage() {
        let (storage, cache) = setup(100, &[("a", 10), ("b", 10), ("c", 10)]);
        for name in ["a", "b", "c"] {
            read(&cache, name);
        }

        for name in ["b", "a", "c", "a"] {
            read(&cache, name);
            assert_eq!(cache.keys()[0], name);
        }

        assert_eq!(storage.fetch_count("a"), 1);
        assert_eq!(storage.fetch_count("b"), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 4);
        assert_eq!(stats.misses, 3);
    }

    #[test]
    fn test_repeated_reads_return_identical_content() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert("data.bin", (0u8..=255).collect::<Vec<_>>());
        let cache = FileCache::with_capacity(storage.clone(), 1024);

        let first = read(&cache, "data.bin");
        let second = read(&cache, "data.bin");
        let third = read(&cache, "data.bin");
        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(first.len(), 256);
    }

    #[test]
    fn test_cached_content_survives_storage_changes() {
        let (storage, cache) = setup(100, &[("a", 10)]);
        read(&cache, "a");

        storage.insert("a", "rewritten");
        assert_eq!(read(&cache, "a").len(), 10);

        storage.remove("a");
        assert_eq!(read(&cache, "a").len(), 10);
    }

    #[test]
    fn test_storage_failure_leaves_cache_unchanged() {
        let (_, cache) = setup(100, &[("a", 30), ("b", 30)]);
        read(&cache, "a");
        read(&cache, "b");
        let before = cache.diagnose();

        let err = cache.read("missing").unwrap_err();
        check(&cache);
        let CoreError::Storage(inner) = &err;
        assert!(matches!(inner, StorageError::Open { .. }));
        assert_eq!(inner.name(), "missing");
        assert!(err.to_string().contains("missing"));

        assert_eq!(cache.diagnose(), before);
        assert_eq!(cache.stats().storage_errors, 1);
    }

    #[test]
    fn test_empty_file_is_cached() {
        let (storage, cache) = setup(100, &[("empty", 0)]);

        assert!(read(&cache, "empty").is_empty());
        assert!(cache.contains("empty"));
        read(&cache, "empty");
        assert_eq!(storage.fetch_count("empty"), 1);
    }

    #[test]
    fn test_file_exactly_at_capacity_is_cached() {
        let (_, cache) = setup(64, &[("a", 10), ("full", 64)]);
        read(&cache, "a");
        read(&cache, "full");

        assert_eq!(cache.keys(), vec!["full"]);
        assert_eq!(cache.total_size(), 64);
    }

    #[test]
    fn test_reads_through_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), b"<html></html>").unwrap();
        let storage = Arc::new(filecache_storage::LocalStorage::new(dir.path()).unwrap());
        let cache = FileCache::with_capacity(storage, 1024);

        assert_eq!(read(&cache, "index.html"), Bytes::from_static(b"<html></html>"));

        // Served from memory once cached
        std::fs::remove_file(dir.path().join("index.html")).unwrap();
        assert_eq!(read(&cache, "index.html").len(), 13);

        let err = cache.read("style.css").unwrap_err();
        let CoreError::Storage(inner) = &err;
        assert!(inner.is_not_found());
        assert_eq!(cache.keys(), vec!["index.html"]);
    }

    #[test]
    fn test_diagnose_reports_structure() {
        let (_, cache) = setup(100, &[("a", 10), ("b", 20)]);
        read(&cache, "a");
        read(&cache, "b");
        cache.dump();

        let snapshot = cache.diagnose();
        assert_eq!(snapshot.capacity, 100);
        assert_eq!(snapshot.total_size, 30);
        assert_eq!(snapshot.index_len, 2);
        assert_eq!(snapshot.entries[0].name, "b");
        assert_eq!(snapshot.entries[1].name, "a");
    }

    #[test]
    fn test_concurrent_readers_keep_invariants() {
        let names: Vec<String> = (0..24).map(|i| format!("file-{i}")).collect();
        let storage = Arc::new(MemoryStorage::new());
        for (i, name) in names.iter().enumerate() {
            storage.insert(name.clone(), vec![i as u8; 8 + (i % 5) * 9]);
        }
        let cache = FileCache::with_capacity(storage.clone(), 200);

        thread::scope(|s| {
            for t in 0..8 {
                let cache = &cache;
                let names = &names;
                s.spawn(move || {
                    for step in 0..500 {
                        let i = (step * 7 + t * 13) % names.len();
                        let content = cache.read(&names[i]).unwrap();
                        assert_eq!(content.len(), 8 + (i % 5) * 9);
                        assert!(content.iter().all(|b| *b == i as u8));
                    }
                });
            }
        });

        check(&cache);
        assert!(cache.total_size() <= 200);
        let stats = cache.stats();
        assert_eq!(stats.total_reads(), 8 * 500);
    }

    /// Holds every fetch at a barrier so two readers are both mid-fetch
    struct RendezvousStorage {
        inner: MemoryStorage,
        barrier: Barrier,
    }

    impl StorageBackend for RendezvousStorage {
        fn exists(&self, name: &str) -> Result<bool, StorageError> {
            self.inner.exists(name)
        }

        fn size(&self, name: &str) -> Result<u64, StorageError> {
            self.inner.size(name)
        }

        fn read(&self, name: &str) -> Result<Bytes, StorageError> {
            let content = self.inner.read(name);
            self.barrier.wait();
            content
        }

        fn describe(&self) -> String {
            "rendezvous".to_string()
        }
    }

    #[test]
    fn test_concurrent_misses_on_same_name_both_fetch() {
        let storage = Arc::new(RendezvousStorage {
            inner: MemoryStorage::new(),
            barrier: Barrier::new(2),
        });
        storage.inner.insert("shared", vec![7u8; 40]);
        let cache = FileCache::with_capacity(storage.clone(), 100);

        thread::scope(|s| {
            let a = s.spawn(|| cache.read("shared").unwrap());
            let b = s.spawn(|| cache.read("shared").unwrap());
            assert_eq!(a.join().unwrap().len(), 40);
            assert_eq!(b.join().unwrap().len(), 40);
        });

        check(&cache);
        assert_eq!(storage.inner.fetch_count("shared"), 2);
        assert_eq!(cache.keys(), vec!["shared"]);
        assert_eq!(cache.total_size(), 40);
    }

    /// Blocks fetches of one name until the test releases it
    struct GatedStorage {
        inner: MemoryStorage,
        gated: &'static str,
        entered: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl StorageBackend for GatedStorage {
        fn exists(&self, name: &str) -> Result<bool, StorageError> {
            self.inner.exists(name)
        }

        fn size(&self, name: &str) -> Result<u64, StorageError> {
            self.inner.size(name)
        }

        fn read(&self, name: &str) -> Result<Bytes, StorageError> {
            if name == self.gated {
                self.entered.lock().send(()).unwrap();
                self.release.lock().recv().unwrap();
            }
            self.inner.read(name)
        }

        fn describe(&self) -> String {
            "gated".to_string()
        }
    }

    #[test]
    fn test_slow_fetch_does_not_block_other_readers() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let storage = Arc::new(GatedStorage {
            inner: MemoryStorage::new(),
            gated: "slow",
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        storage.inner.insert("slow", vec![1u8; 10]);
        storage.inner.insert("hot", vec![2u8; 10]);
        storage.inner.insert("cold", vec![3u8; 10]);
        let cache = FileCache::with_capacity(storage.clone(), 100);
        cache.read("hot").unwrap();

        thread::scope(|s| {
            let slow = s.spawn(|| cache.read("slow").unwrap());
            entered_rx.recv().unwrap();

            // The slow fetch is parked inside storage, outside the cache lock
            assert_eq!(cache.read("hot").unwrap().len(), 10);
            assert_eq!(cache.read("cold").unwrap().len(), 10);
            assert!(!cache.contains("slow"));

            release_tx.send(()).unwrap();
            assert_eq!(slow.join().unwrap().len(), 10);
        });

        check(&cache);
        assert_eq!(cache.keys(), vec!["slow", "cold", "hot"]);
    }
}
