use std::fs;
use std::io::{self, Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use lru::LruCache;
use tempfile::NamedTempFile;

use crate::core::config::CacheConfig;
use crate::core::geo::TileKey;
use crate::prelude::HashMap;
use crate::Result;

/// Keys whose cache file is being written right now.
///
/// A key is registered before its write starts and released when the
/// returned guard drops, whether the write succeeded or not. Overlapping
/// writes of the same key are counted so the key stays pending until the
/// last one finishes.
#[derive(Debug, Default)]
pub struct PendingWriteSet {
    keys: Mutex<HashMap<TileKey, usize>>,
}

impl PendingWriteSet {
    fn lock(&self) -> MutexGuard<'_, HashMap<TileKey, usize>> {
        // A panic while holding the lock leaves the map consistent
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin(&self, key: TileKey) -> PendingWrite<'_> {
        *self.lock().entry(key).or_insert(0) += 1;
        PendingWrite { set: self, key }
    }

    fn finish(&self, key: &TileKey) {
        let mut keys = self.lock();
        if let Some(count) = keys.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                keys.remove(key);
            }
        }
    }
}

pub(crate) struct PendingWrite<'a> {
    set: &'a PendingWriteSet,
    key: TileKey,
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        self.set.finish(&self.key);
    }
}

/// Counters describing cache effectiveness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub memory_hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub write_failures: u64,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    memory_hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
}

/// Disk-backed, gzip-compressed tile store, safe to share between many
/// in-flight tile requests.
///
/// Files live at `{root}/{zoom}/{x}_{y}.gz`. Writes go to a temp file in the
/// same directory and are renamed into place, and lookups of a key that is
/// still being written report a miss without touching the disk. Every I/O
/// failure is logged and degrades to a miss or a skipped write.
#[derive(Debug)]
pub struct TileCache {
    root: Arc<PathBuf>,
    pending: Arc<PendingWriteSet>,
    /// Optional hot tier of decompressed tiles
    memory: Option<Arc<Mutex<LruCache<TileKey, Arc<Vec<u8>>>>>>,
    /// Bumped by `clear`; memory inserts from an older generation are dropped
    generation: Arc<AtomicU64>,
    counters: Arc<CacheCounters>,
}

impl TileCache {
    /// Open (and create if needed) a cache rooted at `root` with no memory tier
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::new(&CacheConfig::at(root))
    }

    pub fn new(config: &CacheConfig) -> Result<Self> {
        fs::create_dir_all(&config.root)?;
        log::debug!("tile cache ready at {}", config.root.display());

        let memory = NonZeroUsize::new(config.memory_capacity)
            .map(|capacity| Arc::new(Mutex::new(LruCache::new(capacity))));

        Ok(Self {
            root: Arc::new(config.root.clone()),
            pending: Arc::new(PendingWriteSet::default()),
            memory,
            generation: Arc::new(AtomicU64::new(0)),
            counters: Arc::new(CacheCounters::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the cache file for `key`
    pub fn path_for(&self, key: &TileKey) -> PathBuf {
        self.root
            .join(key.zoom.to_string())
            .join(key.cache_file_name())
    }

    /// Whether a write of `key` is in flight
    pub fn is_pending(&self, key: &TileKey) -> bool {
        self.pending.contains(key)
    }

    /// Number of keys currently being written
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Get a tile from the cache. Pending keys, missing files and unreadable
    /// files are all misses.
    pub fn get(&self, key: &TileKey) -> Option<Arc<Vec<u8>>> {
        if self.is_pending(key) {
            log::debug!("tile {} is being written, treating as miss", key);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        if let Some(data) = self.memory_get(key) {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Some(data);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let path = self.path_for(key);
        match read_compressed(&path) {
            Ok(bytes) => {
                log::debug!("cache hit for tile {} ({} bytes)", key, bytes.len());
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                let data = Arc::new(bytes);
                self.memory_put(generation, *key, Arc::clone(&data));
                Some(data)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("cache miss for tile {}", key);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                log::warn!(
                    "failed to read cache file {}: {}. File might be corrupt",
                    path.display(),
                    e
                );
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Compress and store a tile, replacing any previous entry wholesale.
    /// Returns whether the entry was written.
    pub fn put(&self, key: TileKey, data: &[u8]) -> bool {
        let _pending = self.pending.begin(key);
        let generation = self.generation.load(Ordering::Acquire);
        let path = self.path_for(&key);

        match write_compressed(&path, data) {
            Ok(()) => {
                log::debug!("cached tile {} at {}", key, path.display());
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
                self.memory_put(generation, key, Arc::new(data.to_vec()));
                true
            }
            Err(e) => {
                log::warn!("failed to write cache file {}: {}", path.display(), e);
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Check if a complete entry for `key` is on disk
    pub fn contains(&self, key: &TileKey) -> bool {
        !self.is_pending(key) && self.path_for(key).is_file()
    }

    /// Delete every cached tile and recreate the empty root directory
    pub fn clear(&self) {
        // Held for the whole clear so no stale tile is re-inserted midway
        let memory = self
            .memory
            .as_ref()
            .map(|memory| memory.lock().unwrap_or_else(PoisonError::into_inner));
        self.generation.fetch_add(1, Ordering::AcqRel);

        match fs::remove_dir_all(self.root.as_path()) {
            Ok(()) => log::info!("tile cache cleared at {}", self.root.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("error clearing cache {}: {}", self.root.display(), e),
        }

        if let Err(e) = fs::create_dir_all(self.root.as_path()) {
            log::warn!(
                "failed to recreate cache directory {}: {}",
                self.root.display(),
                e
            );
        }

        if let Some(mut memory) = memory {
            memory.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    fn memory_get(&self, key: &TileKey) -> Option<Arc<Vec<u8>>> {
        self.memory.as_ref()?.lock().ok()?.get(key).cloned()
    }

    /// Insert into the memory tier unless a `clear` happened since
    /// `generation` was read
    fn memory_put(&self, generation: u64, key: TileKey, data: Arc<Vec<u8>>) {
        if let Some(memory) = &self.memory {
            if let Ok(mut memory) = memory.lock() {
                if self.generation.load(Ordering::Acquire) == generation {
                    memory.put(key, data);
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn hold_pending(&self, key: TileKey) -> PendingWrite<'_> {
        self.pending.begin(key)
    }
}

impl Clone for TileCache {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            pending: Arc::clone(&self.pending),
            memory: self.memory.clone(),
            generation: Arc::clone(&self.generation),
            counters: Arc::clone(&self.counters),
        }
    }
}

fn read_compressed(path: &Path) -> io::Result<Vec<u8>> {
    let file = fs::File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn write_compressed(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "cache path has no parent"))?;
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut encoder = GzEncoder::new(temp.as_file_mut(), Compression::default());
        encoder.write_all(data)?;
        encoder.finish()?;
    }
    temp.as_file().sync_data()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> (tempfile::TempDir, TileCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::open(dir.path().join("tiles")).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let (_dir, cache) = cache();
        let key = TileKey::new(25837, 16267, 15);
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

        assert!(cache.put(key, &data));
        assert_eq!(cache.get(&key).as_deref(), Some(&data));
        assert!(cache.contains(&key));
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn test_unknown_key_is_miss() {
        let (_dir, cache) = cache();
        assert!(cache.get(&TileKey::new(1, 2, 3)).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_entries_are_gzip_on_disk() {
        let (_dir, cache) = cache();
        let key = TileKey::new(7, 9, 15);
        let data = vec![0u8; 10_000];
        cache.put(key, &data);

        let raw = fs::read(cache.path_for(&key)).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
        assert!(raw.len() < data.len());
        assert!(cache.path_for(&key).ends_with("15/7_9.gz"));
    }

    #[test]
    fn test_pending_key_is_miss() {
        let (_dir, cache) = cache();
        let key = TileKey::new(4, 4, 15);
        cache.put(key, b"tile");

        let guard = cache.pending.begin(key);
        assert!(cache.is_pending(&key));
        assert!(cache.get(&key).is_none());
        assert!(!cache.contains(&key));
        drop(guard);

        assert_eq!(cache.get(&key).as_deref().map(Vec::as_slice), Some(&b"tile"[..]));
    }

    #[test]
    fn test_overlapping_writes_keep_key_pending() {
        let set = PendingWriteSet::default();
        let key = TileKey::new(1, 1, 1);
        let first = set.begin(key);
        let second = set.begin(key);
        drop(first);
        assert!(set.contains(&key));
        drop(second);
        assert!(set.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_miss() {
        let (_dir, cache) = cache();
        let key = TileKey::new(3, 3, 15);
        let path = cache.path_for(&key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"definitely not gzip").unwrap();

        assert!(cache.get(&key).is_none());

        // A later put heals the entry
        assert!(cache.put(key, b"fresh"));
        assert_eq!(cache.get(&key).as_deref().map(Vec::as_slice), Some(&b"fresh"[..]));
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let (_dir, cache) = cache();
        let key = TileKey::new(5, 6, 15);
        cache.put(key, b"old");
        cache.put(key, b"new bytes");
        assert_eq!(cache.get(&key).as_deref().map(Vec::as_slice), Some(&b"new bytes"[..]));
    }

    #[test]
    fn test_clear_recreates_root() {
        let (_dir, cache) = cache();
        let key = TileKey::new(1, 2, 15);
        cache.put(key, b"data");

        cache.clear();
        assert!(cache.root().is_dir());
        assert!(cache.get(&key).is_none());

        // The cache is still usable afterwards
        assert!(cache.put(key, b"again"));
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_write_failure_is_logged_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tiles");
        let cache = TileCache::open(&root).unwrap();
        // A regular file where the zoom directory should be
        fs::write(root.join("15"), b"blocker").unwrap();

        let key = TileKey::new(1, 1, 15);
        assert!(!cache.put(key, b"data"));
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().write_failures, 1);
        assert!(!cache.is_pending(&key));

        // Other zoom levels are unaffected
        assert!(cache.put(TileKey::new(1, 1, 14), b"ok"));
    }

    #[test]
    fn test_memory_tier_serves_repeat_reads() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(&CacheConfig {
            root: dir.path().to_path_buf(),
            memory_capacity: 2,
        })
        .unwrap();
        let key = TileKey::new(8, 8, 15);
        cache.put(key, b"hot");

        // Removing the file shows the second read came from memory
        fs::remove_file(cache.path_for(&key)).unwrap();
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.stats().memory_hits, 1);
    }

    #[test]
    fn test_read_racing_clear_does_not_resurrect_tile() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(&CacheConfig {
            root: dir.path().to_path_buf(),
            memory_capacity: 4,
        })
        .unwrap();
        let key = TileKey::new(9, 9, 15);
        cache.put(key, b"stale");

        // A reader that loaded the file just before the clear
        let seen = cache.generation.load(Ordering::Acquire);
        cache.clear();
        cache.memory_put(seen, key, Arc::new(b"stale".to_vec()));

        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().memory_hits, 0);

        // Inserts after the clear still reach the memory tier
        cache.put(key, b"fresh");
        fs::remove_file(cache.path_for(&key)).unwrap();
        assert_eq!(cache.get(&key).as_deref().map(Vec::as_slice), Some(&b"fresh"[..]));
    }
}
