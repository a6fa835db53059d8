//! Thread-safe, size-bounded decoded-tile cache
//!
//! Structurally the same shape as a whole-slide tile cache: `DashMap` for
//! lock-free concurrent reads, a mutex-protected queue for eviction order,
//! atomics for size/stat bookkeeping. Two differences from that shape,
//! both spec-driven: eviction is strict FIFO by insertion order rather than
//! LRU (a `get` never reorders the queue), and concurrent decode of the
//! *same* tile is serialized through a per-key mutex obtained via
//! `DashMap::entry`, so two readers racing on one tile decode it once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Identifies one decoded tile: which IFD it belongs to (the IFD's file
/// offset stands in for identity, since two IFDs never share an offset),
/// which plane (for planar images), and its linear tile-grid index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub ifd_identity: u64,
    pub plane: u64,
    pub linear_index: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size_bytes: usize,
    pub num_tiles: usize,
}

/// A callback invoked just before a tile is evicted, so a caller can, e.g.,
/// warn when a frequently-reused tile falls out of cache. This is the
/// Rust-native reinterpretation of a "soft reference" cache entry: there is
/// no GC to hook into, so eviction calls out explicitly instead.
pub type EvictionCallback = Box<dyn Fn(&TileKey) + Send + Sync>;

pub struct TileCache {
    tiles: DashMap<TileKey, Arc<Vec<u8>>>,
    insertion_order: Mutex<VecDeque<TileKey>>,
    decode_locks: DashMap<TileKey, Arc<Mutex<()>>>,
    max_size_bytes: usize,
    current_size: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    on_evict: Option<EvictionCallback>,
}

impl TileCache {
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            tiles: DashMap::new(),
            insertion_order: Mutex::new(VecDeque::new()),
            decode_locks: DashMap::new(),
            max_size_bytes,
            current_size: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            on_evict: None,
        }
    }

    pub fn with_eviction_callback(mut self, callback: EvictionCallback) -> Self {
        self.on_evict = Some(callback);
        self
    }

    /// Returns the cached tile, if present, without disturbing eviction order.
    pub fn get(&self, key: &TileKey) -> Option<Arc<Vec<u8>>> {
        match self.tiles.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts a tile, evicting the oldest-inserted entries first until the
    /// byte budget is satisfied.
    pub fn insert(&self, key: TileKey, data: Vec<u8>) {
        if self.tiles.contains_key(&key) {
            return;
        }
        let size = data.len();
        self.evict_if_needed(size);

        self.tiles.insert(key, Arc::new(data));
        self.current_size.fetch_add(size, Ordering::Relaxed);
        self.insertion_order.lock().push_back(key);
    }

    /// Fetches a tile from cache, or decodes it via `decode` and caches the
    /// result. Concurrent calls for the *same* key block on each other
    /// rather than decoding redundantly; calls for different keys proceed
    /// concurrently.
    pub fn get_or_decode<F>(&self, key: TileKey, decode: F) -> crate::tiff::errors::TiffResult<Arc<Vec<u8>>>
    where
        F: FnOnce() -> crate::tiff::errors::TiffResult<Vec<u8>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let lock = self
            .decode_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock();

        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let decoded = decode()?;
        self.insert(key, decoded);
        Ok(self.get(&key).expect("just inserted"))
    }

    fn evict_if_needed(&self, incoming_size: usize) {
        let target = self.max_size_bytes.saturating_sub(incoming_size);
        while self.current_size.load(Ordering::Relaxed) > target {
            let evicted = self.insertion_order.lock().pop_front();
            match evicted {
                Some(key) => {
                    if let Some((_, tile)) = self.tiles.remove(&key) {
                        self.current_size.fetch_sub(tile.len(), Ordering::Relaxed);
                        if let Some(cb) = &self.on_evict {
                            cb(&key);
                        }
                    }
                }
                None => break,
            }
        }
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.tiles.contains_key(key)
    }

    pub fn clear(&self) {
        self.tiles.clear();
        self.insertion_order.lock().clear();
        self.current_size.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size_bytes: self.current_size.load(Ordering::Relaxed),
            num_tiles: self.tiles.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u64) -> TileKey {
        TileKey { ifd_identity: 0, plane: 0, linear_index: n }
    }

    #[test]
    fn insert_and_get_round_trips() {
        let cache = TileCache::new(1024);
        cache.insert(key(0), vec![1, 2, 3]);
        assert_eq!(*cache.get(&key(0)).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn eviction_is_fifo_not_lru() {
        let cache = TileCache::new(20);
        cache.insert(key(0), vec![0u8; 10]);
        cache.insert(key(1), vec![0u8; 10]);
        // Touch key(0) — FIFO eviction must still evict it first since LRU
        // reordering does not apply here.
        cache.get(&key(0));
        cache.insert(key(2), vec![0u8; 10]);

        assert!(cache.get(&key(0)).is_none(), "oldest-inserted entry must be evicted regardless of recent access");
        assert!(cache.get(&key(1)).is_some());
        assert!(cache.get(&key(2)).is_some());
    }

    #[test]
    fn get_or_decode_only_decodes_once_per_key() {
        let cache = TileCache::new(1024);
        let calls = std::sync::atomic::AtomicUsize::new(0);
        for _ in 0..3 {
            cache
                .get_or_decode(key(5), || {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Ok(vec![9u8; 4])
                })
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn clear_resets_size_and_contents() {
        let cache = TileCache::new(1024);
        cache.insert(key(0), vec![1, 2, 3]);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().size_bytes, 0);
    }
}
