#[cfg(feature = "tokio-runtime")]
use crossbeam_channel::{unbounded, Receiver};
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;

use super::cache::TileCache;
use crate::core::config::TileFetchConfig;
use crate::core::geo::{TileGrid, TileKey};
use crate::runtime::async_utils::{async_delay, run_blocking};
use crate::traits::TileFetcher;
use crate::Result;

/// Where a delivered tile came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOrigin {
    Cache,
    Remote,
}

#[derive(Debug, Clone)]
pub struct TileData {
    pub bytes: Arc<Vec<u8>>,
    pub origin: TileOrigin,
}

/// Outcome of one grid cell. Failures are per tile and never abort the grid.
#[derive(Debug)]
pub struct TileResult {
    pub key: TileKey,
    pub data: Result<TileData>,
}

impl TileResult {
    pub fn is_ok(&self) -> bool {
        self.data.is_ok()
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.data.as_ref().ok().map(|d| d.bytes.as_slice())
    }

    pub fn origin(&self) -> Option<TileOrigin> {
        self.data.as_ref().ok().map(|d| d.origin)
    }
}

/// Loads every cell of a tile grid, serving cache hits directly and
/// populating the cache from the remote fetcher on misses.
///
/// Requests are paced: after every `batch_pace_size` issued requests the
/// coordinator waits `pace_delay` before issuing more. At most
/// `max_concurrent` tiles are in flight at once, and completion order across
/// cells is unspecified.
pub struct TileFetchCoordinator {
    cache: TileCache,
    fetcher: Arc<dyn TileFetcher>,
    config: TileFetchConfig,
}

impl TileFetchCoordinator {
    pub fn new(cache: TileCache, fetcher: Arc<dyn TileFetcher>, config: TileFetchConfig) -> Self {
        Self {
            cache,
            fetcher,
            config,
        }
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn config(&self) -> &TileFetchConfig {
        &self.config
    }

    /// Load one tile, cache first
    pub async fn load_tile(&self, key: TileKey) -> TileResult {
        let cache = self.cache.clone();
        match run_blocking(move || cache.get(&key)).await {
            Ok(Some(bytes)) => {
                return TileResult {
                    key,
                    data: Ok(TileData {
                        bytes,
                        origin: TileOrigin::Cache,
                    }),
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("cache lookup for tile {} failed: {}", key, e),
        }

        let bytes = match self.fetch_with_retry(key).await {
            Ok(bytes) => Arc::new(bytes),
            Err(e) => return TileResult { key, data: Err(e) },
        };

        // Another fetch of the same key is already writing it
        if self.cache.is_pending(&key) {
            log::debug!("tile {} already being cached, skipping write", key);
        } else {
            let cache = self.cache.clone();
            let to_write = Arc::clone(&bytes);
            if let Err(e) = run_blocking(move || cache.put(key, &to_write)).await {
                log::warn!("cache write for tile {} failed: {}", key, e);
            }
        }

        TileResult {
            key,
            data: Ok(TileData {
                bytes,
                origin: TileOrigin::Remote,
            }),
        }
    }

    /// Stream of results for every cell of `grid`, in completion order
    pub fn grid_stream(&self, grid: TileGrid) -> impl Stream<Item = TileResult> + '_ {
        let keys: Vec<TileKey> = grid.iter().collect();
        let pace_every = self.config.batch_pace_size.max(1);
        let pace_delay = self.config.pace_delay();

        log::info!(
            "loading {} tiles at zoom {} ({} in flight max)",
            keys.len(),
            grid.zoom,
            self.config.max_concurrent
        );

        stream::iter(keys.into_iter().enumerate())
            .then(move |(issued, key)| async move {
                if issued > 0 && issued % pace_every == 0 {
                    log::debug!("issued {} tile requests, pausing {:?}", issued, pace_delay);
                    async_delay(pace_delay).await;
                }
                key
            })
            .map(move |key| self.load_tile(key))
            .buffer_unordered(self.config.max_concurrent.max(1))
    }

    /// Load the whole grid and collect every outcome
    pub async fn load_grid(&self, grid: TileGrid) -> Vec<TileResult> {
        self.grid_stream(grid).collect().await
    }

    /// Load the grid on a background task, delivering results over a channel
    /// as they complete. Dropping the receiver does not stop the load, so
    /// fetched tiles still land in the cache.
    #[cfg(feature = "tokio-runtime")]
    pub fn spawn_grid(self: &Arc<Self>, grid: TileGrid) -> Receiver<TileResult> {
        let (tx, rx) = unbounded();
        let this = Arc::clone(self);

        // Detached: the task runs to completion on its own
        let _handle = crate::runtime::spawn(async move {
            let results = this.grid_stream(grid);
            futures::pin_mut!(results);

            let mut delivered = 0usize;
            let mut failed = 0usize;
            while let Some(result) = results.next().await {
                if !result.is_ok() {
                    failed += 1;
                }
                delivered += 1;
                let _ = tx.send(result);
            }
            log::info!("grid load finished: {} tiles, {} failed", delivered, failed);
        });

        rx
    }

    async fn fetch_with_retry(&self, key: TileKey) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch_tile(key).await {
                Ok(bytes) => {
                    log::debug!("fetched tile {} ({} bytes)", key, bytes.len());
                    return Ok(bytes);
                }
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    log::warn!("tile {} fetch failed on attempt {}: {}", key, attempt, e);
                    async_delay(self.config.retry_delay()).await;
                }
                Err(e) => {
                    log::warn!("giving up on tile {}: {}", key, e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then serves the key as bytes
    struct FlakyFetcher {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TileFetcher for FlakyFetcher {
        async fn fetch_tile(&self, key: TileKey) -> Result<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(MapError::Api("flaky".into()));
            }
            Ok(key.to_string().into_bytes())
        }
    }

    fn coordinator(failures: usize, max_retries: usize) -> (tempfile::TempDir, TileFetchCoordinator, Arc<FlakyFetcher>) {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::open(dir.path()).unwrap();
        let fetcher = Arc::new(FlakyFetcher {
            failures,
            calls: AtomicUsize::new(0),
        });
        let config = TileFetchConfig {
            max_retries,
            ..TileFetchConfig::for_testing()
        };
        let coordinator = TileFetchCoordinator::new(cache, fetcher.clone(), config);
        (dir, coordinator, fetcher)
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let (_dir, coordinator, fetcher) = coordinator(1, 1);
        let result = coordinator.load_tile(TileKey::new(1, 2, 15)).await;
        assert_eq!(result.origin(), Some(TileOrigin::Remote));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_without_retries_is_reported() {
        let (_dir, coordinator, fetcher) = coordinator(1, 0);
        let key = TileKey::new(1, 2, 15);
        let result = coordinator.load_tile(key).await;
        assert!(!result.is_ok());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.cache().get(&key).is_none());
    }

    #[tokio::test]
    async fn test_second_load_is_served_from_cache() {
        let (_dir, coordinator, fetcher) = coordinator(0, 0);
        let key = TileKey::new(3, 4, 15);

        let first = coordinator.load_tile(key).await;
        assert_eq!(first.origin(), Some(TileOrigin::Remote));

        let second = coordinator.load_tile(key).await;
        assert_eq!(second.origin(), Some(TileOrigin::Cache));
        assert_eq!(second.bytes(), Some("15/3/4".as_bytes()));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pending_key_skips_cache_write() {
        let (_dir, coordinator, fetcher) = coordinator(0, 0);
        let key = TileKey::new(5, 6, 15);

        // Another writer holds the key for the whole load
        let other_writer = coordinator.cache().hold_pending(key);
        let result = coordinator.load_tile(key).await;
        assert_eq!(result.origin(), Some(TileOrigin::Remote));
        assert_eq!(result.bytes(), Some("15/5/6".as_bytes()));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.cache().stats().writes, 0);
        drop(other_writer);

        assert!(!coordinator.cache().contains(&key));
    }
}
