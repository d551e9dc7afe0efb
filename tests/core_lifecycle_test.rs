use async_trait::async_trait;
use denguemap::{
    AlertConfig, AlertEvent, AlertHistory, AlertSubscriber, CoreBuilder, FilePointerStore,
    FixedLocation, HazardPolygon, HazardSource, LonLat, LonLatBounds, MapError, Result,
    SearchResult, SearchSource, TileFetchConfig, TileFetcher, TileKey,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct StaticTiles;

#[async_trait]
impl TileFetcher for StaticTiles {
    async fn fetch_tile(&self, key: TileKey) -> Result<Vec<u8>> {
        Ok(key.to_string().into_bytes())
    }
}

#[derive(Default)]
struct StaticClusters {
    down: AtomicBool,
}

#[async_trait]
impl HazardSource for StaticClusters {
    async fn fetch_hazard_polygons(&self) -> Result<Vec<HazardPolygon>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(MapError::Api("maintenance".into()));
        }
        Ok(vec![HazardPolygon::new(
            "0",
            14,
            "Serangoon",
            vec![LonLat::new(103.87, 1.35), LonLat::new(103.88, 1.36)],
        )])
    }
}

/// Knows a single place
struct OnePlace;

#[async_trait]
impl SearchSource for OnePlace {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        if !"tampines".contains(&query.to_lowercase()) {
            return Ok(Vec::new());
        }
        Ok(vec![SearchResult {
            name: "Tampines".into(),
            detail: "Tampines, Singapore".into(),
            relevance: 1.0,
            position: LonLat::new(103.9446, 1.3526),
        }])
    }
}

#[derive(Default)]
struct Inbox(Mutex<Vec<AlertEvent>>);

impl AlertSubscriber for Inbox {
    fn on_alert(&self, event: &AlertEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

/// The assembled service: build, start, alert, load tiles, shut down
#[cfg(test)]
mod core_lifecycle_tests {
    use super::*;

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_alerts_and_persists_history() {
        println!("🧪 [TEST] Testing core lifecycle");
        let dir = tempfile::tempdir().unwrap();

        let pointers = Arc::new(FilePointerStore::new(dir.path().join("pointers.json")));
        pointers
            .create("Home", LonLat::new(103.8701, 1.3501), true)
            .unwrap();

        let history = Arc::new(AlertHistory::new(dir.path().join("alerts.json")));
        let inbox = Arc::new(Inbox::default());

        let core = CoreBuilder::new()
            .with_cache_root(dir.path().join("cache"))
            .with_alert_config(AlertConfig {
                eval_interval_seconds: 1,
                ..AlertConfig::default()
            })
            .with_tile_fetcher(Arc::new(StaticTiles))
            .with_hazard_source(Arc::new(StaticClusters::default()))
            .with_pointer_store(pointers)
            .with_location(Arc::new(FixedLocation(LonLat::new(103.6831, 1.3483))))
            .with_subscriber(history.clone())
            .with_subscriber(inbox.clone())
            .build()
            .unwrap();

        assert!(dir.path().join("cache").is_dir());
        assert!(!core.is_running());

        core.start().await;
        assert!(core.is_running());
        assert_eq!(core.clusters().len(), 1);

        wait_for(|| !inbox.0.lock().unwrap().is_empty()).await;
        let first = inbox.0.lock().unwrap()[0].clone();
        assert_eq!(first.title, "Home Alert: Home");

        wait_for(|| history.list().map(|h| !h.is_empty()).unwrap_or(false)).await;

        core.shutdown();
        assert!(!core.is_running());

        // Only one alert despite several cycles, thanks to the cooldown
        assert_eq!(inbox.0.lock().unwrap().len(), 1);
        println!("✅ [TEST] Core lifecycle test passed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_initial_refresh_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(StaticClusters::default());
        source.down.store(true, Ordering::SeqCst);

        let core = CoreBuilder::new()
            .with_cache_root(dir.path())
            .with_tile_fetcher(Arc::new(StaticTiles))
            .with_hazard_source(source.clone())
            .with_location(Arc::new(FixedLocation::default()))
            .build()
            .unwrap();

        core.start().await;
        assert!(core.is_running());
        assert!(core.clusters().is_empty());

        source.down.store(false, Ordering::SeqCst);
        assert_eq!(core.refresh_clusters().await.unwrap(), 1);
        core.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_load_map_covers_configured_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let bounds = LonLatBounds::new(LonLat::new(103.80, 1.28), LonLat::new(103.81, 1.29));

        let core = CoreBuilder::new()
            .with_cache_root(dir.path())
            .with_tile_config(TileFetchConfig {
                bounds,
                ..TileFetchConfig::for_testing()
            })
            .with_tile_fetcher(Arc::new(StaticTiles))
            .build()
            .unwrap();

        let grid = core.config().tiles.grid();
        let rx = core.load_map();
        let results = tokio::task::spawn_blocking(move || rx.iter().collect::<Vec<_>>())
            .await
            .unwrap();

        assert_eq!(results.len(), grid.len());
        assert!(results.iter().all(|r| r.is_ok()));
        for key in grid.iter() {
            assert!(core.cache().contains(&key));
        }

        core.clear_cache();
        assert!(!core.cache().contains(&grid.iter().next().unwrap()));
    }

    #[tokio::test]
    async fn test_search_and_threshold_through_core() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreBuilder::new()
            .with_cache_root(dir.path())
            .with_tile_fetcher(Arc::new(StaticTiles))
            .with_search_source(Arc::new(OnePlace))
            .build()
            .unwrap();

        let found = core.search("Tampines").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].position, LonLat::new(103.9446, 1.3526));
        assert!(core.search("Jurong").await.unwrap().is_empty());

        core.set_proximity_threshold_meters(750);
        assert_eq!(core.engine().proximity_threshold_meters(), 750);
    }

    #[test]
    fn test_invalid_config_is_rejected_at_build() {
        let dir = tempfile::tempdir().unwrap();
        let result = CoreBuilder::new()
            .with_cache_root(dir.path())
            .with_tile_config(TileFetchConfig {
                max_concurrent: 0,
                ..TileFetchConfig::default()
            })
            .with_tile_fetcher(Arc::new(StaticTiles))
            .build();
        assert!(matches!(result, Err(MapError::Config(_))));
    }
}
