//! The owned service context
//!
//! Replaces process-wide managers: one value holds the cache, the fetch
//! coordinator, the cluster store and the alert engine, and its lifecycle is
//! explicit (`build`, `start`, `shutdown`).

use std::sync::Arc;

use crate::alerts::{engine::ProximityAlertEngine, registry::SubscriberRegistry};
use crate::clusters::store::ClusterStore;
use crate::core::config::CoreConfig;
use crate::search::SearchResult;
use crate::tiles::{cache::TileCache, loader::TileFetchCoordinator};
use crate::traits::{AlertSubscriber, HazardSource, SearchSource};
use crate::{MapError, Result};

#[cfg(feature = "tokio-runtime")]
use crate::alerts::scheduler::AlertScheduler;
#[cfg(feature = "tokio-runtime")]
use crate::core::geo::TileGrid;
#[cfg(feature = "tokio-runtime")]
use crate::tiles::loader::TileResult;
#[cfg(feature = "tokio-runtime")]
use crossbeam_channel::Receiver;
#[cfg(feature = "tokio-runtime")]
use std::sync::{Mutex, PoisonError};

pub struct DengueMapCore {
    config: CoreConfig,
    cache: TileCache,
    coordinator: Arc<TileFetchCoordinator>,
    clusters: Arc<ClusterStore>,
    hazard_source: Arc<dyn HazardSource>,
    search_source: Option<Arc<dyn SearchSource>>,
    engine: Arc<ProximityAlertEngine>,
    registry: Arc<SubscriberRegistry>,
    #[cfg(feature = "tokio-runtime")]
    scheduler: Mutex<Option<AlertScheduler>>,
}

impl DengueMapCore {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: CoreConfig,
        cache: TileCache,
        coordinator: Arc<TileFetchCoordinator>,
        clusters: Arc<ClusterStore>,
        hazard_source: Arc<dyn HazardSource>,
        search_source: Option<Arc<dyn SearchSource>>,
        engine: Arc<ProximityAlertEngine>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            config,
            cache,
            coordinator,
            clusters,
            hazard_source,
            search_source,
            engine,
            registry,
            #[cfg(feature = "tokio-runtime")]
            scheduler: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn coordinator(&self) -> &Arc<TileFetchCoordinator> {
        &self.coordinator
    }

    pub fn clusters(&self) -> &Arc<ClusterStore> {
        &self.clusters
    }

    pub fn engine(&self) -> &Arc<ProximityAlertEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn subscribe(&self, subscriber: Arc<dyn AlertSubscriber>) -> bool {
        self.registry.register(subscriber)
    }

    /// Replace the cluster snapshot from the hazard source. On failure the
    /// previous snapshot stays in place.
    pub async fn refresh_clusters(&self) -> Result<usize> {
        self.clusters.refresh(self.hazard_source.as_ref()).await
    }

    /// Request every tile of the configured map area in the background
    #[cfg(feature = "tokio-runtime")]
    pub fn load_map(&self) -> Receiver<TileResult> {
        self.load_grid(self.config.tiles.grid())
    }

    #[cfg(feature = "tokio-runtime")]
    pub fn load_grid(&self, grid: TileGrid) -> Receiver<TileResult> {
        self.coordinator.spawn_grid(grid)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Look up places by name
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        match &self.search_source {
            Some(source) => source.search(query).await,
            None => Err(MapError::Config("no place search source configured".into())),
        }
    }

    /// Change the alert distance; the next cycle uses the new value
    pub fn set_proximity_threshold_meters(&self, meters: u32) {
        self.engine.set_proximity_threshold_meters(meters);
    }

    /// Refresh clusters once and start the periodic alert evaluation.
    /// A failed refresh is logged and retried by later calls to
    /// [`refresh_clusters`](Self::refresh_clusters); alerts simply stay quiet
    /// until clusters are available. Calling `start` twice is a no-op.
    #[cfg(feature = "tokio-runtime")]
    pub async fn start(&self) {
        if self.is_running() {
            log::debug!("core already started");
            return;
        }

        if let Err(e) = self.refresh_clusters().await {
            log::warn!("initial cluster refresh failed: {}", e);
        }

        let mut scheduler = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
        if scheduler.is_none() {
            *scheduler = Some(AlertScheduler::start(
                Arc::clone(&self.engine),
                self.config.alerts.eval_interval(),
            ));
        }
    }

    #[cfg(feature = "tokio-runtime")]
    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, AlertScheduler::is_running)
    }

    /// Stop the alert scheduler. Tile loads already in flight finish on
    /// their own so their results still reach the cache.
    #[cfg(feature = "tokio-runtime")]
    pub fn shutdown(&self) {
        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown();
        }
    }
}
