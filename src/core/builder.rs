//! Builder for the core service context
//!
//! Every collaborator can be injected. Anything left unset gets the
//! production default: MapTiler tiles when an API key is configured
//! (OpenStreetMap otherwise), NEA cluster data, MapTiler place search when a
//! key is configured, and a live location that stays not ready until it is
//! fed.

use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    alerts::{engine::ProximityAlertEngine, registry::SubscriberRegistry},
    clusters::{nea::NeaClusterSource, store::ClusterStore},
    core::{
        config::{AlertConfig, CoreConfig, TileFetchConfig},
        context::DengueMapCore,
    },
    pointers::location::SharedLocation,
    search::MapTilerSearchSource,
    tiles::{
        cache::TileCache,
        loader::TileFetchCoordinator,
        source::{HttpTileFetcher, MapTilerSource, OpenStreetMapSource},
    },
    traits::{
        AlertSubscriber, Clock, HazardSource, LocationProvider, PointerStore, SearchSource,
        TileFetcher,
    },
    Result,
};

#[derive(Default)]
pub struct CoreBuilder {
    config: CoreConfig,
    tile_fetcher: Option<Arc<dyn TileFetcher>>,
    hazard_source: Option<Arc<dyn HazardSource>>,
    search_source: Option<Arc<dyn SearchSource>>,
    pointer_store: Option<Arc<dyn PointerStore>>,
    location: Option<Arc<dyn LocationProvider>>,
    clock: Option<Arc<dyn Clock>>,
    subscribers: Vec<Arc<dyn AlertSubscriber>>,
}

impl CoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_alert_config(mut self, alerts: AlertConfig) -> Self {
        self.config.alerts = alerts;
        self
    }

    pub fn with_tile_config(mut self, tiles: TileFetchConfig) -> Self {
        self.config.tiles = tiles;
        self
    }

    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.cache.root = root.into();
        self
    }

    /// Keep up to `capacity` decompressed tiles in memory
    pub fn with_memory_tier(mut self, capacity: usize) -> Self {
        self.config.cache.memory_capacity = capacity;
        self
    }

    pub fn with_tile_fetcher(mut self, fetcher: Arc<dyn TileFetcher>) -> Self {
        self.tile_fetcher = Some(fetcher);
        self
    }

    pub fn with_hazard_source(mut self, source: Arc<dyn HazardSource>) -> Self {
        self.hazard_source = Some(source);
        self
    }

    pub fn with_search_source(mut self, source: Arc<dyn SearchSource>) -> Self {
        self.search_source = Some(source);
        self
    }

    pub fn with_pointer_store(mut self, store: Arc<dyn PointerStore>) -> Self {
        self.pointer_store = Some(store);
        self
    }

    pub fn with_location(mut self, location: Arc<dyn LocationProvider>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn AlertSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Validate the configuration, create the cache directory and wire
    /// everything together. Nothing runs until [`DengueMapCore::start`].
    pub fn build(self) -> Result<DengueMapCore> {
        self.config.validate()?;

        let cache = TileCache::new(&self.config.cache)?;
        let tile_fetcher = self.tile_fetcher.unwrap_or_else(default_tile_fetcher);
        let coordinator = Arc::new(TileFetchCoordinator::new(
            cache.clone(),
            tile_fetcher,
            self.config.tiles.clone(),
        ));

        let registry = Arc::new(SubscriberRegistry::new());
        for subscriber in self.subscribers {
            registry.register(subscriber);
        }

        let clusters = Arc::new(ClusterStore::new());
        let location = self
            .location
            .unwrap_or_else(|| Arc::new(SharedLocation::new()));

        let mut engine = ProximityAlertEngine::new(
            Arc::clone(&clusters),
            location,
            Arc::clone(&registry),
            self.config.alerts.clone(),
        );
        if let Some(store) = self.pointer_store {
            engine = engine.with_pointer_store(store);
        }
        if let Some(clock) = self.clock {
            engine = engine.with_clock(clock);
        }

        let hazard_source = self
            .hazard_source
            .unwrap_or_else(|| Arc::new(NeaClusterSource::new()));
        let search_source = self.search_source.or_else(default_search_source);

        log::info!(
            "core built: cache at {}, {} subscribers",
            cache.root().display(),
            registry.len()
        );

        Ok(DengueMapCore::new(
            self.config,
            cache,
            coordinator,
            clusters,
            hazard_source,
            search_source,
            Arc::new(engine),
            registry,
        ))
    }
}

fn default_tile_fetcher() -> Arc<dyn TileFetcher> {
    match MapTilerSource::from_env() {
        Ok(source) => Arc::new(HttpTileFetcher::new(source)),
        Err(e) => {
            log::warn!("{}; using OpenStreetMap tiles", e);
            Arc::new(HttpTileFetcher::new(OpenStreetMapSource::new()))
        }
    }
}

fn default_search_source() -> Option<Arc<dyn SearchSource>> {
    match MapTilerSearchSource::from_env() {
        Ok(source) => Some(Arc::new(source)),
        Err(e) => {
            log::info!("{}; place search disabled", e);
            None
        }
    }
}
