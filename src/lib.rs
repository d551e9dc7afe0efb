//! # denguemap
//!
//! The non-visual core of a dengue-alert mapping app.
//!
//! Raster map tiles are fetched from a remote source, cached gzip-compressed
//! on disk with safe concurrent access, and laid out with Web-Mercator tile
//! math. Dengue cluster polygons are refreshed from a remote dataset and
//! periodically checked against the user's live location and saved pointers,
//! emitting throttled proximity alerts to registered subscribers. Places can
//! be looked up by name through a geocoding source.

pub mod alerts;
pub mod clusters;
pub mod core;
pub mod pointers;
pub mod prelude;
pub mod runtime;
pub mod search;
pub mod storage;
pub mod tiles;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    builder::CoreBuilder,
    config::{AlertConfig, CacheConfig, CoreConfig, TileFetchConfig},
    context::DengueMapCore,
    geo::{LonLat, LonLatBounds, TileGrid, TileKey},
};

pub use tiles::{
    cache::{CacheStats, TileCache},
    loader::{TileData, TileFetchCoordinator, TileOrigin, TileResult},
    source::{HttpTileFetcher, MapTilerSource, OpenStreetMapSource, TileSource},
};

pub use clusters::{
    model::{severity_of, HazardPolygon, Severity},
    nea::{parse_cluster_geojson, NeaClusterSource},
    store::ClusterStore,
};

pub use alerts::{
    engine::{CooldownState, ProximityAlertEngine, TrackedKey},
    event::{AlertCategory, AlertEvent},
    history::{AlertHistory, StoredAlert},
    registry::SubscriberRegistry,
};

#[cfg(feature = "tokio-runtime")]
pub use alerts::scheduler::AlertScheduler;

pub use pointers::{
    location::{FixedLocation, SharedLocation},
    store::{FilePointerStore, PointerEdit, TrackedPointer},
};

pub use search::{parse_search_geojson, MapTilerSearchSource, SearchResult};

pub use traits::{
    AlertSubscriber, Clock, HazardSource, LocationProvider, PointerStore, SearchSource,
    SystemClock, TileFetcher,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Task cancelled: {0}")]
    Cancelled(String),
}

/// Error type alias for convenience
pub type Error = MapError;

/// Initialize `env_logger` once. Later calls are no-ops.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
