//! Prelude module for common denguemap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use denguemap::prelude::*;`

pub use crate::core::{
    builder::CoreBuilder,
    config::{AlertConfig, CacheConfig, CoreConfig, TileFetchConfig},
    context::DengueMapCore,
    geo::{
        haversine_distance, lon_lat_to_pixel_ratio, lon_lat_to_tile, LonLat, LonLatBounds,
        TileGrid, TileKey,
    },
};

pub use crate::tiles::{
    cache::{CacheStats, TileCache},
    loader::{TileData, TileFetchCoordinator, TileOrigin, TileResult},
    source::{HttpTileFetcher, MapTilerSource, OpenStreetMapSource, TileSource},
};

pub use crate::clusters::{
    model::{severity_of, HazardPolygon, Severity},
    nea::NeaClusterSource,
    store::ClusterStore,
};

pub use crate::alerts::{
    engine::{CooldownState, ProximityAlertEngine, TrackedKey},
    event::{AlertCategory, AlertEvent},
    history::AlertHistory,
    registry::SubscriberRegistry,
};

#[cfg(feature = "tokio-runtime")]
pub use crate::alerts::scheduler::AlertScheduler;

pub use crate::pointers::{
    location::{FixedLocation, SharedLocation},
    store::{FilePointerStore, PointerEdit, TrackedPointer},
};

pub use crate::search::{MapTilerSearchSource, SearchResult};

pub use crate::runtime::{AsyncHandle, AsyncSpawner};

#[cfg(feature = "tokio-runtime")]
pub use crate::runtime::{runtime, spawn};

pub use crate::traits::{
    AlertSubscriber, Clock, HazardSource, LocationProvider, PointerStore, SearchSource,
    SystemClock, TileFetcher,
};

pub use crate::{Error as MapError, Result};

pub use std::{
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};
