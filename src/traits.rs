//! Seams to the collaborators outside the core
//!
//! Remote data sources (tiles, clusters, place search), the pointer store, the location service and alert
//! sinks are all reached through these traits so the core can be wired to
//! real services in the app and to small fakes in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    alerts::event::AlertEvent,
    clusters::model::HazardPolygon,
    core::geo::{LonLat, TileKey},
    pointers::store::TrackedPointer,
    search::SearchResult,
    Result,
};

/// Remote raster tile source
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// Raw image bytes for `key`, or an error for this one tile
    async fn fetch_tile(&self, key: TileKey) -> Result<Vec<u8>>;
}

/// Remote dengue-cluster dataset
#[async_trait]
pub trait HazardSource: Send + Sync {
    async fn fetch_hazard_polygons(&self) -> Result<Vec<HazardPolygon>>;
}

/// Remote place search
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Matches for `query`, best first. A blank query yields no results.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;
}

/// Snapshot provider for the user's saved pointers
pub trait PointerStore: Send + Sync {
    fn list_pointers(&self) -> Result<Vec<TrackedPointer>>;
}

/// Live device location
pub trait LocationProvider: Send + Sync {
    /// Whether a usable fix is available yet
    fn is_ready(&self) -> bool;

    fn current_coordinates(&self) -> LonLat;
}

/// Receiver of proximity alerts
pub trait AlertSubscriber: Send + Sync {
    fn on_alert(&self, event: &AlertEvent);
}

/// Wall-clock source, swappable so cooldowns can be tested without sleeping
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
