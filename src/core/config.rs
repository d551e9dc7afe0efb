//! Configuration for tile fetching, the disk cache and proximity alerts
//!
//! Every section deserializes with defaults filled in, so a JSON file only
//! needs the fields it wants to change. Presets mirror the usual trade-offs
//! between API quota, device resources and test speed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::constants::{
    CACHE_DIR_ENV, DEFAULT_COOLDOWN_SECONDS, DEFAULT_EVAL_INTERVAL_SECONDS,
    DEFAULT_PROXIMITY_THRESHOLD_METERS, DEFAULT_TILE_BATCH_PACE_SIZE, DEFAULT_TILE_PACE_DELAY_MS,
    DEFAULT_ZOOM, MAX_ZOOM,
};
use crate::core::geo::{LonLatBounds, TileGrid};
use crate::{MapError, Result};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub alerts: AlertConfig,
    pub tiles: TileFetchConfig,
    pub cache: CacheConfig,
}

impl CoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.alerts.validate()?;
        self.tiles.validate()
    }
}

/// Proximity alert tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub proximity_threshold_meters: u32,
    pub cooldown_seconds: u64,
    pub eval_interval_seconds: u64,
}

impl AlertConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_seconds.min(u32::MAX as u64) as i64)
    }

    pub fn eval_interval(&self) -> Duration {
        Duration::from_secs(self.eval_interval_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.eval_interval_seconds == 0 {
            return Err(MapError::Config("eval_interval_seconds must be positive".into()));
        }
        Ok(())
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_meters: DEFAULT_PROXIMITY_THRESHOLD_METERS,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            eval_interval_seconds: DEFAULT_EVAL_INTERVAL_SECONDS,
        }
    }
}

/// Configuration for the tile fetch coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileFetchConfig {
    /// Zoom level the map grid is requested at
    pub zoom: u8,
    /// Area the map covers
    pub bounds: LonLatBounds,
    /// Requests issued between two pacing delays
    pub batch_pace_size: usize,
    /// Length of each pacing delay
    pub pace_delay_ms: u64,
    /// Maximum remote fetches in flight
    pub max_concurrent: usize,
    /// Extra attempts after a failed fetch
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl TileFetchConfig {
    pub fn low_resource() -> Self {
        Self {
            max_concurrent: 8,
            max_retries: 1,
            retry_delay_ms: 250,
            ..Self::default()
        }
    }

    pub fn high_performance() -> Self {
        Self {
            max_concurrent: 128,
            max_retries: 3,
            retry_delay_ms: 50,
            ..Self::default()
        }
    }

    pub fn for_testing() -> Self {
        Self {
            batch_pace_size: 1000,
            pace_delay_ms: 0,
            max_concurrent: 4,
            max_retries: 0,
            retry_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn pace_delay(&self) -> Duration {
        Duration::from_millis(self.pace_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Grid covering the configured bounds at the configured zoom
    pub fn grid(&self) -> TileGrid {
        TileGrid::covering(&self.bounds, self.zoom)
    }

    fn validate(&self) -> Result<()> {
        if self.zoom > MAX_ZOOM {
            return Err(MapError::Config(format!(
                "zoom {} exceeds maximum {}",
                self.zoom, MAX_ZOOM
            )));
        }
        if self.batch_pace_size == 0 {
            return Err(MapError::Config("batch_pace_size must be positive".into()));
        }
        if self.max_concurrent == 0 {
            return Err(MapError::Config("max_concurrent must be positive".into()));
        }
        if !self.bounds.is_valid() {
            return Err(MapError::Config(format!("invalid bounds {:?}", self.bounds)));
        }
        Ok(())
    }
}

impl Default for TileFetchConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            bounds: LonLatBounds::singapore(),
            batch_pace_size: DEFAULT_TILE_BATCH_PACE_SIZE,
            pace_delay_ms: DEFAULT_TILE_PACE_DELAY_MS,
            max_concurrent: 32,
            max_retries: 1,
            retry_delay_ms: 100,
        }
    }
}

/// On-disk tile cache location and the optional in-memory tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub root: PathBuf,
    /// Tiles kept decompressed in memory; 0 disables the tier
    pub memory_capacity: usize,
}

impl CacheConfig {
    /// `$DENGUEMAP_CACHE_DIR`, falling back to a directory under the system
    /// temp dir
    pub fn default_root() -> PathBuf {
        std::env::var_os(CACHE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("denguemap").join("cache"))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            memory_capacity: 0,
        }
    }
}
