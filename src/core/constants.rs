//! Core constants for the tile grid, alerting and cache layout.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Zoom level the map is rendered at. The tile API does not serve beyond 15
/// for the plan in use.
pub const DEFAULT_ZOOM: u8 = 15;

/// Highest zoom level accepted by configuration.
pub const MAX_ZOOM: u8 = 22;

/// Mean Earth radius used for great-circle distances, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Singapore bounding box, south-west corner (lon, lat).
pub const SINGAPORE_SW: (f64, f64) = (103.6, 1.17);

/// Singapore bounding box, north-east corner (lon, lat).
pub const SINGAPORE_NE: (f64, f64) = (104.11667, 1.48333);

/// Default alert radius around a tracked point, in meters.
pub const DEFAULT_PROXIMITY_THRESHOLD_METERS: u32 = 500;

/// Minimum gap between two alerts for the same tracked point.
pub const DEFAULT_COOLDOWN_SECONDS: u64 = 60;

/// Period of the background proximity evaluation.
pub const DEFAULT_EVAL_INTERVAL_SECONDS: u64 = 10;

/// Number of tile requests issued between pacing delays.
pub const DEFAULT_TILE_BATCH_PACE_SIZE: usize = 1000;

/// Pacing delay inserted after every batch of tile requests.
pub const DEFAULT_TILE_PACE_DELAY_MS: u64 = 1000;

/// Cooldown key reserved for the live user location.
pub const LIVE_LOCATION_KEY: &str = "LIVE";

/// Fallback coordinates (lon, lat) used when no location fix is available.
pub const FALLBACK_LOCATION: (f64, f64) = (103.6831, 1.3483);

/// Extension of compressed tile files in the cache.
pub const CACHE_FILE_EXTENSION: &str = "gz";

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "DENGUEMAP_CACHE_DIR";

/// Environment variable holding the MapTiler API key.
pub const MAPTILER_API_KEY_ENV: &str = "MAPTILER_API_KEY";

/// MapTiler geocoding endpoint; the query and `.json` are appended.
pub const MAPTILER_GEOCODING_URL: &str = "https://api.maptiler.com/geocoding/";

/// Country filter applied to place searches.
pub const SEARCH_COUNTRY: &str = "sg";

/// Maximum number of place search results.
pub const SEARCH_LIMIT: usize = 5;
