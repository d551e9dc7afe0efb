use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::core::constants::{EARTH_RADIUS_KM, SINGAPORE_NE, SINGAPORE_SW, TILE_SIZE};

/// A geographic coordinate in (longitude, latitude) order, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    /// Creates a new coordinate
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lon >= -180.0 && self.lon <= 180.0
    }

    /// Great-circle distance to another coordinate in kilometers
    pub fn distance_km(&self, other: &LonLat) -> f64 {
        haversine_distance(self.lon, self.lat, other.lon, other.lat)
    }
}

impl Default for LonLat {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl From<(f64, f64)> for LonLat {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self::new(lon, lat)
    }
}

/// Axis-aligned bounding box of geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLatBounds {
    pub south_west: LonLat,
    pub north_east: LonLat,
}

impl LonLatBounds {
    pub fn new(south_west: LonLat, north_east: LonLat) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// The bounding box of the island the app covers
    pub fn singapore() -> Self {
        Self::new(SINGAPORE_SW.into(), SINGAPORE_NE.into())
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &LonLat) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lon >= self.south_west.lon
            && point.lon <= self.north_east.lon
    }

    pub fn is_valid(&self) -> bool {
        self.south_west.is_valid()
            && self.north_east.is_valid()
            && self.south_west.lon <= self.north_east.lon
            && self.south_west.lat <= self.north_east.lat
    }
}

impl Default for LonLatBounds {
    fn default() -> Self {
        Self::singapore()
    }
}

/// Identity of a raster tile in the slippy map tile system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileKey {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Tile containing the coordinate at `zoom`
    pub fn containing(point: &LonLat, zoom: u8) -> Self {
        let (x, y) = lon_lat_to_tile(point.lon, point.lat, zoom);
        Self::new(x, y, zoom)
    }

    /// File name of the compressed blob, unique within the zoom directory
    pub fn cache_file_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.x,
            self.y,
            crate::core::constants::CACHE_FILE_EXTENSION
        )
    }

    /// Checks if the tile is valid for its zoom level
    pub fn is_valid(&self) -> bool {
        // Past zoom 63 every u32 index is in range
        match 1_u64.checked_shl(self.zoom as u32) {
            Some(max_coord) => (self.x as u64) < max_coord && (self.y as u64) < max_coord,
            None => true,
        }
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// `(lon + 180) / 360`; in [0, 1] for longitudes in [-180, 180].
pub fn normalized_x(lon: f64) -> f64 {
    (lon + 180.0) / 360.0
}

/// Web-Mercator normalized y, 0 at the northern edge and 1 at the southern.
///
/// Diverges at the poles: latitudes of ±90° yield infinities or NaN, so
/// callers keep inputs inside the Mercator band.
pub fn normalized_y(lat: f64) -> f64 {
    let lat_rad = lat.to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0
}

/// Tiles per axis at `zoom`, as a float so any `u8` zoom is representable
fn zoom_factor(zoom: u8) -> f64 {
    2f64.powi(zoom as i32)
}

/// Tile indices containing the coordinate at `zoom`.
///
/// Indices are truncated, never rounded, so a coordinate on a shared edge
/// belongs to the tile to its east/south. Negative products saturate to 0.
pub fn lon_lat_to_tile(lon: f64, lat: f64, zoom: u8) -> (u32, u32) {
    let n = zoom_factor(zoom);
    let x = (normalized_x(lon) * n).floor() as u32;
    let y = (normalized_y(lat) * n).floor() as u32;
    (x, y)
}

/// Offset of a coordinate from the top-left tile `(x_min, y_min)` in tile
/// units. The y component is negated to match the upward-positive anchor
/// convention of the view layer.
pub fn lon_lat_to_pixel_ratio(lon: f64, lat: f64, zoom: u8, x_min: u32, y_min: u32) -> (f64, f64) {
    let n = zoom_factor(zoom);
    let x_ratio = normalized_x(lon) * n - x_min as f64;
    let y_ratio = -(normalized_y(lat) * n - y_min as f64);
    (x_ratio, y_ratio)
}

/// Great-circle distance in kilometers
pub fn haversine_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Rectangular block of tiles at a single zoom level, inclusive on all sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
    pub zoom: u8,
}

impl TileGrid {
    pub fn new(x_min: u32, x_max: u32, y_min: u32, y_max: u32, zoom: u8) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
            zoom,
        }
    }

    /// Smallest grid covering `bounds`. Tile y grows southwards, so the
    /// south-west corner yields `y_max` and the north-east corner `y_min`.
    pub fn covering(bounds: &LonLatBounds, zoom: u8) -> Self {
        let (x_min, y_max) = lon_lat_to_tile(bounds.south_west.lon, bounds.south_west.lat, zoom);
        let (x_max, y_min) = lon_lat_to_tile(bounds.north_east.lon, bounds.north_east.lat, zoom);
        Self::new(x_min, x_max, y_min, y_max, zoom)
    }

    pub fn width(&self) -> u32 {
        self.x_max.saturating_sub(self.x_min) + 1
    }

    pub fn height(&self) -> u32 {
        self.y_max.saturating_sub(self.y_min) + 1
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width() as usize * self.height() as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x_min > self.x_max || self.y_min > self.y_max
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        key.zoom == self.zoom
            && (self.x_min..=self.x_max).contains(&key.x)
            && (self.y_min..=self.y_max).contains(&key.y)
    }

    /// Every tile of the grid, x outer and y inner
    pub fn iter(&self) -> impl Iterator<Item = TileKey> + '_ {
        let zoom = self.zoom;
        let (y_min, y_max) = (self.y_min, self.y_max);
        let xs = if self.is_empty() {
            1..=0
        } else {
            self.x_min..=self.x_max
        };
        xs.flat_map(move |x| (y_min..=y_max).map(move |y| TileKey::new(x, y, zoom)))
    }

    /// Panel size needed to lay out the whole grid, in pixels
    pub fn pixel_size(&self) -> (f64, f64) {
        (
            self.width() as f64 * TILE_SIZE as f64,
            self.height() as f64 * TILE_SIZE as f64,
        )
    }

    /// Anchor of a tile relative to the top-left tile, y pointing up
    pub fn tile_offset(&self, key: &TileKey) -> (f64, f64) {
        let dx = key.x as f64 - self.x_min as f64;
        let dy = key.y as f64 - self.y_min as f64;
        (dx * TILE_SIZE as f64, -dy * TILE_SIZE as f64)
    }

    /// Pixel position of a coordinate on the grid panel
    pub fn geo_to_pixel(&self, point: &LonLat) -> (f64, f64) {
        let (xr, yr) = lon_lat_to_pixel_ratio(point.lon, point.lat, self.zoom, self.x_min, self.y_min);
        (xr * TILE_SIZE as f64, yr * TILE_SIZE as f64)
    }
}
