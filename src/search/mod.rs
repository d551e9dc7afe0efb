//! Place search by free-text query

pub mod maptiler;

pub use maptiler::{parse_search_geojson, MapTilerSearchSource};

use serde::{Deserialize, Serialize};

use crate::core::geo::LonLat;

/// One geocoded match for a search query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Short place name, e.g. "Tampines"
    pub name: String,
    /// Full formatted address
    pub detail: String,
    /// Provider score in [0, 1]
    pub relevance: f32,
    pub position: LonLat,
}
