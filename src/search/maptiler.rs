//! MapTiler geocoding, restricted to Singapore

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::SearchResult;
use crate::core::constants::{
    MAPTILER_API_KEY_ENV, MAPTILER_GEOCODING_URL, SEARCH_COUNTRY, SEARCH_LIMIT,
};
use crate::core::geo::LonLat;
use crate::tiles::source::{network_error, redact_key, HTTP_CLIENT};
use crate::traits::SearchSource;
use crate::{MapError, Result};

#[derive(Debug, Clone)]
pub struct MapTilerSearchSource {
    api_key: String,
    base_url: String,
    country: String,
    limit: usize,
}

impl MapTilerSearchSource {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: MAPTILER_GEOCODING_URL.to_string(),
            country: SEARCH_COUNTRY.to_string(),
            limit: SEARCH_LIMIT,
        }
    }

    /// Reads the key from `$MAPTILER_API_KEY`
    pub fn from_env() -> Result<Self> {
        std::env::var(MAPTILER_API_KEY_ENV)
            .map(Self::new)
            .map_err(|_| MapError::Config(format!("{} is not set", MAPTILER_API_KEY_ENV)))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// `{base}{query}.json?key=..&country=..&limit=..` with the query
    /// percent-encoded as a single path segment
    pub fn search_url(&self, query: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| MapError::Config(format!("invalid geocoding url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| MapError::Config(format!("geocoding url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push(&format!("{}.json", query));
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("country", &self.country)
            .append_pair("limit", &self.limit.to_string());
        Ok(url)
    }
}

#[async_trait]
impl SearchSource for MapTilerSearchSource {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.search_url(query)?;
        log::debug!("searching places for {:?}", query);

        let response = HTTP_CLIENT.get(url.clone()).send().await.map_err(network_error)?;
        if !response.status().is_success() {
            return Err(MapError::Http {
                status: response.status().as_u16(),
                url: redact_key(url.as_str()),
            });
        }

        let body = response.text().await.map_err(network_error)?;
        let results = parse_search_geojson(&body)?;
        log::debug!("{} places found for {:?}", results.len(), query);
        Ok(results)
    }
}

/// Parse a geocoding FeatureCollection into search results, in response
/// order. Features without a name or a point position are skipped.
pub fn parse_search_geojson(json: &str) -> Result<Vec<SearchResult>> {
    let root: Value = serde_json::from_str(json)?;
    let features = root
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| MapError::Parse("search response has no features array".into()))?;

    let results = features
        .iter()
        .filter_map(|feature| {
            let result = parse_feature(feature);
            if result.is_none() {
                log::debug!("skipping malformed search feature");
            }
            result
        })
        .collect();
    Ok(results)
}

fn parse_feature(feature: &Value) -> Option<SearchResult> {
    let name = feature.get("text")?.as_str()?.to_string();
    let detail = feature
        .get("place_name")
        .and_then(Value::as_str)
        .unwrap_or(name.as_str())
        .to_string();
    let relevance = feature.get("relevance").and_then(Value::as_f64).unwrap_or(0.0) as f32;

    let coordinates = feature.get("geometry")?.get("coordinates")?.as_array()?;
    let lon = coordinates.first()?.as_f64()?;
    let lat = coordinates.get(1)?.as_f64()?;

    Some(SearchResult {
        name,
        detail,
        relevance,
        position: LonLat::new(lon, lat),
    })
}
