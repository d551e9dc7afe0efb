//! Dengue clusters published by the National Environment Agency on
//! data.gov.sg.
//!
//! The dataset is reached in two steps: a poll request returns a short-lived
//! download URL, and that URL serves the GeoJSON feature collection.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::model::HazardPolygon;
use crate::core::geo::LonLat;
use crate::tiles::source::HTTP_CLIENT;
use crate::traits::HazardSource;
use crate::{MapError, Result};

pub const NEA_DATASET_ID: &str = "d_dbfabf16158d1b0e1c420627c0819168";
pub const DATA_GOV_BASE_URL: &str = "https://api-open.data.gov.sg/v1/public/api/datasets/";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollResponse {
    code: i64,
    #[serde(default)]
    err_msg: Option<String>,
    #[serde(default)]
    data: Option<PollData>,
}

#[derive(Debug, Deserialize)]
struct PollData {
    url: String,
}

pub struct NeaClusterSource {
    base_url: String,
    dataset_id: String,
}

impl NeaClusterSource {
    pub fn new() -> Self {
        Self {
            base_url: DATA_GOV_BASE_URL.to_string(),
            dataset_id: NEA_DATASET_ID.to_string(),
        }
    }

    /// Point at another data.gov.sg-compatible host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn with_dataset_id(mut self, dataset_id: impl Into<String>) -> Self {
        self.dataset_id = dataset_id.into();
        self
    }

    pub fn poll_url(&self) -> String {
        format!("{}{}/poll-download", self.base_url, self.dataset_id)
    }

    async fn download_url(&self) -> Result<String> {
        let url = self.poll_url();
        let response = HTTP_CLIENT.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(MapError::Http {
                status: response.status().as_u16(),
                url,
            });
        }

        let poll: PollResponse = response.json().await?;
        if poll.code != 0 {
            return Err(MapError::Api(
                poll.err_msg.unwrap_or_else(|| format!("poll returned code {}", poll.code)),
            ));
        }
        poll.data
            .map(|data| data.url)
            .ok_or_else(|| MapError::Parse("poll response has no download url".into()))
    }
}

impl Default for NeaClusterSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HazardSource for NeaClusterSource {
    async fn fetch_hazard_polygons(&self) -> Result<Vec<HazardPolygon>> {
        let dataset_url = self.download_url().await?;
        log::debug!("downloading cluster dataset");

        let response = HTTP_CLIENT.get(&dataset_url).send().await?;
        if !response.status().is_success() {
            return Err(MapError::Http {
                status: response.status().as_u16(),
                url: dataset_url,
            });
        }
        let body = response.text().await?;
        parse_cluster_geojson(&body)
    }
}

/// Parse a GeoJSON FeatureCollection of dengue clusters.
///
/// `Polygon` features keep their outer ring. `MultiPolygon` features are
/// flattened into one vertex list, every ring of every polygon in order.
/// Other geometry types are skipped. Ids count accepted features from 0.
pub fn parse_cluster_geojson(json: &str) -> Result<Vec<HazardPolygon>> {
    let root: Value = serde_json::from_str(json)?;
    let features = root
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| MapError::Parse("GeoJSON has no features array".into()))?;

    let mut polygons = Vec::with_capacity(features.len());
    for feature in features {
        let geometry = &feature["geometry"];
        let geometry_type = geometry["type"].as_str().unwrap_or_default();
        let coordinates = &geometry["coordinates"];

        let vertices = match geometry_type {
            "Polygon" => ring_vertices(&coordinates[0])?,
            "MultiPolygon" => {
                let mut vertices = Vec::new();
                for polygon in coordinates.as_array().into_iter().flatten() {
                    for ring in polygon.as_array().into_iter().flatten() {
                        vertices.extend(ring_vertices(ring)?);
                    }
                }
                vertices
            }
            other => {
                log::warn!("unsupported geometry type: {:?}", other);
                continue;
            }
        };

        let properties = &feature["properties"];
        let case_size = case_size(&properties["CASE_SIZE"])?;
        let area_name = match &properties["LOCALITY"] {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };

        polygons.push(HazardPolygon::new(
            polygons.len().to_string(),
            case_size,
            area_name,
            vertices,
        ));
    }

    log::info!("parsed {} clusters", polygons.len());
    Ok(polygons)
}

fn ring_vertices(ring: &Value) -> Result<Vec<LonLat>> {
    let points = ring
        .as_array()
        .ok_or_else(|| MapError::Parse("polygon ring is not an array".into()))?;

    points
        .iter()
        .map(|point| {
            match (
                point.get(0).and_then(Value::as_f64),
                point.get(1).and_then(Value::as_f64),
            ) {
                (Some(lon), Some(lat)) => Ok(LonLat::new(lon, lat)),
                _ => Err(MapError::Parse(format!("bad coordinate {}", point))),
            }
        })
        .collect()
}

/// `CASE_SIZE` arrives as a number or a numeric string
fn case_size(value: &Value) -> Result<u32> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| MapError::Parse(format!("bad CASE_SIZE {}", value)))
}
