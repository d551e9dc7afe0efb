use serde::{Deserialize, Serialize};

use crate::core::geo::LonLat;

/// Severity tier derived from a cluster's case count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// `< 5` is Low, `5..=9` Medium, `>= 10` High
    pub fn from_case_size(case_size: u32) -> Self {
        match case_size {
            0..=4 => Severity::Low,
            5..=9 => Severity::Medium,
            _ => Severity::High,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        };
        f.write_str(name)
    }
}

pub fn severity_of(case_size: u32) -> Severity {
    Severity::from_case_size(case_size)
}

/// A reported dengue cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardPolygon {
    pub id: String,
    pub case_size: u32,
    pub severity: Severity,
    pub area_name: String,
    /// Outline in source order, closed or open
    pub vertices: Vec<LonLat>,
}

impl HazardPolygon {
    /// Builds a polygon with its severity derived from `case_size`
    pub fn new(
        id: impl Into<String>,
        case_size: u32,
        area_name: impl Into<String>,
        vertices: Vec<LonLat>,
    ) -> Self {
        Self {
            id: id.into(),
            case_size,
            severity: Severity::from_case_size(case_size),
            area_name: area_name.into(),
            vertices,
        }
    }

    /// Point proximity is measured against: the first vertex
    pub fn reference_point(&self) -> Option<LonLat> {
        self.vertices.first().copied()
    }

    /// Arithmetic mean of the vertices
    pub fn centroid(&self) -> Option<LonLat> {
        if self.vertices.is_empty() {
            return None;
        }
        let n = self.vertices.len() as f64;
        let (lon, lat) = self
            .vertices
            .iter()
            .fold((0.0, 0.0), |(lon, lat), v| (lon + v.lon, lat + v.lat));
        Some(LonLat::new(lon / n, lat / n))
    }
}
