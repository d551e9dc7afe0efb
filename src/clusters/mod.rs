//! Dengue cluster polygons and the store that holds the latest snapshot

pub mod model;
pub mod nea;
pub mod store;

pub use model::{severity_of, HazardPolygon, Severity};
pub use nea::{parse_cluster_geojson, NeaClusterSource};
pub use store::ClusterStore;
