use std::sync::{Arc, PoisonError, RwLock};

use super::model::HazardPolygon;
use crate::traits::HazardSource;
use crate::Result;

/// Latest snapshot of hazard polygons.
///
/// Snapshots are replaced wholesale. Readers get an `Arc` of the list they
/// started with, so a refresh never shows them a partial list.
#[derive(Debug, Default)]
pub struct ClusterStore {
    snapshot: RwLock<Arc<Vec<HazardPolygon>>>,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_polygons(polygons: Vec<HazardPolygon>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(polygons)),
        }
    }

    /// Fetch a fresh list from `source`. On error the previous snapshot is
    /// kept and the error is returned to the caller.
    pub async fn refresh(&self, source: &dyn HazardSource) -> Result<usize> {
        match source.fetch_hazard_polygons().await {
            Ok(polygons) => {
                let count = polygons.len();
                self.replace(polygons);
                log::info!("cluster store refreshed with {} polygons", count);
                Ok(count)
            }
            Err(e) => {
                log::warn!("cluster refresh failed, keeping {} polygons: {}", self.len(), e);
                Err(e)
            }
        }
    }

    pub fn replace(&self, polygons: Vec<HazardPolygon>) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(polygons);
    }

    pub fn snapshot(&self) -> Arc<Vec<HazardPolygon>> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    pub fn find(&self, id: &str) -> Option<HazardPolygon> {
        self.snapshot().iter().find(|p| p.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
