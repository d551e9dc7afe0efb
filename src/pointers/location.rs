use std::sync::{PoisonError, RwLock};

use crate::core::constants::FALLBACK_LOCATION;
use crate::core::geo::LonLat;
use crate::traits::LocationProvider;

/// Live location fed by the platform's location service.
///
/// Not ready until the first fix arrives. `clear` drops back to not ready,
/// e.g. when the service loses permission.
#[derive(Debug, Default)]
pub struct SharedLocation {
    fix: RwLock<Option<LonLat>>,
}

impl SharedLocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, position: LonLat) {
        if !position.is_valid() {
            log::warn!("ignoring invalid location fix {:?}", position);
            return;
        }
        *self.fix.write().unwrap_or_else(PoisonError::into_inner) = Some(position);
    }

    pub fn clear(&self) {
        *self.fix.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn get(&self) -> Option<LonLat> {
        *self.fix.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocationProvider for SharedLocation {
    fn is_ready(&self) -> bool {
        self.get().is_some()
    }

    fn current_coordinates(&self) -> LonLat {
        self.get().unwrap_or_else(|| FALLBACK_LOCATION.into())
    }
}

/// Always-ready location at a fixed point, for desktops and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub LonLat);

impl Default for FixedLocation {
    fn default() -> Self {
        Self(FALLBACK_LOCATION.into())
    }
}

impl LocationProvider for FixedLocation {
    fn is_ready(&self) -> bool {
        true
    }

    fn current_coordinates(&self) -> LonLat {
        self.0
    }
}
