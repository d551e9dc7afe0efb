//! Proximity alerts with per-point cooldowns
//!
//! Every tracked point (the live location and each saved pointer) is either
//! Armed or Cooling. An Armed point that comes within the threshold of a
//! cluster's reference point emits one alert and starts Cooling. It becomes
//! Armed again once the cooldown has elapsed, checked lazily on the next
//! evaluation.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::event::{AlertCategory, AlertEvent};
use super::registry::SubscriberRegistry;
use crate::clusters::model::HazardPolygon;
use crate::clusters::store::ClusterStore;
use crate::core::config::AlertConfig;
use crate::core::constants::LIVE_LOCATION_KEY;
use crate::core::geo::LonLat;
use crate::prelude::HashMap;
use crate::traits::{Clock, LocationProvider, PointerStore, SystemClock};

/// Cooldown identity of a tracked point
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackedKey {
    Live,
    Pointer(String),
}

impl fmt::Display for TrackedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackedKey::Live => f.write_str(LIVE_LOCATION_KEY),
            TrackedKey::Pointer(id) => write!(f, "pointer:{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    Armed,
    Cooling,
}

pub struct ProximityAlertEngine {
    clusters: Arc<ClusterStore>,
    pointers: Option<Arc<dyn PointerStore>>,
    location: Arc<dyn LocationProvider>,
    registry: Arc<SubscriberRegistry>,
    clock: Arc<dyn Clock>,
    config: AlertConfig,
    /// Starts at the configured value and may be changed while running
    threshold_meters: AtomicU32,
    last_notified: Mutex<HashMap<TrackedKey, DateTime<Utc>>>,
    in_progress: AtomicBool,
}

impl ProximityAlertEngine {
    pub fn new(
        clusters: Arc<ClusterStore>,
        location: Arc<dyn LocationProvider>,
        registry: Arc<SubscriberRegistry>,
        config: AlertConfig,
    ) -> Self {
        Self {
            clusters,
            pointers: None,
            location,
            registry,
            clock: Arc::new(SystemClock),
            threshold_meters: AtomicU32::new(config.proximity_threshold_meters),
            config,
            last_notified: Mutex::new(HashMap::default()),
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn with_pointer_store(mut self, pointers: Arc<dyn PointerStore>) -> Self {
        self.pointers = Some(pointers);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration the engine was built with. The live threshold is
    /// [`proximity_threshold_meters`](Self::proximity_threshold_meters).
    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn proximity_threshold_meters(&self) -> u32 {
        self.threshold_meters.load(Ordering::Relaxed)
    }

    /// Takes effect from the next cycle; cooldowns are kept
    pub fn set_proximity_threshold_meters(&self, meters: u32) {
        let previous = self.threshold_meters.swap(meters, Ordering::Relaxed);
        if previous != meters {
            log::info!("proximity threshold changed from {}m to {}m", previous, meters);
        }
    }

    /// Whether a cycle is running right now
    pub fn is_evaluating(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Run one cycle at the clock's current time
    pub fn evaluate(&self) -> Vec<AlertEvent> {
        self.evaluate_at(self.clock.now())
    }

    /// Run one cycle as if the time were `now`. Emitted events are delivered
    /// to the subscriber registry and also returned.
    ///
    /// A cycle that starts while another is still running returns nothing.
    pub fn evaluate_at(&self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("alert evaluation already in progress, skipping cycle");
            return Vec::new();
        }
        let _running = InProgress(&self.in_progress);

        let events = self.run_cycle(now);
        for event in &events {
            log::info!("alert: {}", event.title);
            self.registry.notify(event);
        }
        events
    }

    fn run_cycle(&self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let clusters = self.clusters.snapshot();
        if clusters.is_empty() {
            log::debug!("no clusters loaded yet, skipping alert cycle");
            return Vec::new();
        }
        if !self.location.is_ready() {
            log::debug!("location not ready, skipping alert cycle");
            return Vec::new();
        }

        let threshold_meters = self.proximity_threshold_meters();
        let mut events = Vec::new();

        for pointer in self.load_pointers() {
            let key = TrackedKey::Pointer(pointer.id.clone());
            if let Some(cluster) = self.trigger(&key, pointer.position(), threshold_meters, &clusters, now) {
                let kind = if pointer.home_tag { "Home" } else { "Pointer" };
                let category = if pointer.home_tag {
                    AlertCategory::Indoor
                } else {
                    AlertCategory::Outdoor
                };
                events.push(AlertEvent::new(
                    format!("{} Alert: {}", kind, pointer.name),
                    format!(
                        "{} cluster detected within {}m of pointer '{}'",
                        cluster.area_name, threshold_meters, pointer.name
                    ),
                    now,
                    category,
                ));
            }
        }

        let here = self.location.current_coordinates();
        if let Some(cluster) = self.trigger(&TrackedKey::Live, here, threshold_meters, &clusters, now) {
            events.push(AlertEvent::new(
                "Nearby Dengue Cluster!",
                format!(
                    "{} cluster detected within {}m of your current location",
                    cluster.area_name, threshold_meters
                ),
                now,
                AlertCategory::Outdoor,
            ));
        }

        events
    }

    fn load_pointers(&self) -> Vec<crate::pointers::store::TrackedPointer> {
        let Some(store) = &self.pointers else {
            log::debug!("no pointer store configured");
            return Vec::new();
        };
        match store.list_pointers() {
            Ok(pointers) => pointers,
            Err(e) => {
                log::warn!("failed to load pointers, checking live location only: {}", e);
                Vec::new()
            }
        }
    }

    /// First cluster within range of `point`, if `key` is Armed. Firing moves
    /// `key` to Cooling.
    fn trigger<'a>(
        &self,
        key: &TrackedKey,
        point: LonLat,
        threshold_meters: u32,
        clusters: &'a [HazardPolygon],
        now: DateTime<Utc>,
    ) -> Option<&'a HazardPolygon> {
        if !point.is_valid() {
            log::warn!("{} has invalid coordinates {:?}", key, point);
            return None;
        }

        let threshold_km = threshold_meters as f64 / 1000.0;
        let mut last_notified = self.last_notified.lock().unwrap_or_else(PoisonError::into_inner);

        for cluster in clusters {
            let Some(reference) = cluster.reference_point() else {
                continue;
            };
            let distance_km = point.distance_km(&reference);
            if distance_km >= threshold_km {
                continue;
            }

            if self.state_in(&last_notified, key, now) == CooldownState::Cooling {
                log::trace!("{} within {:.3} km of {} but cooling", key, distance_km, cluster.area_name);
                return None;
            }

            log::debug!("{} within {:.3} km of cluster {}", key, distance_km, cluster.id);
            last_notified.insert(key.clone(), now);
            return Some(cluster);
        }
        None
    }

    fn state_in(
        &self,
        last_notified: &HashMap<TrackedKey, DateTime<Utc>>,
        key: &TrackedKey,
        now: DateTime<Utc>,
    ) -> CooldownState {
        match last_notified.get(key) {
            Some(last) if now - *last < self.config.cooldown() => CooldownState::Cooling,
            _ => CooldownState::Armed,
        }
    }

    pub fn state_of(&self, key: &TrackedKey, now: DateTime<Utc>) -> CooldownState {
        let last_notified = self.last_notified.lock().unwrap_or_else(PoisonError::into_inner);
        self.state_in(&last_notified, key, now)
    }

    pub fn last_notified(&self, key: &TrackedKey) -> Option<DateTime<Utc>> {
        self.last_notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    /// Drop the cooldown of a point, e.g. after its pointer was deleted
    pub fn forget(&self, key: &TrackedKey) {
        self.last_notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn reset_cooldowns(&self) {
        self.last_notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
