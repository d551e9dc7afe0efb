//! Proximity alerts: the cooldown engine, delivery to subscribers and the
//! periodic scheduler

pub mod engine;
pub mod event;
pub mod history;
pub mod registry;
#[cfg(feature = "tokio-runtime")]
pub mod scheduler;

pub use engine::{CooldownState, ProximityAlertEngine, TrackedKey};
pub use event::{AlertCategory, AlertEvent};
pub use history::{AlertHistory, StoredAlert};
pub use registry::SubscriberRegistry;
#[cfg(feature = "tokio-runtime")]
pub use scheduler::AlertScheduler;
