//! Tracked points: the user's saved pointers and the live device location

pub mod location;
pub mod store;

pub use location::{FixedLocation, SharedLocation};
pub use store::{FilePointerStore, PointerEdit, TrackedPointer};
