use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use super::event::AlertEvent;
use crate::storage::JsonStore;
use crate::traits::AlertSubscriber;
use crate::Result;

/// An alert as kept in the history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAlert {
    pub id: Uuid,
    #[serde(flatten)]
    pub event: AlertEvent,
}

/// Subscriber that appends every alert to a JSON file
pub struct AlertHistory {
    file: JsonStore<Vec<StoredAlert>>,
    lock: Mutex<()>,
}

impl AlertHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonStore::new(path),
            lock: Mutex::new(()),
        }
    }

    pub fn record(&self, event: &AlertEvent) -> Result<StoredAlert> {
        let stored = StoredAlert {
            id: Uuid::new_v4(),
            event: event.clone(),
        };
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.file.update(|alerts| alerts.push(stored.clone()))?;
        Ok(stored)
    }

    /// All stored alerts, oldest first
    pub fn list(&self) -> Result<Vec<StoredAlert>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.file.load()
    }

    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.file.save(&Vec::new())
    }
}

impl AlertSubscriber for AlertHistory {
    fn on_alert(&self, event: &AlertEvent) {
        if let Err(e) = self.record(event) {
            log::warn!("failed to save alert to {}: {}", self.file.path().display(), e);
        }
    }
}
