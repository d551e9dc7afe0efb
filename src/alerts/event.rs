use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the alert concerns the user's home or somewhere outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertCategory {
    Indoor,
    Outdoor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub category: AlertCategory,
}

impl AlertEvent {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        category: AlertCategory,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            timestamp,
            category,
        }
    }
}

impl std::fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:?}] {}: {} ({})",
            self.category,
            self.title,
            self.message,
            self.timestamp.to_rfc3339()
        )
    }
}
