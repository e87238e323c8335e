//! Response bodies for the HTTP endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Acknowledgement sent once a delivery is accepted
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: String,
}

impl WebhookResponse {
    pub fn accepted() -> Self {
        Self {
            status: "webhook request received".to_string(),
        }
    }
}

/// Body of `GET /`
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatusResponse {
    pub status: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    /// Deliveries still being processed
    pub in_flight: usize,
}
