//! API request and response models.

use serde::{Deserialize, Serialize};

/// Response body of the event endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    /// Event type that was queued.
    pub accepted: String,
}

/// Response body for GET /api/health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Whether the category filter feature is on.
    pub enabled: bool,
    /// Candidates waiting for confirmation.
    pub queued: usize,
    /// Hits recorded in the last 24 hours across active categories.
    pub recent_hits: usize,
    pub version: String,
}

/// Request and response body of the feature switch.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureState {
    pub enabled: bool,
}
