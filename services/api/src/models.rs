//! HTTP API Models
//!
//! Response bodies for the REST endpoints, documented with `utoipa`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}

/// Liveness report for the relay.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: HealthStatus,
    /// Number of WebSocket sessions currently registered.
    #[schema(example = 2)]
    pub active_sessions: usize,
    pub timestamp: DateTime<Utc>,
}
