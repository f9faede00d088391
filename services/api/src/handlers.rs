//! Axum Handlers for the REST API
//!
//! Uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{extract::State, response::Json};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    models::{HealthResponse, HealthStatus},
    state::AppState,
};

/// Report relay liveness and the number of active sessions.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Relay is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        active_sessions: state.registry.len().await,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::offline_state;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_health_counts_registered_sessions() {
        let state = offline_state();

        let Json(body) = health(State(state.clone())).await;
        assert_eq!(body.status, HealthStatus::Healthy);
        assert_eq!(body.active_sessions, 0);

        let _signal = state.registry.register(Uuid::new_v4()).await;
        let Json(body) = health(State(state)).await;
        assert_eq!(body.active_sessions, 1);
    }
}
