//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the health check, the WebSocket endpoint, the OpenAPI
//! documentation and the static browser client.

use crate::{
    handlers,
    models::{HealthResponse, HealthStatus},
    state::AppState,
    ws::ws_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::health),
    components(schemas(HealthResponse, HealthStatus)),
    tags(
        (name = "Voice Relay", description = "WebSocket relay between the browser voice client and the chat API")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&app_state.config.static_dir);

    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    // Merge with the stateless routes; anything unmatched is a static file.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .fallback_service(static_files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_documents_health() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/health"));

        let json = doc.to_pretty_json().unwrap();
        assert!(json.contains("HealthResponse"));
        assert!(json.contains("activeSessions"));
    }
}
