//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{ChatRequest, ErrorResponse},
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::chat, handlers::health),
    components(schemas(ChatRequest, ErrorResponse)),
    tags(
        (name = "Xylor API", description = "Project chat and the realtime agent session bridge")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/health", get(handlers::health))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
