//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{CommandPayload, ErrorResponse, TranscriptionResponse},
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
    paths(
        handlers::post_command,
        handlers::post_transcription,
        handlers::get_vehicle,
        handlers::get_transcript,
        handlers::list_actions,
    ),
    components(
        schemas(CommandPayload, TranscriptionResponse, ErrorResponse)
    ),
    tags(
        (name = "Cardash API", description = "Natural-language command dispatch for the vehicle")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/commands", post(handlers::post_command))
        .route("/transcriptions", post(handlers::post_transcription))
        .route("/vehicle", get(handlers::get_vehicle))
        .route("/transcript", get(handlers::get_transcript))
        .route("/actions", get(handlers::list_actions))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
