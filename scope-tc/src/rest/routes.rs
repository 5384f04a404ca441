use axum::{
    Json, Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::handlers::{self, AppState};
use crate::report;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "scope-tc Plugin API",
        version = "0.1.0",
        description = "Scope plugin endpoints. Reports running and stopped containers and runs per-container controls."
    ),
    tags(
        (name = "plugin", description = "Scope plugin protocol")
    ),
    paths(
        handlers::report,
        handlers::control,
    ),
    components(schemas(
        handlers::ApiError,
        handlers::ControlRequest,
        handlers::ControlResponse,
        report::Report,
        report::Topology,
        report::Node,
        report::ControlEntry,
        report::ControlData,
        report::StringEntry,
        report::Control,
        report::MetadataTemplate,
        report::TableTemplate,
        report::PluginSpec,
    ))
)]
pub struct ApiDoc;

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/report", get(handlers::report).post(handlers::report))
        .route("/control", post(handlers::control))
        .route("/api-docs/openapi.json", get(openapi))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
