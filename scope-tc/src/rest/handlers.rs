use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::dispatch::ControlDispatcher;
use crate::error::{ControlError, HandlerError};
use crate::report::ReportBuilder;

/// Shared application state
pub struct AppState {
    pub reporter: ReportBuilder,
    pub dispatcher: ControlDispatcher,
}

/// Protocol-level error response
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub code: u32,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code {
            400 => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

// === Report ===

/// Current topology report
#[utoipa::path(
    get,
    path = "/report",
    responses(
        (status = 200, description = "Topology snapshot", body = crate::report::Report),
        (status = 500, description = "Report could not be serialized", body = ApiError)
    ),
    tag = "plugin"
)]
pub async fn report(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let raw = state.reporter.raw_report().map_err(|e| {
        let msg = format!("error: failed to get raw report: {e}");
        error!("{}", msg);
        ApiError {
            error: msg,
            code: 500,
        }
    })?;

    Ok(([(header::CONTENT_TYPE, "application/json")], raw))
}

// === Control ===

/// Control request sent by the front-end
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ControlRequest {
    #[serde(rename = "NodeID")]
    pub node_id: String,
    #[serde(rename = "Control")]
    pub control: String,
}

/// Control result. `error` is absent on success.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ControlResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    fn from_result(result: Result<(), ControlError>) -> Self {
        Self {
            error: result.err().map(|e| e.to_string()),
        }
    }
}

/// Run a control against a node
///
/// Lookup and handler failures are returned in the `error` field with a 200
/// status; only an undecodable body is rejected.
#[utoipa::path(
    post,
    path = "/control",
    request_body = ControlRequest,
    responses(
        (status = 200, description = "Control processed", body = ControlResponse),
        (status = 400, description = "Malformed request body", body = ApiError)
    ),
    tag = "plugin"
)]
pub async fn control(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ControlResponse>, ApiError> {
    let req: ControlRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Bad control request");
        ApiError {
            error: e.to_string(),
            code: 400,
        }
    })?;

    let action = match state.dispatcher.resolve(&req.node_id, &req.control) {
        Ok(action) => action,
        Err(e) => {
            warn!(node_id = %req.node_id, control = %req.control, error = %e, "Control not resolved");
            return Ok(Json(ControlResponse::from_result(Err(e.into()))));
        }
    };

    // Handlers may shell out, keep them off the async workers.
    let result = tokio::task::spawn_blocking(move || action.run())
        .await
        .unwrap_or_else(|e| Err(HandlerError::new(format!("handler task aborted: {e}"))));

    if let Err(e) = &result {
        warn!(node_id = %req.node_id, control = %req.control, error = %e, "Control handler failed");
    }

    Ok(Json(ControlResponse::from_result(result.map_err(Into::into))))
}
