//! HTTP surface consumed by Scope.

mod handlers;
mod routes;

pub use handlers::{ApiError, AppState, ControlRequest, ControlResponse};
pub use routes::{ApiDoc, create_router};
