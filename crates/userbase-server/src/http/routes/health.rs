use axum::{
    extract::State, http::StatusCode, response::IntoResponse, response::Response, routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use userbase_core::RequestContext;

use crate::app::AppState;
use crate::domains::errors::ApiError;
use crate::domains::users::service;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) version: &'static str,
    pub(crate) uptime_seconds: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
}

/// Liveness only; never touches the store.
async fn ping() -> StatusCode {
    StatusCode::OK
}

async fn health(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let uptime_seconds = state.started_at.elapsed().as_secs();
    let version = env!("CARGO_PKG_VERSION");

    match service::ping(&state, &ctx).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                version,
                uptime_seconds,
            }),
        )
            .into_response(),
        Err(ApiError::Busy) => ApiError::Busy.into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "db_error",
                version,
                uptime_seconds,
            }),
        )
            .into_response(),
    }
}
