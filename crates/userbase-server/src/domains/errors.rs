use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use userbase_core::StoreError;

use crate::infra::deadline::Outcome;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("server is busy")]
    Busy,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Busy | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Collapses the executor's outcome for a store call into the handler result.
pub fn settle<T>(outcome: Outcome<Result<T, StoreError>>) -> Result<T, ApiError> {
    match outcome {
        Outcome::Completed(result) => result.map_err(ApiError::Store),
        Outcome::Busy => Err(ApiError::Busy),
        Outcome::Failed(message) => Err(ApiError::Internal(message)),
    }
}
