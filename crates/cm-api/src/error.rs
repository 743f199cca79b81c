//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::patch::PatchError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<cm_core::Error> for ApiError {
  fn from(err: cm_core::Error) -> Self {
    use cm_core::Error as E;
    match err {
      E::NotFound { .. } => Self::NotFound(err.to_string()),
      E::InvalidArgument(_) | E::MalformedPredicate(_) | E::ConstraintViolation(_) => {
        Self::BadRequest(err.to_string())
      }
      E::StorageUnavailable(_) | E::Decode { .. } => Self::Store(Box::new(err)),
    }
  }
}

impl From<PatchError> for ApiError {
  fn from(err: PatchError) -> Self { Self::BadRequest(err.to_string()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    if status.is_server_error() {
      tracing::error!(%status, error = %message, "request failed");
    } else {
      tracing::debug!(%status, error = %message, "request rejected");
    }
    (status, Json(json!({ "error": message }))).into_response()
  }
}
