//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// No user identity could be resolved. Never falls back to sample data.
  #[error("authentication required")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("not found: {0}")]
  NotFound(String),

  /// A failed store sub-operation. `op` names the step that failed so
  /// the 500 body reads `<op>:<detail>`.
  #[error("{op}:{detail}")]
  Store { op: &'static str, detail: String },
}

impl ApiError {
  pub fn store(op: &'static str, source: impl std::fmt::Display) -> Self {
    Self::Store { op, detail: source.to_string() }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match &self {
      ApiError::Unauthorized => (
        StatusCode::UNAUTHORIZED,
        Json(json!({
          "error":                "authentication_required",
          "message":              "Authentication required to access learning path data",
          "requiresAuthentication": true,
        })),
      )
        .into_response(),
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response()
      }
      ApiError::NotFound(m) => {
        (StatusCode::NOT_FOUND, Json(json!({ "error": m }))).into_response()
      }
      ApiError::Store { .. } => (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": self.to_string() })),
      )
        .into_response(),
    }
  }
}
