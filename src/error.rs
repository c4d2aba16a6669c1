//! Typed error kinds and their HTTP mapping.
//!
//! Components raise `ApiError` variants; the HTTP layer turns them into
//! problem-style JSON bodies: `{"kind": "...", "error": "..."}`. Each kind
//! maps to a distinct status so clients can branch without string matching.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  InvalidInput(String),

  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  Forbidden(String),

  #[error("too many requests, try again later")]
  RateLimited,

  /// The LLM provider failed: non-2xx, transport error, or timeout.
  #[error("upstream provider error: {message}")]
  Upstream {
    status: Option<u16>,
    message: String,
    timed_out: bool,
  },

  /// The provider returned JSON, but its structure is unrecoverably wrong.
  #[error("model returned a malformed artifact: {0}")]
  MalformedArtifact(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
    ApiError::Upstream { status, message: message.into(), timed_out: false }
  }

  /// Stable machine-readable discriminator for the wire body.
  pub fn kind(&self) -> &'static str {
    match self {
      ApiError::InvalidInput(_) => "invalid_input",
      ApiError::Unauthorized(_) => "unauthorized",
      ApiError::Forbidden(_) => "forbidden",
      ApiError::RateLimited => "rate_limited",
      ApiError::Upstream { .. } => "upstream_error",
      ApiError::MalformedArtifact(_) => "malformed_artifact",
      ApiError::Internal(_) => "internal_error",
    }
  }

  pub fn status_code(&self) -> StatusCode {
    match self {
      ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
      ApiError::Upstream { timed_out: true, .. } => StatusCode::GATEWAY_TIMEOUT,
      ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
      ApiError::MalformedArtifact(_) => StatusCode::BAD_GATEWAY,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    ApiError::Upstream {
      status: e.status().map(|s| s.as_u16()),
      message: e.to_string(),
      timed_out: e.is_timeout(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    let body = json!({
      "kind": self.kind(),
      "error": self.to_string(),
    });
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds_map_to_distinct_statuses() {
    assert_eq!(
      ApiError::InvalidInput("x".into()).status_code(),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(
      ApiError::Unauthorized("x".into()).status_code(),
      StatusCode::UNAUTHORIZED
    );
    assert_eq!(
      ApiError::Forbidden("x".into()).status_code(),
      StatusCode::FORBIDDEN
    );
    assert_eq!(ApiError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
      ApiError::MalformedArtifact("x".into()).status_code(),
      StatusCode::BAD_GATEWAY
    );
    assert_eq!(
      ApiError::Internal("x".into()).status_code(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }

  #[test]
  fn upstream_timeout_is_gateway_timeout() {
    let e = ApiError::Upstream {
      status: None,
      message: "deadline exceeded".into(),
      timed_out: true,
    };
    assert_eq!(e.status_code(), StatusCode::GATEWAY_TIMEOUT);
    let e = ApiError::upstream(Some(500), "boom");
    assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(e.kind(), "upstream_error");
  }
}
