//! HTTP mapping of store errors.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use registro_core::Error as StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not ready: {0}")]
  Unavailable(String),

  #[error(transparent)]
  Store(#[from] StoreError),
}

impl ApiError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      Self::Store(e) => store_status(e),
    }
  }
}

fn store_status(e: &StoreError) -> StatusCode {
  match e {
    StoreError::UniqueViolation(_) => StatusCode::CONFLICT,
    StoreError::InvalidIdentifier { .. } | StoreError::InvalidValue(_) => StatusCode::BAD_REQUEST,
    StoreError::MigrationStep { source, .. } => store_status(source),
    _ => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use registro_core::{DatabaseError, Dialect, ident::IdFamily};

  use super::*;

  fn db_error() -> DatabaseError {
    DatabaseError {
      backend:    Dialect::Postgres,
      code:       Some("23505".to_owned()),
      constraint: Some("estudiantes_carnet_key".to_owned()),
      message:    "duplicate key".to_owned(),
    }
  }

  #[test]
  fn store_errors_map_to_http_statuses() {
    let status = |e: StoreError| ApiError::from(e).status_code();
    assert_eq!(status(StoreError::UniqueViolation(db_error())), StatusCode::CONFLICT);
    assert_eq!(status(StoreError::InvalidValue("x".into())), StatusCode::BAD_REQUEST);
    assert_eq!(
      status(StoreError::InvalidIdentifier { family: IdFamily::StudentBadge, value: "1".into() }),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(status(StoreError::Connection("refused".into())), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(status(StoreError::Timeout(Duration::from_secs(1))), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
      status(StoreError::IdentifierExhausted { family: IdFamily::StudentBadge, attempts: 3 }),
      StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
      status(StoreError::UniqueViolation(db_error()).in_step("0007_estudiantes_carnet")),
      StatusCode::CONFLICT
    );
    assert_eq!(
      ApiError::Unavailable("starting".into()).status_code(),
      StatusCode::SERVICE_UNAVAILABLE
    );
  }
}
