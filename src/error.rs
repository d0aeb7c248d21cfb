//! Error types for the giveaway engine

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Database(#[from] DbErr),

  #[error("Giveaway {0} not found")]
  GiveawayNotFound(i64),

  #[error("Prize {0} not found")]
  PrizeNotFound(i64),

  /// Stored data the engine cannot act on, e.g. a place without a prize.
  #[error("Invalid data: {0}")]
  InvalidData(String),

  #[error("Validation failed: {0}")]
  Validation(String),

  /// Another worker currently owns the giveaway.
  #[error("Giveaway {0} is being processed")]
  Busy(i64),

  #[error("Verification service unavailable: {0}")]
  Verification(String),
}

impl Error {
  /// Only transient infrastructure failures are worth another attempt in the
  /// same discovery cycle.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Error::Database(_) | Error::Verification(_))
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::GiveawayNotFound(_) | Error::PrizeNotFound(_) => {
        StatusCode::NOT_FOUND
      }
      Error::Validation(_) => StatusCode::BAD_REQUEST,
      Error::Busy(_) => StatusCode::CONFLICT,
      Error::InvalidData(_) => StatusCode::UNPROCESSABLE_ENTITY,
      Error::Verification(_) => StatusCode::BAD_GATEWAY,
      Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match &self {
      Error::Database(err) => {
        tracing::error!("Database error: {err}");
        "Database error".to_string()
      }
      other => other.to_string(),
    };

    let body = json::json!({
      "success": false,
      "error": message
    });

    (status, axum::Json(body)).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
