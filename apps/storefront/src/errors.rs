// src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use shopnish_flow::FlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Required: {0}")]
  Unauthorized(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Payment Processing Error: {0}")]
  Payment(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Database(sqlx::Error),

  #[error("Migration Error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("Flow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Flow halted at step '{step}'")]
  Halted { step: String },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
    AppError::NotFound(format!("{} {} not found", what, id))
  }
}

/// Unique and foreign-key violations are client mistakes, everything else the
/// database reports is ours.
impl From<sqlx::Error> for AppError {
  fn from(err: sqlx::Error) -> Self {
    if let sqlx::Error::Database(db_err) = &err {
      let constraint = db_err.constraint().unwrap_or("unknown").to_string();
      if db_err.is_unique_violation() {
        return AppError::Conflict(format!("A record with the same value already exists ({})", constraint));
      }
      if db_err.is_foreign_key_violation() {
        return AppError::Validation(format!("Referenced record does not exist ({})", constraint));
      }
    }
    AppError::Database(err)
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::from(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
      AppError::Config(_)
      | AppError::Database(_)
      | AppError::Migration(_)
      | AppError::Workflow { .. }
      | AppError::Halted { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    let message = match self {
      AppError::Validation(m)
      | AppError::Unauthorized(m)
      | AppError::Forbidden(m)
      | AppError::NotFound(m)
      | AppError::Conflict(m)
      | AppError::Payment(m) => m.clone(),
      AppError::Database(_) | AppError::Migration(_) => "Database operation failed".to_string(),
      AppError::Workflow { .. } | AppError::Halted { .. } => "Request processing failed".to_string(),
      AppError::Config(_) | AppError::Internal(_) => "An internal error occurred".to_string(),
    };

    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with server error");
    } else {
      tracing::debug!(application_error = %self, status = status.as_u16(), "Responding with client error");
    }

    HttpResponse::build(status).json(json!({ "message": message }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::body::to_bytes;

  #[actix_web::test]
  async fn client_errors_keep_their_message() {
    let response = AppError::Conflict("Vendor is already approved".into()).error_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = to_bytes(response.into_body()).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["message"], "Vendor is already approved");
  }

  #[actix_web::test]
  async fn server_errors_hide_details() {
    let response = AppError::Internal("connection string postgres://secret".into()).error_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(response.into_body()).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(!text.contains("secret"));
  }

  #[test]
  fn flow_errors_convert() {
    let err: AppError = FlowError::HandlerMissing { step: "place_order".into() }.into();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(matches!(err, AppError::Workflow { .. }));
  }
}
