// src/services/email_mock.rs

//! Stand-in mail transport. Messages are logged, not delivered.

use crate::errors::{AppError, Result as AppResult};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct SentEmailInfo {
  pub to: String,
  pub from: String,
  pub subject: String,
  pub body_preview: String,
  pub message_id: String,
}

#[instrument(name = "email_mock::send", skip(body), fields(to = %to, subject = %subject))]
pub async fn send_mock_email(to: &str, from: &str, subject: &str, body: &str) -> AppResult<SentEmailInfo> {
  if !to.contains('@') {
    warn!("Refusing to send email to an address without '@'.");
    return Err(AppError::Internal(format!("Invalid recipient address '{}'", to)));
  }
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;

  let mut body_preview: String = body.chars().take(60).collect();
  if body.chars().count() > 60 {
    body_preview.push_str("...");
  }
  let message_id = format!("mock_email_{}", uuid::Uuid::new_v4());
  info!(%message_id, "Mock email sent.");

  Ok(SentEmailInfo {
    to: to.to_string(),
    from: from.to_string(),
    subject: subject.to_string(),
    body_preview,
    message_id,
  })
}
