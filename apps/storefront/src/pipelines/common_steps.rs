// src/pipelines/common_steps.rs

//! Pieces shared by several flows.

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::email_mock;
use tracing::{info, instrument, warn};

/// A step found the result of an earlier step missing. Only reachable when a
/// flow is wired in the wrong order.
pub fn missing(what: &str) -> AppError {
  AppError::Internal(format!("{} missing from flow context", what))
}

/// Sends a best-effort notification. Failures are logged and reported as
/// `false`; they never fail the surrounding flow.
#[instrument(name = "common_step::notify", skip(config, body), fields(%to, %subject))]
pub async fn notify(config: &AppConfig, to: &str, subject: &str, body: &str) -> bool {
  match email_mock::send_mock_email(to, &config.mail_sender, subject, body).await {
    Ok(sent) => {
      info!(message_id = %sent.message_id, "Notification sent.");
      true
    }
    Err(e) => {
      warn!(error = %e, "Notification failed; continuing.");
      false
    }
  }
}
