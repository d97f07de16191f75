// src/models/service.rs

use crate::errors::AppError;
use crate::models::approval::Approval;
use crate::models::Party;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

string_enum! {
  BookingStatus, "booking status" {
    Pending => "pending",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
  }
}

impl BookingStatus {
  pub fn check_transition(self, to: BookingStatus, actor: Party) -> Result<(), AppError> {
    use BookingStatus::*;
    match (self, to) {
      (Pending | Confirmed, Cancelled) => Ok(()),
      (Pending, Confirmed) | (Confirmed, Completed) if actor == Party::Provider => Ok(()),
      (Pending, Confirmed) | (Confirmed, Completed) => {
        Err(AppError::Forbidden("Only the provider can confirm or complete a booking".to_string()))
      }
      (from, to) => Err(AppError::Conflict(format!("Cannot move a booking from {} to {}", from, to))),
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProvider {
  pub id: i32,
  pub user_id: String,
  pub business_name: String,
  pub service_type: String,
  pub description: Option<String>,
  pub phone: String,
  pub hourly_rate_cents: i64,
  #[sqlx(flatten)]
  #[serde(flatten)]
  pub approval: Approval,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBooking {
  pub id: i32,
  pub user_id: String,
  pub provider_id: i32,
  pub scheduled_at: DateTime<Utc>,
  pub address: String,
  pub notes: Option<String>,
  #[sqlx(try_from = "String")]
  pub status: BookingStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn booking_lifecycle() {
    assert!(BookingStatus::Pending
      .check_transition(BookingStatus::Confirmed, Party::Provider)
      .is_ok());
    assert!(BookingStatus::Confirmed
      .check_transition(BookingStatus::Completed, Party::Provider)
      .is_ok());
    assert!(BookingStatus::Confirmed
      .check_transition(BookingStatus::Cancelled, Party::Customer)
      .is_ok());
  }

  #[test]
  fn invalid_booking_moves_are_rejected() {
    assert!(matches!(
      BookingStatus::Pending.check_transition(BookingStatus::Confirmed, Party::Customer),
      Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
      BookingStatus::Completed.check_transition(BookingStatus::Cancelled, Party::Provider),
      Err(AppError::Conflict(_))
    ));
    assert!(matches!(
      BookingStatus::Pending.check_transition(BookingStatus::Completed, Party::Provider),
      Err(AppError::Conflict(_))
    ));
  }
}
