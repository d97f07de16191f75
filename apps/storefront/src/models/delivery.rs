// src/models/delivery.rs

use crate::models::approval::Approval;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

string_enum! {
  DeliveryStatus, "delivery status" {
    Pending => "pending",
    Accepted => "accepted",
    PickedUp => "picked_up",
    OnTheWay => "on_the_way",
    Delivered => "delivered",
  }
}

impl DeliveryStatus {
  /// The only state an assignment may move to from `self`.
  pub fn next(self) -> Option<DeliveryStatus> {
    match self {
      DeliveryStatus::Pending => Some(DeliveryStatus::Accepted),
      DeliveryStatus::Accepted => Some(DeliveryStatus::PickedUp),
      DeliveryStatus::PickedUp => Some(DeliveryStatus::OnTheWay),
      DeliveryStatus::OnTheWay => Some(DeliveryStatus::Delivered),
      DeliveryStatus::Delivered => None,
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryBoy {
  pub id: i32,
  pub user_id: String,
  pub name: String,
  pub phone: String,
  pub vehicle_type: String,
  pub vehicle_number: Option<String>,
  pub is_available: bool,
  pub total_deliveries: i32,
  #[sqlx(flatten)]
  #[serde(flatten)]
  pub approval: Approval,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAssignment {
  pub id: i32,
  pub order_id: i32,
  pub delivery_boy_id: i32,
  #[sqlx(try_from = "String")]
  pub status: DeliveryStatus,
  pub delivery_fee_cents: i64,
  pub notes: Option<String>,
  pub assigned_by: Option<String>,
  pub assigned_at: DateTime<Utc>,
  pub accepted_at: Option<DateTime<Utc>>,
  pub picked_up_at: Option<DateTime<Utc>>,
  pub on_the_way_at: Option<DateTime<Utc>>,
  pub delivered_at: Option<DateTime<Utc>>,
}

impl DeliveryAssignment {
  pub fn is_active(&self) -> bool {
    self.status != DeliveryStatus::Delivered
  }

  /// Moves to `status` and stamps the matching timestamp.
  pub fn stamp(&mut self, status: DeliveryStatus, at: DateTime<Utc>) {
    self.status = status;
    match status {
      DeliveryStatus::Pending => self.assigned_at = at,
      DeliveryStatus::Accepted => self.accepted_at = Some(at),
      DeliveryStatus::PickedUp => self.picked_up_at = Some(at),
      DeliveryStatus::OnTheWay => self.on_the_way_at = Some(at),
      DeliveryStatus::Delivered => self.delivered_at = Some(at),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn delivery_moves_one_state_at_a_time() {
    let mut status = DeliveryStatus::Pending;
    let mut seen = vec![status];
    while let Some(next) = status.next() {
      status = next;
      seen.push(status);
    }
    assert_eq!(
      seen,
      vec![
        DeliveryStatus::Pending,
        DeliveryStatus::Accepted,
        DeliveryStatus::PickedUp,
        DeliveryStatus::OnTheWay,
        DeliveryStatus::Delivered,
      ]
    );
  }
}
