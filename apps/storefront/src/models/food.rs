// src/models/food.rs

use crate::errors::AppError;
use crate::models::approval::Approval;
use crate::models::Party;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

string_enum! {
  FoodOrderStatus, "food order status" {
    Pending => "pending",
    Accepted => "accepted",
    Preparing => "preparing",
    Ready => "ready",
    Delivered => "delivered",
    Cancelled => "cancelled",
  }
}

impl FoodOrderStatus {
  fn next(self) -> Option<FoodOrderStatus> {
    match self {
      FoodOrderStatus::Pending => Some(FoodOrderStatus::Accepted),
      FoodOrderStatus::Accepted => Some(FoodOrderStatus::Preparing),
      FoodOrderStatus::Preparing => Some(FoodOrderStatus::Ready),
      FoodOrderStatus::Ready => Some(FoodOrderStatus::Delivered),
      FoodOrderStatus::Delivered | FoodOrderStatus::Cancelled => None,
    }
  }

  /// The vendor walks the order forward one state at a time; either side may
  /// cancel while it is still pending.
  pub fn check_transition(self, to: FoodOrderStatus, actor: Party) -> Result<(), AppError> {
    if to == FoodOrderStatus::Cancelled {
      if self == FoodOrderStatus::Pending {
        return Ok(());
      }
      return Err(AppError::Conflict(format!("A {} food order can no longer be cancelled", self)));
    }
    if actor != Party::Provider {
      return Err(AppError::Forbidden("Only the vendor can advance a food order".to_string()));
    }
    if self.next() == Some(to) {
      Ok(())
    } else {
      Err(AppError::Conflict(format!("Cannot move a food order from {} to {}", self, to)))
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FoodVendor {
  pub id: i32,
  pub user_id: String,
  pub restaurant_name: String,
  pub cuisine: Option<String>,
  pub address: String,
  pub phone: String,
  #[sqlx(flatten)]
  #[serde(flatten)]
  pub approval: Approval,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FoodItem {
  pub id: i32,
  pub vendor_id: i32,
  pub name: String,
  pub description: Option<String>,
  pub price_cents: i64,
  pub is_veg: bool,
  pub is_available: bool,
  #[sqlx(flatten)]
  #[serde(flatten)]
  pub approval: Approval,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl FoodItem {
  pub fn is_orderable(&self) -> bool {
    self.is_available && self.approval.is_approved()
  }
}

/// Snapshot of one ordered dish, stored as JSON on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodOrderLine {
  pub food_item_id: i32,
  pub name: String,
  pub quantity: i32,
  pub unit_price_cents: i64,
  pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FoodOrder {
  pub id: i32,
  pub user_id: String,
  pub vendor_id: i32,
  #[sqlx(json)]
  pub lines: Vec<FoodOrderLine>,
  pub subtotal_cents: i64,
  pub delivery_fee_cents: i64,
  pub total_cents: i64,
  #[sqlx(try_from = "String")]
  pub status: FoodOrderStatus,
  pub delivery_address: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
