// src/models/order.rs

use crate::models::order_item::OrderItem;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

string_enum! {
  OrderStatus, "order status" {
    Pending => "pending",
    Confirmed => "confirmed",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
  }
}

string_enum! {
  PaymentStatus, "payment status" {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
  }
}

string_enum! {
  PaymentMethod, "payment method" {
    Card => "card",
    Cod => "cod",
  }
}

impl Default for PaymentMethod {
  fn default() -> Self {
    PaymentMethod::Card
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: i32,
  pub user_id: String,
  pub order_number: String,
  #[sqlx(try_from = "String")]
  pub status: OrderStatus,
  pub subtotal_cents: i64,
  pub tax_cents: i64,
  pub shipping_cents: i64,
  pub total_cents: i64,
  #[sqlx(try_from = "String")]
  pub payment_method: PaymentMethod,
  #[sqlx(try_from = "String")]
  pub payment_status: PaymentStatus,
  pub payment_reference: Option<String>,
  pub shipping_address: serde_json::Value,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
  #[serde(flatten)]
  pub order: Order,
  pub items: Vec<OrderItem>,
}
