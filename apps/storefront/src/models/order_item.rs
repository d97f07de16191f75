// src/models/order_item.rs

use serde::Serialize;
use sqlx::FromRow;

/// A line of a placed order. Name and price are copied from the product at
/// checkout time and never change afterwards.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub id: i32,
  pub order_id: i32,
  pub product_id: i32,
  pub seller_id: i32,
  pub product_name: String,
  pub quantity: i32,
  pub unit_price_cents: i64,
  pub total_cents: i64,
}
