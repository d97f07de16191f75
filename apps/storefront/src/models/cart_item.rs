// src/models/cart_item.rs

use crate::models::product::Product;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
  pub id: i32,
  pub user_id: String,
  pub product_id: i32,
  pub quantity: i32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A cart row together with the product it points at.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
  #[serde(flatten)]
  pub item: CartItem,
  pub product: Product,
}

impl CartLine {
  pub fn line_total_cents(&self) -> i64 {
    self.product.listing.price_cents * i64::from(self.item.quantity)
  }
}
