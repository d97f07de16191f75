// src/models/product.rs

use crate::models::approval::Approval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Seller-controlled listing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
  pub category_id: i32,
  pub name: String,
  pub description: Option<String>,
  pub price_cents: i64,
  pub original_price_cents: Option<i64>,
  pub sku: Option<String>,
  pub stock: i32,
  pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: i32,
  pub seller_id: i32,
  #[sqlx(flatten)]
  #[serde(flatten)]
  pub listing: ProductListing,
  pub is_active: bool,
  pub rating: f64,
  pub review_count: i32,
  #[sqlx(flatten)]
  #[serde(flatten)]
  pub approval: Approval,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Product {
  /// Visible to shoppers: approved and not withdrawn.
  pub fn is_listed(&self) -> bool {
    self.is_active && self.approval.is_approved()
  }
}
