// src/models/seller.rs

use crate::models::approval::Approval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The editable part of a seller account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SellerProfile {
  pub business_name: String,
  pub description: Option<String>,
  pub business_address: Option<String>,
  pub business_phone: Option<String>,
  pub gst_number: Option<String>,
  pub bank_account_number: Option<String>,
  pub ifsc_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Seller {
  pub id: i32,
  pub user_id: String,
  #[sqlx(flatten)]
  #[serde(flatten)]
  pub profile: SellerProfile,
  #[sqlx(flatten)]
  #[serde(flatten)]
  pub approval: Approval,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
