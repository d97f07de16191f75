// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
  /// Opaque string id; it is what the session cookie carries.
  pub id: String,
  pub email: String,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub profile_image_url: Option<String>,
  pub is_admin: bool,
  #[serde(skip_serializing)] // Never send password hash to client
  pub password_hash: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl User {
  pub fn display_name(&self) -> String {
    match (&self.first_name, &self.last_name) {
      (Some(first), Some(last)) => format!("{} {}", first, last),
      (Some(first), None) => first.clone(),
      _ => self.email.clone(),
    }
  }
}
