// src/models/category.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  pub id: i32,
  pub name: String,
  pub slug: String,
  pub description: Option<String>,
  pub image_url: Option<String>,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
}

/// Lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(name: &str) -> String {
  let mut slug = String::with_capacity(name.len());
  for ch in name.chars() {
    if ch.is_ascii_alphanumeric() {
      slug.push(ch.to_ascii_lowercase());
    } else if !slug.is_empty() && !slug.ends_with('-') {
      slug.push('-');
    }
  }
  while slug.ends_with('-') {
    slug.pop();
  }
  slug
}
