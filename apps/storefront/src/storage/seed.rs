// src/storage/seed.rs

//! Startup data: the development admin and an optional demo catalogue.

use super::{NewCategory, NewUser, Storage};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::{category::slugify, User};
use tracing::{info, instrument};

pub const DEV_USER_ID: &str = "dev-user-123";
pub const DEV_USER_EMAIL: &str = "developer@example.com";

const DEMO_CATEGORIES: &[(&str, &str)] = &[
  ("Electronics", "Phones, laptops and accessories"),
  ("Fashion", "Clothing, footwear and jewellery"),
  ("Home & Kitchen", "Furniture, cookware and decor"),
  ("Groceries", "Daily essentials and fresh produce"),
  ("Books", "Fiction, non-fiction and textbooks"),
];

/// The account anonymous requests act as while development auth is on.
pub fn dev_user() -> NewUser {
  NewUser {
    id: DEV_USER_ID.to_string(),
    email: DEV_USER_EMAIL.to_string(),
    first_name: Some("Developer".to_string()),
    last_name: Some("User".to_string()),
    password_hash: None,
    is_admin: true,
  }
}

#[instrument(name = "seed::dev_user", skip_all)]
pub async fn ensure_dev_user(storage: &dyn Storage) -> Result<User> {
  let user = storage.upsert_user(dev_user()).await?;
  info!(user_id = %user.id, "Development admin is ready.");
  Ok(user)
}

/// Inserts the demo categories that are not there yet. Returns how many were
/// created.
#[instrument(name = "seed::categories", skip_all)]
pub async fn seed_demo_categories(storage: &dyn Storage) -> Result<usize> {
  let mut created = 0;
  for (name, description) in DEMO_CATEGORIES {
    let outcome = storage
      .create_category(NewCategory {
        name: name.to_string(),
        slug: slugify(name),
        description: Some(description.to_string()),
        image_url: None,
      })
      .await;
    match outcome {
      Ok(_) => created += 1,
      Err(AppError::Conflict(_)) => {}
      Err(e) => return Err(e),
    }
  }
  info!(created, "Demo categories seeded.");
  Ok(created)
}

/// Runs whatever seeding the configuration asks for.
pub async fn run(storage: &dyn Storage, config: &AppConfig) -> Result<()> {
  if config.dev_auth {
    ensure_dev_user(storage).await?;
  }
  if config.seed_db {
    seed_demo_categories(storage).await?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStorage;

  #[tokio::test]
  async fn seeding_twice_is_harmless() {
    let storage = MemoryStorage::new();
    assert_eq!(seed_demo_categories(&storage).await.unwrap(), DEMO_CATEGORIES.len());
    assert_eq!(seed_demo_categories(&storage).await.unwrap(), 0);

    let first = ensure_dev_user(&storage).await.unwrap();
    let second = ensure_dev_user(&storage).await.unwrap();
    assert_eq!(first.id, second.id);
    assert!(second.is_admin);
  }
}
