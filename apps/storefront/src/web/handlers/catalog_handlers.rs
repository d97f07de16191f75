// src/web/handlers/catalog_handlers.rs

//! Categories and products. Shoppers only ever see approved, active products;
//! sellers manage their own listings in every state.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{clean, required};
use crate::errors::AppError;
use crate::models::category::slugify;
use crate::models::product::ProductListing;
use crate::models::Product;
use crate::state::AppState;
use crate::storage::{NewCategory, ProductFilter, Storage};
use crate::web::access;
use crate::web::session::AuthenticatedUser;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryPayload {
  pub name: String,
  pub slug: Option<String>,
  pub description: Option<String>,
  pub image_url: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListProductsQuery {
  pub category_id: Option<i32>,
  pub seller_id: Option<i32>,
  pub search: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPayload {
  pub category_id: i32,
  pub name: String,
  pub description: Option<String>,
  pub price_cents: i64,
  pub original_price_cents: Option<i64>,
  pub sku: Option<String>,
  #[serde(default)]
  pub stock: i32,
  #[serde(default)]
  pub images: Vec<String>,
}

/// Every field optional; absent fields keep their current value.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductPayload {
  pub category_id: Option<i32>,
  pub name: Option<String>,
  pub description: Option<String>,
  pub price_cents: Option<i64>,
  pub original_price_cents: Option<i64>,
  pub sku: Option<String>,
  pub stock: Option<i32>,
  pub images: Option<Vec<String>>,
}

impl UpdateProductPayload {
  fn apply_to(self, mut listing: ProductListing) -> ProductListing {
    if let Some(category_id) = self.category_id {
      listing.category_id = category_id;
    }
    if let Some(name) = self.name {
      listing.name = name.trim().to_string();
    }
    if self.description.is_some() {
      listing.description = clean(self.description);
    }
    if let Some(price) = self.price_cents {
      listing.price_cents = price;
    }
    if self.original_price_cents.is_some() {
      listing.original_price_cents = self.original_price_cents;
    }
    if self.sku.is_some() {
      listing.sku = clean(self.sku);
    }
    if let Some(stock) = self.stock {
      listing.stock = stock;
    }
    if let Some(images) = self.images {
      listing.images = images;
    }
    listing
  }
}

fn validate_listing(listing: &ProductListing) -> Result<(), AppError> {
  if listing.name.is_empty() {
    return Err(AppError::Validation("name is required".to_string()));
  }
  if listing.price_cents <= 0 {
    return Err(AppError::Validation("Price must be greater than zero".to_string()));
  }
  if listing.stock < 0 {
    return Err(AppError::Validation("Stock cannot be negative".to_string()));
  }
  if listing
    .original_price_cents
    .is_some_and(|original| original < listing.price_cents)
  {
    return Err(AppError::Validation(
      "Original price cannot be lower than the selling price".to_string(),
    ));
  }
  Ok(())
}

async fn ensure_category(storage: &dyn Storage, category_id: i32) -> Result<(), AppError> {
  match storage.category_by_id(category_id).await? {
    Some(_) => Ok(()),
    None => Err(AppError::Validation(format!("Category {} does not exist", category_id))),
  }
}

/// Loads a product the caller's seller account owns.
async fn owned_product(storage: &dyn Storage, auth_user: &AuthenticatedUser, product_id: i32) -> Result<Product, AppError> {
  let product = storage
    .product_by_id(product_id)
    .await?
    .ok_or_else(|| AppError::not_found("Product", product_id))?;
  let seller = access::seller_of(storage, auth_user).await?;
  if product.seller_id != seller.id {
    warn!(product_id, seller_id = seller.id, "Seller tried to change another seller's product.");
    return Err(AppError::Forbidden("You can only manage your own products".to_string()));
  }
  Ok(product)
}

// --- Categories ---

#[instrument(name = "handler::list_categories", skip_all)]
pub async fn list_categories_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let categories = app_state.storage.list_categories(true).await?;
  Ok(HttpResponse::Ok().json(categories))
}

#[instrument(name = "handler::create_category", skip_all, fields(user_id = %auth_user.id()))]
pub async fn create_category_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<CreateCategoryPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  access::require_admin_or_approved_seller(storage, &auth_user).await?;

  let payload = req_payload.into_inner();
  let name = required(&payload.name, "name")?;
  let slug = match clean(payload.slug) {
    Some(slug) => slugify(&slug),
    None => slugify(&name),
  };
  if slug.is_empty() {
    return Err(AppError::Validation("A category needs a name with letters or digits".to_string()));
  }

  let category = storage
    .create_category(NewCategory {
      name,
      slug,
      description: clean(payload.description),
      image_url: clean(payload.image_url),
    })
    .await?;
  info!(category_id = category.id, slug = %category.slug, "Category created.");
  Ok(HttpResponse::Created().json(category))
}

// --- Products ---

#[instrument(name = "handler::list_products", skip_all, fields(query = ?query_params))]
pub async fn list_products_handler(
  app_state: web::Data<AppState>,
  query_params: web::Query<ListProductsQuery>,
) -> Result<HttpResponse, AppError> {
  let query = query_params.into_inner();
  let filter = ProductFilter {
    category_id: query.category_id,
    seller_id: query.seller_id,
    search: clean(query.search),
    ..ProductFilter::listed()
  };
  let products = app_state.storage.list_products(&filter).await?;
  Ok(HttpResponse::Ok().json(products))
}

#[instrument(name = "handler::get_product", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();
  let product = app_state
    .storage
    .product_by_id(product_id)
    .await?
    .filter(Product::is_listed)
    .ok_or_else(|| AppError::not_found("Product", product_id))?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::create_product", skip_all, fields(user_id = %auth_user.id()))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<CreateProductPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let seller = access::approved_seller_of(storage, &auth_user).await?;

  let payload = req_payload.into_inner();
  let listing = ProductListing {
    category_id: payload.category_id,
    name: payload.name.trim().to_string(),
    description: clean(payload.description),
    price_cents: payload.price_cents,
    original_price_cents: payload.original_price_cents,
    sku: clean(payload.sku),
    stock: payload.stock,
    images: payload.images,
  };
  validate_listing(&listing)?;
  ensure_category(storage, listing.category_id).await?;

  let product = storage.create_product(seller.id, listing).await?;
  info!(product_id = product.id, seller_id = seller.id, "Product created; awaiting approval.");
  Ok(HttpResponse::Created().json(product))
}

#[instrument(name = "handler::update_product", skip(app_state, auth_user, req_payload), fields(user_id = %auth_user.id()))]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<i32>,
  req_payload: web::Json<UpdateProductPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let product = owned_product(storage, &auth_user, path.into_inner()).await?;

  let listing = req_payload.into_inner().apply_to(product.listing.clone());
  validate_listing(&listing)?;
  if listing.category_id != product.listing.category_id {
    ensure_category(storage, listing.category_id).await?;
  }

  let updated = storage.update_product(product.id, listing).await?;
  info!(product_id = updated.id, "Product updated.");
  Ok(HttpResponse::Ok().json(updated))
}

#[instrument(name = "handler::delete_product", skip(app_state, auth_user), fields(user_id = %auth_user.id()))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let product = owned_product(storage, &auth_user, path.into_inner()).await?;
  storage.deactivate_product(product.id).await?;
  info!(product_id = product.id, "Product withdrawn.");
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::seller_products", skip_all, fields(user_id = %auth_user.id()))]
pub async fn seller_products_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let seller = access::seller_of(storage, &auth_user).await?;
  let filter = ProductFilter {
    seller_id: Some(seller.id),
    ..Default::default()
  };
  let products = storage.list_products(&filter).await?;
  Ok(HttpResponse::Ok().json(products))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn listing() -> ProductListing {
    ProductListing {
      category_id: 1,
      name: "Kettle".into(),
      description: None,
      price_cents: 129_900,
      original_price_cents: None,
      sku: None,
      stock: 4,
      images: vec![],
    }
  }

  #[test]
  fn listing_rules() {
    assert!(validate_listing(&listing()).is_ok());
    assert!(validate_listing(&ProductListing { price_cents: 0, ..listing() }).is_err());
    assert!(validate_listing(&ProductListing { stock: -1, ..listing() }).is_err());
    assert!(validate_listing(&ProductListing {
      original_price_cents: Some(100),
      ..listing()
    })
    .is_err());
    assert!(validate_listing(&ProductListing {
      original_price_cents: Some(149_900),
      ..listing()
    })
    .is_ok());
  }

  #[test]
  fn partial_update_keeps_untouched_fields() {
    let patch = UpdateProductPayload {
      stock: Some(10),
      sku: Some("  ".into()),
      ..Default::default()
    };
    let updated = patch.apply_to(ProductListing {
      sku: Some("KT-1".into()),
      ..listing()
    });
    assert_eq!(updated.stock, 10);
    assert_eq!(updated.name, "Kettle");
    assert_eq!(updated.sku, None);
  }
}
