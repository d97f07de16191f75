// src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{expect_completed, run_flow};
use crate::errors::AppError;
use crate::models::CartItem;
use crate::pipelines::common_steps::missing;
use crate::pipelines::contexts::AddToCartCtxData;
use crate::state::AppState;
use crate::storage::{insufficient_stock, Storage};
use crate::web::session::AuthenticatedUser;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartPayload {
  pub product_id: i32,
  pub quantity: i32,
}

#[derive(Deserialize, Debug)]
pub struct UpdateCartItemPayload {
  pub quantity: i32,
}

async fn own_cart_item(storage: &dyn Storage, auth_user: &AuthenticatedUser, item_id: i32) -> Result<CartItem, AppError> {
  let item = storage
    .cart_item(item_id)
    .await?
    .ok_or_else(|| AppError::not_found("Cart item", item_id))?;
  if item.user_id != auth_user.id() {
    warn!(cart_item_id = item_id, "Attempt to touch another user's cart item.");
    return Err(AppError::Forbidden("That cart item belongs to someone else".to_string()));
  }
  Ok(item)
}

#[instrument(name = "handler::get_cart", skip_all, fields(user_id = %auth_user.id()))]
pub async fn get_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let lines = app_state.storage.cart_lines(auth_user.id()).await?;
  Ok(HttpResponse::Ok().json(lines))
}

#[instrument(
    name = "handler::add_to_cart",
    skip(app_state, auth_user),
    fields(user_id = %auth_user.id())
)]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<AddToCartPayload>,
) -> Result<HttpResponse, AppError> {
  let add_to_cart_ctx = AddToCartCtxData {
    app: app_state.get_ref().clone(),
    user_id: auth_user.id().to_string(),
    product_id: req_payload.product_id,
    quantity: req_payload.quantity,
    product: None,
    cart_item: None,
  };

  let (outcome, data) = run_flow(&app_state, add_to_cart_ctx).await?;
  expect_completed(outcome)?;

  let cart_item = data.cart_item.ok_or_else(|| missing("cart item"))?;
  Ok(HttpResponse::Created().json(cart_item))
}

/// A quantity of zero or less removes the line.
#[instrument(name = "handler::update_cart_item", skip(app_state, auth_user), fields(user_id = %auth_user.id()))]
pub async fn update_cart_item_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<i32>,
  req_payload: web::Json<UpdateCartItemPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let item = own_cart_item(storage, &auth_user, path.into_inner()).await?;
  let quantity = req_payload.quantity;

  if quantity <= 0 {
    storage.remove_cart_item(item.id).await?;
    info!(cart_item_id = item.id, "Cart item removed by zero quantity.");
    return Ok(HttpResponse::NoContent().finish());
  }

  // A product that was delisted since it went into the cart can still be
  // removed but no longer raised.
  let product = storage
    .product_by_id(item.product_id)
    .await?
    .filter(|p| p.is_listed())
    .ok_or_else(|| AppError::not_found("Product", item.product_id))?;
  if quantity > product.listing.stock {
    return Err(insufficient_stock(product.listing.stock));
  }

  let updated = storage.set_cart_quantity(item.id, quantity).await?;
  Ok(HttpResponse::Ok().json(updated))
}

#[instrument(name = "handler::remove_cart_item", skip(app_state, auth_user), fields(user_id = %auth_user.id()))]
pub async fn remove_cart_item_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let item = own_cart_item(storage, &auth_user, path.into_inner()).await?;
  storage.remove_cart_item(item.id).await?;
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::clear_cart", skip_all, fields(user_id = %auth_user.id()))]
pub async fn clear_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  app_state.storage.clear_cart(auth_user.id()).await?;
  Ok(HttpResponse::NoContent().finish())
}
