// src/web/handlers/food_handlers.rs

//! Restaurants, dishes and food orders. Food orders skip the cart: the
//! request names the dishes and the total is the subtotal plus a flat delivery
//! fee.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{clean, required};
use crate::errors::AppError;
use crate::models::{ApprovalStatus, FoodItem, FoodOrder, FoodOrderLine, FoodOrderStatus, FoodVendor, Party, User};
use crate::state::AppState;
use crate::storage::{FoodItemFilter, NewFoodItem, NewFoodOrder, NewFoodVendor, Storage};
use crate::web::access;
use crate::web::session::AuthenticatedUser;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterVendorPayload {
  pub restaurant_name: String,
  pub cuisine: Option<String>,
  pub address: String,
  pub phone: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFoodItemPayload {
  pub name: String,
  pub description: Option<String>,
  pub price_cents: i64,
  #[serde(default)]
  pub is_veg: bool,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct FoodItemsQuery {
  pub vendor_id: Option<i32>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct FoodOrderItemRequest {
  pub food_item_id: i32,
  pub quantity: i32,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateFoodOrderPayload {
  pub vendor_id: i32,
  pub items: Vec<FoodOrderItemRequest>,
  pub delivery_address: String,
}

#[derive(Deserialize, Debug)]
pub struct FoodOrderStatusPayload {
  pub status: FoodOrderStatus,
}

/// Prices the requested dishes against what the vendor currently offers.
fn price_food_order(
  vendor: &FoodVendor,
  requested: &[FoodOrderItemRequest],
  dishes: &[FoodItem],
) -> Result<(Vec<FoodOrderLine>, i64), AppError> {
  if requested.is_empty() {
    return Err(AppError::Validation("A food order needs at least one item".to_string()));
  }

  let mut lines = Vec::with_capacity(requested.len());
  for wanted in requested {
    if wanted.quantity <= 0 {
      return Err(AppError::Validation("Quantities must be positive".to_string()));
    }
    let dish = dishes
      .iter()
      .find(|dish| dish.id == wanted.food_item_id)
      .ok_or_else(|| AppError::not_found("Food item", wanted.food_item_id))?;
    if dish.vendor_id != vendor.id {
      return Err(AppError::Validation(format!(
        "{} is not served by {}",
        dish.name, vendor.restaurant_name
      )));
    }
    if !dish.is_orderable() {
      return Err(AppError::Validation(format!("{} is not available", dish.name)));
    }
    lines.push(FoodOrderLine {
      food_item_id: dish.id,
      name: dish.name.clone(),
      quantity: wanted.quantity,
      unit_price_cents: dish.price_cents,
      total_cents: dish.price_cents * i64::from(wanted.quantity),
    });
  }

  let subtotal = lines.iter().map(|line| line.total_cents).sum();
  Ok((lines, subtotal))
}

/// Works out whether `user` is the customer or the vendor of `order`.
async fn food_order_party(storage: &dyn Storage, user: &User, order: &FoodOrder) -> Result<Party, AppError> {
  if let Some(vendor) = storage.food_vendor_by_user(&user.id).await? {
    if vendor.id == order.vendor_id {
      return Ok(Party::Provider);
    }
  }
  if order.user_id == user.id {
    return Ok(Party::Customer);
  }
  Err(AppError::not_found("Food order", order.id))
}

#[instrument(name = "handler::register_food_vendor", skip_all, fields(user_id = %auth_user.id()))]
pub async fn register_vendor_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<RegisterVendorPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  if storage.food_vendor_by_user(auth_user.id()).await?.is_some() {
    return Err(AppError::Validation("User is already registered as a food vendor".to_string()));
  }

  let payload = req_payload.into_inner();
  let vendor = storage
    .create_food_vendor(NewFoodVendor {
      user_id: auth_user.id().to_string(),
      restaurant_name: required(&payload.restaurant_name, "restaurantName")?,
      cuisine: clean(payload.cuisine),
      address: required(&payload.address, "address")?,
      phone: required(&payload.phone, "phone")?,
    })
    .await?;
  info!(vendor_id = vendor.id, "Food vendor registered; awaiting approval.");
  Ok(HttpResponse::Created().json(vendor))
}

#[instrument(name = "handler::list_food_vendors", skip_all)]
pub async fn list_vendors_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let vendors = app_state
    .storage
    .list_food_vendors(Some(ApprovalStatus::Approved))
    .await?;
  Ok(HttpResponse::Ok().json(vendors))
}

#[instrument(name = "handler::my_food_vendor", skip_all, fields(user_id = %auth_user.id()))]
pub async fn my_vendor_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let vendor = app_state
    .storage
    .food_vendor_by_user(auth_user.id())
    .await?
    .ok_or_else(|| AppError::NotFound("Food vendor profile not found".to_string()))?;
  Ok(HttpResponse::Ok().json(vendor))
}

#[instrument(name = "handler::create_food_item", skip_all, fields(user_id = %auth_user.id()))]
pub async fn create_item_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<CreateFoodItemPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let vendor = access::approved_food_vendor_of(storage, &auth_user).await?;

  let payload = req_payload.into_inner();
  if payload.price_cents <= 0 {
    return Err(AppError::Validation("Price must be greater than zero".to_string()));
  }
  let item = storage
    .create_food_item(NewFoodItem {
      vendor_id: vendor.id,
      name: required(&payload.name, "name")?,
      description: clean(payload.description),
      price_cents: payload.price_cents,
      is_veg: payload.is_veg,
    })
    .await?;
  info!(food_item_id = item.id, vendor_id = vendor.id, "Food item created; awaiting approval.");
  Ok(HttpResponse::Created().json(item))
}

#[instrument(name = "handler::list_food_items", skip_all, fields(query = ?query))]
pub async fn list_items_handler(
  app_state: web::Data<AppState>,
  query: web::Query<FoodItemsQuery>,
) -> Result<HttpResponse, AppError> {
  let filter = FoodItemFilter {
    vendor_id: query.vendor_id,
    approval: Some(ApprovalStatus::Approved),
    available_only: true,
  };
  let items = app_state.storage.list_food_items(&filter).await?;
  Ok(HttpResponse::Ok().json(items))
}

#[instrument(name = "handler::create_food_order", skip(app_state, auth_user), fields(user_id = %auth_user.id()))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<CreateFoodOrderPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let payload = req_payload.into_inner();
  let delivery_address = required(&payload.delivery_address, "deliveryAddress")?;

  let vendor = storage
    .food_vendor_by_id(payload.vendor_id)
    .await?
    .ok_or_else(|| AppError::not_found("Food vendor", payload.vendor_id))?;
  if !vendor.approval.is_approved() {
    return Err(AppError::Validation(format!(
      "{} is not accepting orders",
      vendor.restaurant_name
    )));
  }

  let mut dishes = Vec::with_capacity(payload.items.len());
  for wanted in &payload.items {
    if let Some(dish) = storage.food_item_by_id(wanted.food_item_id).await? {
      dishes.push(dish);
    }
  }
  let (lines, subtotal_cents) = price_food_order(&vendor, &payload.items, &dishes)?;

  let delivery_fee_cents = app_state.config.food_delivery_fee_cents;
  let order = storage
    .create_food_order(NewFoodOrder {
      user_id: auth_user.id().to_string(),
      vendor_id: vendor.id,
      lines,
      subtotal_cents,
      delivery_fee_cents,
      total_cents: subtotal_cents + delivery_fee_cents,
      delivery_address,
    })
    .await?;
  info!(food_order_id = order.id, total_cents = order.total_cents, "Food order placed.");
  Ok(HttpResponse::Created().json(order))
}

#[instrument(name = "handler::my_food_orders", skip_all, fields(user_id = %auth_user.id()))]
pub async fn my_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.storage.food_orders_for_user(auth_user.id()).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::vendor_food_orders", skip_all, fields(user_id = %auth_user.id()))]
pub async fn vendor_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let vendor = access::food_vendor_of(storage, &auth_user).await?;
  let orders = storage.food_orders_for_vendor(vendor.id).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::food_order_status", skip(app_state, auth_user), fields(user_id = %auth_user.id()))]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<i32>,
  req_payload: web::Json<FoodOrderStatusPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let order_id = path.into_inner();
  let order = storage
    .food_order_by_id(order_id)
    .await?
    .ok_or_else(|| AppError::not_found("Food order", order_id))?;

  let party = food_order_party(storage, &auth_user, &order).await?;
  if let Err(err) = order.status.check_transition(req_payload.status, party) {
    warn!(food_order_id = order.id, from = %order.status, to = %req_payload.status, ?party, "Food order transition refused.");
    return Err(err);
  }

  let updated = storage
    .set_food_order_status(order.id, order.status, req_payload.status)
    .await?;
  info!(food_order_id = updated.id, status = %updated.status, "Food order status changed.");
  Ok(HttpResponse::Ok().json(updated))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Approval;
  use chrono::Utc;

  fn vendor(id: i32) -> FoodVendor {
    FoodVendor {
      id,
      user_id: format!("vendor-{id}"),
      restaurant_name: "Dosa Corner".into(),
      cuisine: Some("South Indian".into()),
      address: "MG Road".into(),
      phone: "080 1234".into(),
      approval: Approval::pending(),
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  fn dish(id: i32, vendor_id: i32, price_cents: i64, approved: bool) -> FoodItem {
    let approval = if approved {
      Approval::pending()
        .decide(&crate::models::Decision::Approve, "admin", Utc::now())
        .unwrap()
    } else {
      Approval::pending()
    };
    FoodItem {
      id,
      vendor_id,
      name: format!("dish-{id}"),
      description: None,
      price_cents,
      is_veg: true,
      is_available: true,
      approval,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  fn wanted(food_item_id: i32, quantity: i32) -> FoodOrderItemRequest {
    FoodOrderItemRequest { food_item_id, quantity }
  }

  #[test]
  fn prices_every_line() {
    let dishes = [dish(1, 7, 12_000, true), dish(2, 7, 4_500, true)];
    let (lines, subtotal) = price_food_order(&vendor(7), &[wanted(1, 2), wanted(2, 1)], &dishes).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].total_cents, 24_000);
    assert_eq!(subtotal, 28_500);
  }

  #[test]
  fn refuses_foreign_or_unapproved_dishes() {
    let dishes = [dish(1, 8, 12_000, true), dish(2, 7, 4_500, false)];
    assert!(matches!(
      price_food_order(&vendor(7), &[wanted(1, 1)], &dishes),
      Err(AppError::Validation(_))
    ));
    assert!(matches!(
      price_food_order(&vendor(7), &[wanted(2, 1)], &dishes),
      Err(AppError::Validation(_))
    ));
    assert!(matches!(
      price_food_order(&vendor(7), &[wanted(3, 1)], &dishes),
      Err(AppError::NotFound(_))
    ));
  }

  #[test]
  fn refuses_empty_orders_and_bad_quantities() {
    let dishes = [dish(1, 7, 12_000, true)];
    assert!(price_food_order(&vendor(7), &[], &dishes).is_err());
    assert!(price_food_order(&vendor(7), &[wanted(1, 0)], &dishes).is_err());
  }
}
