// src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::{expect_completed, run_flow};
use crate::errors::AppError;
use crate::models::PaymentMethod;
use crate::pipelines::common_steps::missing;
use crate::pipelines::contexts::CheckoutCtxData;
use crate::state::AppState;
use crate::web::session::AuthenticatedUser;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequestPayload {
  #[serde(default)]
  pub shipping_address: serde_json::Value,
  #[serde(default)]
  pub payment_method: PaymentMethod,
}

// --- Handler Implementation ---

#[instrument(
    name = "handler::start_checkout",
    skip(app_state, auth_user, req_payload),
    fields(user_id = %auth_user.id(), payment_method = %req_payload.payment_method)
)]
pub async fn start_checkout_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<CheckoutRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let checkout_ctx = CheckoutCtxData {
    app: app_state.get_ref().clone(),
    customer: auth_user.into_inner(),
    shipping_address: payload.shipping_address,
    payment_method: payload.payment_method,
    lines: Vec::new(),
    price: None,
    order: None,
    payment_intent: None,
    confirmation_sent: false,
  };

  let (outcome, data) = run_flow(&app_state, checkout_ctx).await?;
  expect_completed(outcome)?;

  let placed = data.order.ok_or_else(|| missing("order"))?;
  let order = placed.order;
  info!(
    order_id = order.id,
    order_number = %order.order_number,
    confirmation_sent = data.confirmation_sent,
    "Checkout completed."
  );

  Ok(HttpResponse::Created().json(json!({
      "message": "Order placed successfully",
      "orderId": order.id,
      "orderNumber": order.order_number,
      "status": order.status,
      "total": order.total_cents,
      "paymentMethod": order.payment_method,
      "paymentReference": order.payment_reference,
      "clientSecret": data.payment_intent.map(|intent| intent.client_secret),
  })))
}

#[instrument(name = "handler::list_orders", skip_all, fields(user_id = %auth_user.id()))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.storage.orders_for_user(auth_user.id()).await?;
  Ok(HttpResponse::Ok().json(orders))
}

/// Visible to the customer who placed it and to admins. Anyone else gets the
/// same 404 as for a missing order.
#[instrument(name = "handler::get_order", skip(app_state, auth_user), fields(user_id = %auth_user.id()))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = app_state
    .storage
    .order_by_id(order_id)
    .await?
    .filter(|found| auth_user.is_admin || found.order.user_id == auth_user.id())
    .ok_or_else(|| AppError::not_found("Order", order_id))?;
  Ok(HttpResponse::Ok().json(order))
}
