// src/web/handlers/delivery_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{clean, expect_completed, required, run_flow};
use crate::errors::AppError;
use crate::models::DeliveryStatus;
use crate::pipelines::common_steps::missing;
use crate::pipelines::contexts::DeliveryStatusCtxData;
use crate::state::AppState;
use crate::storage::NewDeliveryBoy;
use crate::web::access;
use crate::web::session::AuthenticatedUser;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeliveryBoyPayload {
  pub name: String,
  pub phone: String,
  pub vehicle_type: String,
  pub vehicle_number: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityPayload {
  pub is_available: bool,
}

#[derive(Deserialize, Debug)]
pub struct DeliveryStatusPayload {
  pub status: DeliveryStatus,
}

#[instrument(name = "handler::register_delivery_boy", skip_all, fields(user_id = %auth_user.id()))]
pub async fn register_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<RegisterDeliveryBoyPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  if storage.delivery_boy_by_user(auth_user.id()).await?.is_some() {
    return Err(AppError::Validation("User is already registered as a delivery agent".to_string()));
  }

  let payload = req_payload.into_inner();
  let agent = storage
    .create_delivery_boy(NewDeliveryBoy {
      user_id: auth_user.id().to_string(),
      name: required(&payload.name, "name")?,
      phone: required(&payload.phone, "phone")?,
      vehicle_type: required(&payload.vehicle_type, "vehicleType")?,
      vehicle_number: clean(payload.vehicle_number),
    })
    .await?;
  info!(delivery_boy_id = agent.id, "Delivery agent registered; awaiting approval.");
  Ok(HttpResponse::Created().json(agent))
}

#[instrument(name = "handler::my_delivery_profile", skip_all, fields(user_id = %auth_user.id()))]
pub async fn me_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let agent = app_state
    .storage
    .delivery_boy_by_user(auth_user.id())
    .await?
    .ok_or_else(|| AppError::NotFound("Delivery profile not found".to_string()))?;
  Ok(HttpResponse::Ok().json(agent))
}

#[instrument(name = "handler::delivery_availability", skip(app_state, auth_user), fields(user_id = %auth_user.id()))]
pub async fn availability_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<AvailabilityPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let agent = access::delivery_boy_of(storage, &auth_user).await?;
  let updated = storage
    .set_delivery_availability(agent.id, req_payload.is_available)
    .await?;
  Ok(HttpResponse::Ok().json(updated))
}

#[instrument(name = "handler::delivery_assignments", skip_all, fields(user_id = %auth_user.id()))]
pub async fn assignments_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let agent = access::delivery_boy_of(storage, &auth_user).await?;
  let assignments = storage.assignments_for_delivery_boy(agent.id).await?;
  Ok(HttpResponse::Ok().json(assignments))
}

#[instrument(name = "handler::delivery_status", skip(app_state, auth_user), fields(user_id = %auth_user.id()))]
pub async fn update_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<i32>,
  req_payload: web::Json<DeliveryStatusPayload>,
) -> Result<HttpResponse, AppError> {
  let status_ctx = DeliveryStatusCtxData {
    app: app_state.get_ref().clone(),
    assignment_id: path.into_inner(),
    user_id: auth_user.id().to_string(),
    requested: req_payload.status,
    assignment: None,
  };

  let (outcome, data) = run_flow(&app_state, status_ctx).await?;
  expect_completed(outcome)?;

  let assignment = data.assignment.ok_or_else(|| missing("assignment"))?;
  Ok(HttpResponse::Ok().json(assignment))
}
