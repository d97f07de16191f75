// src/web/handlers/admin_handlers.rs

//! Admin endpoints. The approval routes are registered once per
//! [`ApprovalSubject`]; the subject reaches the handler as resource data.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{clean, expect_completed, run_flow};
use crate::errors::AppError;
use crate::models::{Approval, ApprovalStatus, Decision, OrderStatus};
use crate::pipelines::common_steps::missing;
use crate::pipelines::contexts::{ApprovalCtxData, AssignDeliveryCtxData};
use crate::state::AppState;
use crate::storage::{ApprovalSubject, FoodItemFilter, ProductFilter, Storage};
use crate::web::access::require_admin;
use crate::web::session::AuthenticatedUser;

#[derive(Deserialize, Debug, Default)]
pub struct RejectPayload {
  #[serde(default)]
  pub reason: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct AdminOrdersQuery {
  pub status: Option<OrderStatus>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AssignDeliveryPayload {
  pub delivery_boy_id: i32,
  pub delivery_fee_cents: Option<i64>,
  pub notes: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecisionResponse {
  message: String,
  subject: &'static str,
  id: i32,
  name: String,
  #[serde(flatten)]
  approval: Approval,
}

async fn pending_records(storage: &dyn Storage, subject: ApprovalSubject) -> Result<HttpResponse, AppError> {
  let pending = Some(ApprovalStatus::Pending);
  let response = match subject {
    ApprovalSubject::Vendor => HttpResponse::Ok().json(storage.list_sellers(pending).await?),
    ApprovalSubject::Product => {
      let filter = ProductFilter {
        approval: pending,
        ..Default::default()
      };
      HttpResponse::Ok().json(storage.list_products(&filter).await?)
    }
    ApprovalSubject::FoodVendor => HttpResponse::Ok().json(storage.list_food_vendors(pending).await?),
    ApprovalSubject::FoodItem => {
      let filter = FoodItemFilter {
        approval: pending,
        ..Default::default()
      };
      HttpResponse::Ok().json(storage.list_food_items(&filter).await?)
    }
    ApprovalSubject::ServiceProvider => HttpResponse::Ok().json(storage.list_service_providers(pending, None).await?),
    ApprovalSubject::DeliveryBoy => HttpResponse::Ok().json(storage.list_delivery_boys(pending).await?),
  };
  Ok(response)
}

#[instrument(name = "handler::admin_pending", skip(app_state, auth_user, subject), fields(user_id = %auth_user.id(), subject = subject.slug()))]
pub async fn pending_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  subject: web::Data<ApprovalSubject>,
) -> Result<HttpResponse, AppError> {
  require_admin(&auth_user)?;
  pending_records(app_state.storage.as_ref(), **subject).await
}

async fn decide(
  app_state: &AppState,
  auth_user: &AuthenticatedUser,
  subject: ApprovalSubject,
  target_id: i32,
  decision: Decision,
) -> Result<HttpResponse, AppError> {
  require_admin(auth_user)?;

  let approval_ctx = ApprovalCtxData {
    app: app_state.clone(),
    subject,
    target_id,
    decision,
    admin_id: auth_user.id().to_string(),
    target: None,
    approval: None,
    owner_notified: false,
  };
  let (outcome, data) = run_flow(app_state, approval_ctx).await?;
  expect_completed(outcome)?;

  let target = data.target.ok_or_else(|| missing("approval target"))?;
  info!(owner_notified = data.owner_notified, "Approval decision applied.");
  Ok(HttpResponse::Ok().json(DecisionResponse {
    message: format!("{} {}", subject.label(), target.approval.approval_status),
    subject: subject.slug(),
    id: target.id,
    name: target.display_name,
    approval: target.approval,
  }))
}

#[instrument(name = "handler::admin_approve", skip(app_state, auth_user, subject), fields(user_id = %auth_user.id(), subject = subject.slug()))]
pub async fn approve_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  subject: web::Data<ApprovalSubject>,
  path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
  decide(&app_state, &auth_user, **subject, path.into_inner(), Decision::Approve).await
}

#[instrument(name = "handler::admin_reject", skip(app_state, auth_user, subject, req_payload), fields(user_id = %auth_user.id(), subject = subject.slug()))]
pub async fn reject_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  subject: web::Data<ApprovalSubject>,
  path: web::Path<i32>,
  req_payload: Option<web::Json<RejectPayload>>,
) -> Result<HttpResponse, AppError> {
  let reason = req_payload.map(|payload| payload.into_inner().reason).unwrap_or_default();
  decide(&app_state, &auth_user, **subject, path.into_inner(), Decision::Reject { reason }).await
}

#[instrument(name = "handler::admin_orders", skip(app_state, auth_user), fields(user_id = %auth_user.id()))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  query: web::Query<AdminOrdersQuery>,
) -> Result<HttpResponse, AppError> {
  require_admin(&auth_user)?;
  let orders = app_state.storage.list_orders(query.status).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::assign_delivery", skip(app_state, auth_user, req_payload), fields(user_id = %auth_user.id()))]
pub async fn assign_delivery_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<i32>,
  req_payload: web::Json<AssignDeliveryPayload>,
) -> Result<HttpResponse, AppError> {
  require_admin(&auth_user)?;

  let payload = req_payload.into_inner();
  let assign_ctx = AssignDeliveryCtxData {
    app: app_state.get_ref().clone(),
    order_id: path.into_inner(),
    delivery_boy_id: payload.delivery_boy_id,
    delivery_fee_cents: payload.delivery_fee_cents.unwrap_or(0),
    notes: clean(payload.notes),
    admin_id: auth_user.id().to_string(),
    order: None,
    agent: None,
    assignment: None,
  };

  let (outcome, data) = run_flow(&app_state, assign_ctx).await?;
  expect_completed(outcome)?;

  let assignment = data.assignment.ok_or_else(|| missing("assignment"))?;
  Ok(HttpResponse::Created().json(assignment))
}
