// src/web/handlers/service_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{clean, required};
use crate::errors::AppError;
use crate::models::{ApprovalStatus, BookingStatus, Party, ServiceBooking, User};
use crate::state::AppState;
use crate::storage::{NewBooking, NewServiceProvider, Storage};
use crate::web::access;
use crate::web::session::AuthenticatedUser;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProviderPayload {
  pub business_name: String,
  pub service_type: String,
  pub description: Option<String>,
  pub phone: String,
  #[serde(default)]
  pub hourly_rate_cents: i64,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersQuery {
  pub service_type: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingPayload {
  pub provider_id: i32,
  pub scheduled_at: DateTime<Utc>,
  pub address: String,
  pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct BookingStatusPayload {
  pub status: BookingStatus,
}

async fn booking_party(storage: &dyn Storage, user: &User, booking: &ServiceBooking) -> Result<Party, AppError> {
  if let Some(provider) = storage.service_provider_by_user(&user.id).await? {
    if provider.id == booking.provider_id {
      return Ok(Party::Provider);
    }
  }
  if booking.user_id == user.id {
    return Ok(Party::Customer);
  }
  Err(AppError::not_found("Booking", booking.id))
}

#[instrument(name = "handler::register_service_provider", skip_all, fields(user_id = %auth_user.id()))]
pub async fn register_provider_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<RegisterProviderPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  if storage.service_provider_by_user(auth_user.id()).await?.is_some() {
    return Err(AppError::Validation(
      "User is already registered as a service provider".to_string(),
    ));
  }

  let payload = req_payload.into_inner();
  if payload.hourly_rate_cents < 0 {
    return Err(AppError::Validation("hourlyRateCents must not be negative".to_string()));
  }
  let provider = storage
    .create_service_provider(NewServiceProvider {
      user_id: auth_user.id().to_string(),
      business_name: required(&payload.business_name, "businessName")?,
      service_type: required(&payload.service_type, "serviceType")?.to_lowercase(),
      description: clean(payload.description),
      phone: required(&payload.phone, "phone")?,
      hourly_rate_cents: payload.hourly_rate_cents,
    })
    .await?;
  info!(provider_id = provider.id, "Service provider registered; awaiting approval.");
  Ok(HttpResponse::Created().json(provider))
}

#[instrument(name = "handler::list_service_providers", skip_all, fields(query = ?query))]
pub async fn list_providers_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ProvidersQuery>,
) -> Result<HttpResponse, AppError> {
  let service_type = clean(query.into_inner().service_type).map(|kind| kind.to_lowercase());
  let providers = app_state
    .storage
    .list_service_providers(Some(ApprovalStatus::Approved), service_type.as_deref())
    .await?;
  Ok(HttpResponse::Ok().json(providers))
}

#[instrument(name = "handler::my_service_provider", skip_all, fields(user_id = %auth_user.id()))]
pub async fn my_provider_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let provider = app_state
    .storage
    .service_provider_by_user(auth_user.id())
    .await?
    .ok_or_else(|| AppError::NotFound("Service provider profile not found".to_string()))?;
  Ok(HttpResponse::Ok().json(provider))
}

#[instrument(name = "handler::create_booking", skip(app_state, auth_user), fields(user_id = %auth_user.id()))]
pub async fn create_booking_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<CreateBookingPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let payload = req_payload.into_inner();

  let provider = storage
    .service_provider_by_id(payload.provider_id)
    .await?
    .ok_or_else(|| AppError::not_found("Service provider", payload.provider_id))?;
  if !provider.approval.is_approved() {
    return Err(AppError::Validation(format!(
      "{} is not taking bookings",
      provider.business_name
    )));
  }
  if payload.scheduled_at <= Utc::now() {
    return Err(AppError::Validation("scheduledAt must be in the future".to_string()));
  }

  let booking = storage
    .create_booking(NewBooking {
      user_id: auth_user.id().to_string(),
      provider_id: provider.id,
      scheduled_at: payload.scheduled_at,
      address: required(&payload.address, "address")?,
      notes: clean(payload.notes),
    })
    .await?;
  info!(booking_id = booking.id, provider_id = provider.id, "Service booked.");
  Ok(HttpResponse::Created().json(booking))
}

#[instrument(name = "handler::my_bookings", skip_all, fields(user_id = %auth_user.id()))]
pub async fn my_bookings_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let bookings = app_state.storage.bookings_for_user(auth_user.id()).await?;
  Ok(HttpResponse::Ok().json(bookings))
}

#[instrument(name = "handler::provider_bookings", skip_all, fields(user_id = %auth_user.id()))]
pub async fn provider_bookings_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let provider = access::service_provider_of(storage, &auth_user).await?;
  let bookings = storage.bookings_for_provider(provider.id).await?;
  Ok(HttpResponse::Ok().json(bookings))
}

#[instrument(name = "handler::booking_status", skip(app_state, auth_user), fields(user_id = %auth_user.id()))]
pub async fn update_booking_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<i32>,
  req_payload: web::Json<BookingStatusPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let booking_id = path.into_inner();
  let booking = storage
    .booking_by_id(booking_id)
    .await?
    .ok_or_else(|| AppError::not_found("Booking", booking_id))?;

  let party = booking_party(storage, &auth_user, &booking).await?;
  if let Err(err) = booking.status.check_transition(req_payload.status, party) {
    warn!(booking_id, from = %booking.status, to = %req_payload.status, ?party, "Booking transition refused.");
    return Err(err);
  }

  let updated = storage
    .set_booking_status(booking.id, booking.status, req_payload.status)
    .await?;
  info!(booking_id, status = %updated.status, "Booking status changed.");
  Ok(HttpResponse::Ok().json(updated))
}
