// src/web/handlers/seller_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{clean, required};
use crate::errors::AppError;
use crate::models::SellerProfile;
use crate::state::AppState;
use crate::web::access;
use crate::web::session::AuthenticatedUser;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSellerPayload {
  pub business_name: String,
  pub description: Option<String>,
  pub business_address: Option<String>,
  pub business_phone: Option<String>,
  pub gst_number: Option<String>,
  pub bank_account_number: Option<String>,
  pub ifsc_code: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSellerPayload {
  pub business_name: Option<String>,
  pub description: Option<String>,
  pub business_address: Option<String>,
  pub business_phone: Option<String>,
  pub gst_number: Option<String>,
  pub bank_account_number: Option<String>,
  pub ifsc_code: Option<String>,
}

impl UpdateSellerPayload {
  fn apply_to(self, mut profile: SellerProfile) -> Result<SellerProfile, AppError> {
    if let Some(name) = self.business_name {
      profile.business_name = required(&name, "businessName")?;
    }
    let replace = |field: &mut Option<String>, value: Option<String>| {
      if value.is_some() {
        *field = clean(value);
      }
    };
    replace(&mut profile.description, self.description);
    replace(&mut profile.business_address, self.business_address);
    replace(&mut profile.business_phone, self.business_phone);
    replace(&mut profile.gst_number, self.gst_number);
    replace(&mut profile.bank_account_number, self.bank_account_number);
    replace(&mut profile.ifsc_code, self.ifsc_code);
    Ok(profile)
  }
}

#[instrument(name = "handler::register_seller", skip_all, fields(user_id = %auth_user.id()))]
pub async fn register_seller_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<RegisterSellerPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  if storage.seller_by_user(auth_user.id()).await?.is_some() {
    return Err(AppError::Validation("User is already registered as a seller".to_string()));
  }

  let payload = req_payload.into_inner();
  let profile = SellerProfile {
    business_name: required(&payload.business_name, "businessName")?,
    description: clean(payload.description),
    business_address: clean(payload.business_address),
    business_phone: clean(payload.business_phone),
    gst_number: clean(payload.gst_number),
    bank_account_number: clean(payload.bank_account_number),
    ifsc_code: clean(payload.ifsc_code),
  };
  let seller = storage.create_seller(auth_user.id(), profile).await?;
  info!(seller_id = seller.id, "Seller registered; awaiting approval.");
  Ok(HttpResponse::Created().json(seller))
}

#[instrument(name = "handler::my_seller", skip_all, fields(user_id = %auth_user.id()))]
pub async fn my_seller_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let seller = app_state
    .storage
    .seller_by_user(auth_user.id())
    .await?
    .ok_or_else(|| AppError::NotFound("Seller profile not found".to_string()))?;
  Ok(HttpResponse::Ok().json(seller))
}

#[instrument(name = "handler::update_my_seller", skip_all, fields(user_id = %auth_user.id()))]
pub async fn update_my_seller_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<UpdateSellerPayload>,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let seller = storage
    .seller_by_user(auth_user.id())
    .await?
    .ok_or_else(|| AppError::NotFound("Seller profile not found".to_string()))?;

  let profile = req_payload.into_inner().apply_to(seller.profile)?;
  let updated = storage.update_seller_profile(seller.id, profile).await?;
  info!(seller_id = updated.id, "Seller profile updated.");
  Ok(HttpResponse::Ok().json(updated))
}

/// Orders that contain the caller's products, each trimmed to the caller's
/// lines.
#[instrument(name = "handler::seller_orders", skip_all, fields(user_id = %auth_user.id()))]
pub async fn seller_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let storage = app_state.storage.as_ref();
  let seller = access::seller_of(storage, &auth_user).await?;
  let orders = storage.orders_for_seller(seller.id).await?;
  Ok(HttpResponse::Ok().json(orders))
}
