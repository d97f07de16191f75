// src/web/access.rs

//! Role checks shared by handlers. Each role is a row owned by the user, so
//! the checks are lookups rather than claims on the session.

use crate::errors::{AppError, Result};
use crate::models::{DeliveryBoy, FoodVendor, Seller, ServiceProvider, User};
use crate::storage::Storage;

pub fn require_admin(user: &User) -> Result<()> {
  if user.is_admin {
    Ok(())
  } else {
    Err(AppError::Forbidden("Admin access required".to_string()))
  }
}

/// The caller's seller account in any approval state.
pub async fn seller_of(storage: &dyn Storage, user: &User) -> Result<Seller> {
  storage
    .seller_by_user(&user.id)
    .await?
    .ok_or_else(|| AppError::Forbidden("You are not registered as a seller".to_string()))
}

pub async fn approved_seller_of(storage: &dyn Storage, user: &User) -> Result<Seller> {
  let seller = seller_of(storage, user).await?;
  if !seller.approval.is_approved() {
    return Err(AppError::Forbidden(format!(
      "Your seller account is {}; only approved sellers can do this",
      seller.approval.approval_status
    )));
  }
  Ok(seller)
}

/// Admins, and sellers that passed approval.
pub async fn require_admin_or_approved_seller(storage: &dyn Storage, user: &User) -> Result<()> {
  if user.is_admin {
    return Ok(());
  }
  approved_seller_of(storage, user).await.map(|_| ())
}

pub async fn food_vendor_of(storage: &dyn Storage, user: &User) -> Result<FoodVendor> {
  storage
    .food_vendor_by_user(&user.id)
    .await?
    .ok_or_else(|| AppError::Forbidden("You are not registered as a food vendor".to_string()))
}

pub async fn approved_food_vendor_of(storage: &dyn Storage, user: &User) -> Result<FoodVendor> {
  let vendor = food_vendor_of(storage, user).await?;
  if !vendor.approval.is_approved() {
    return Err(AppError::Forbidden(format!(
      "Your food vendor account is {}; only approved vendors can do this",
      vendor.approval.approval_status
    )));
  }
  Ok(vendor)
}

pub async fn service_provider_of(storage: &dyn Storage, user: &User) -> Result<ServiceProvider> {
  storage
    .service_provider_by_user(&user.id)
    .await?
    .ok_or_else(|| AppError::Forbidden("You are not registered as a service provider".to_string()))
}

pub async fn delivery_boy_of(storage: &dyn Storage, user: &User) -> Result<DeliveryBoy> {
  storage
    .delivery_boy_by_user(&user.id)
    .await?
    .ok_or_else(|| AppError::Forbidden("You are not registered as a delivery agent".to_string()))
}
