// src/storage/mod.rs

//! Persistence seams. Handlers and flows talk to `dyn Storage`; the backend is
//! PostgreSQL when `DATABASE_URL` is set and an in-process store otherwise.

pub mod memory;
pub mod postgres;
pub mod seed;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::{
  Approval, ApprovalStatus, BookingStatus, CartItem, CartLine, Category, DeliveryAssignment, DeliveryBoy,
  DeliveryStatus, FoodItem, FoodOrder, FoodOrderLine, FoodOrderStatus, FoodVendor, Order, OrderStatus,
  OrderWithItems, PaymentMethod, PaymentStatus, Product, Seller, SellerProfile, ServiceBooking, ServiceProvider,
  User,
};
use crate::models::product::ProductListing;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

#[derive(Debug, Clone)]
pub struct NewUser {
  pub id: String,
  pub email: String,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub password_hash: Option<String>,
  pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
  pub name: String,
  pub slug: String,
  pub description: Option<String>,
  pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
  pub category_id: Option<i32>,
  pub seller_id: Option<i32>,
  /// Case-insensitive substring of the product name.
  pub search: Option<String>,
  pub approval: Option<ApprovalStatus>,
  pub active_only: bool,
}

impl ProductFilter {
  /// What shoppers see: approved, active products.
  pub fn listed() -> Self {
    Self {
      approval: Some(ApprovalStatus::Approved),
      active_only: true,
      ..Default::default()
    }
  }

  pub fn matches(&self, product: &Product) -> bool {
    if self.active_only && !product.is_active {
      return false;
    }
    if let Some(status) = self.approval {
      if product.approval.approval_status != status {
        return false;
      }
    }
    if self.category_id.is_some_and(|id| id != product.listing.category_id) {
      return false;
    }
    if self.seller_id.is_some_and(|id| id != product.seller_id) {
      return false;
    }
    match &self.search {
      Some(term) => product.listing.name.to_lowercase().contains(&term.to_lowercase()),
      None => true,
    }
  }
}

#[derive(Debug, Clone)]
pub struct NewOrderLine {
  pub product_id: i32,
  pub seller_id: i32,
  pub product_name: String,
  pub quantity: i32,
  pub unit_price_cents: i64,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
  pub user_id: String,
  pub order_number: String,
  pub status: OrderStatus,
  pub subtotal_cents: i64,
  pub tax_cents: i64,
  pub shipping_cents: i64,
  pub total_cents: i64,
  pub payment_method: PaymentMethod,
  pub shipping_address: serde_json::Value,
  pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
  Succeeded,
  Failed,
}

#[derive(Debug, Clone)]
pub struct NewDeliveryBoy {
  pub user_id: String,
  pub name: String,
  pub phone: String,
  pub vehicle_type: String,
  pub vehicle_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
  pub order_id: i32,
  pub delivery_boy_id: i32,
  pub delivery_fee_cents: i64,
  pub notes: Option<String>,
  pub assigned_by: String,
}

#[derive(Debug, Clone)]
pub struct NewFoodVendor {
  pub user_id: String,
  pub restaurant_name: String,
  pub cuisine: Option<String>,
  pub address: String,
  pub phone: String,
}

#[derive(Debug, Clone)]
pub struct NewFoodItem {
  pub vendor_id: i32,
  pub name: String,
  pub description: Option<String>,
  pub price_cents: i64,
  pub is_veg: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FoodItemFilter {
  pub vendor_id: Option<i32>,
  pub approval: Option<ApprovalStatus>,
  pub available_only: bool,
}

impl FoodItemFilter {
  pub fn matches(&self, item: &FoodItem) -> bool {
    self.vendor_id.map_or(true, |id| id == item.vendor_id)
      && self.approval.map_or(true, |status| status == item.approval.approval_status)
      && (!self.available_only || item.is_available)
  }
}

#[derive(Debug, Clone)]
pub struct NewFoodOrder {
  pub user_id: String,
  pub vendor_id: i32,
  pub lines: Vec<FoodOrderLine>,
  pub subtotal_cents: i64,
  pub delivery_fee_cents: i64,
  pub total_cents: i64,
  pub delivery_address: String,
}

#[derive(Debug, Clone)]
pub struct NewServiceProvider {
  pub user_id: String,
  pub business_name: String,
  pub service_type: String,
  pub description: Option<String>,
  pub phone: String,
  pub hourly_rate_cents: i64,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
  pub user_id: String,
  pub provider_id: i32,
  pub scheduled_at: DateTime<Utc>,
  pub address: String,
  pub notes: Option<String>,
}

/// Everything that goes through the admin approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalSubject {
  Vendor,
  Product,
  FoodVendor,
  FoodItem,
  ServiceProvider,
  DeliveryBoy,
}

impl ApprovalSubject {
  pub const ALL: [ApprovalSubject; 6] = [
    ApprovalSubject::Vendor,
    ApprovalSubject::Product,
    ApprovalSubject::FoodVendor,
    ApprovalSubject::FoodItem,
    ApprovalSubject::ServiceProvider,
    ApprovalSubject::DeliveryBoy,
  ];

  /// The path segment used in `/api/admin/approve-<slug>/{id}`.
  pub fn slug(self) -> &'static str {
    match self {
      ApprovalSubject::Vendor => "vendor",
      ApprovalSubject::Product => "product",
      ApprovalSubject::FoodVendor => "food-vendor",
      ApprovalSubject::FoodItem => "food-item",
      ApprovalSubject::ServiceProvider => "service-provider",
      ApprovalSubject::DeliveryBoy => "delivery-boy",
    }
  }

  pub fn from_slug(slug: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|subject| subject.slug() == slug)
  }

  pub fn label(self) -> &'static str {
    match self {
      ApprovalSubject::Vendor => "Vendor",
      ApprovalSubject::Product => "Product",
      ApprovalSubject::FoodVendor => "Food vendor",
      ApprovalSubject::FoodItem => "Food item",
      ApprovalSubject::ServiceProvider => "Service provider",
      ApprovalSubject::DeliveryBoy => "Delivery agent",
    }
  }
}

/// The parts of an approvable record the workflow needs.
#[derive(Debug, Clone)]
pub struct ApprovalTarget {
  pub subject: ApprovalSubject,
  pub id: i32,
  pub display_name: String,
  pub owner_user_id: String,
  pub approval: Approval,
}

/// Raised when a cart line would hold more than the product has in stock.
pub(crate) fn insufficient_stock(available: i32) -> AppError {
  AppError::Validation(format!("Insufficient stock. Only {} available.", available))
}

/// A status write found the row no longer in the state it was read in.
pub(crate) fn stale_status(what: &str, id: i32, current: impl std::fmt::Display) -> AppError {
  AppError::Conflict(format!("{} {} is already {}", what, id, current))
}

#[async_trait]
pub trait UserStore: Send + Sync {
  async fn find_user(&self, id: &str) -> Result<Option<User>>;
  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
  /// Fails with a conflict when the email is taken.
  async fn create_user(&self, new_user: NewUser) -> Result<User>;
  /// Inserts or refreshes a user by id; used for seeded accounts.
  async fn upsert_user(&self, new_user: NewUser) -> Result<User>;
}

#[async_trait]
pub trait SellerStore: Send + Sync {
  async fn create_seller(&self, user_id: &str, profile: SellerProfile) -> Result<Seller>;
  async fn seller_by_id(&self, id: i32) -> Result<Option<Seller>>;
  async fn seller_by_user(&self, user_id: &str) -> Result<Option<Seller>>;
  async fn update_seller_profile(&self, id: i32, profile: SellerProfile) -> Result<Seller>;
  async fn list_sellers(&self, approval: Option<ApprovalStatus>) -> Result<Vec<Seller>>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
  async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>>;
  async fn category_by_id(&self, id: i32) -> Result<Option<Category>>;
  async fn create_category(&self, category: NewCategory) -> Result<Category>;
  async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;
  async fn product_by_id(&self, id: i32) -> Result<Option<Product>>;
  async fn products_by_ids(&self, ids: &[i32]) -> Result<Vec<Product>>;
  /// New products always start out pending.
  async fn create_product(&self, seller_id: i32, listing: ProductListing) -> Result<Product>;
  async fn update_product(&self, id: i32, listing: ProductListing) -> Result<Product>;
  /// Withdraws the product and drops it from every cart.
  async fn deactivate_product(&self, id: i32) -> Result<()>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
  async fn cart_lines(&self, user_id: &str) -> Result<Vec<CartLine>>;
  async fn cart_item(&self, id: i32) -> Result<Option<CartItem>>;
  async fn cart_item_for(&self, user_id: &str, product_id: i32) -> Result<Option<CartItem>>;
  /// Adds `quantity` to the existing row for the pair or creates it. The
  /// resulting quantity may not exceed the product's stock.
  async fn add_to_cart(&self, user_id: &str, product_id: i32, quantity: i32) -> Result<CartItem>;
  async fn set_cart_quantity(&self, id: i32, quantity: i32) -> Result<CartItem>;
  async fn remove_cart_item(&self, id: i32) -> Result<bool>;
  async fn clear_cart(&self, user_id: &str) -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Writes the order and its lines and decrements stock, all or nothing. A
  /// line whose stock ran out fails the whole order with a validation error.
  async fn place_order(&self, order: NewOrder) -> Result<OrderWithItems>;
  async fn set_payment_reference(&self, order_id: i32, reference: &str) -> Result<()>;
  async fn order_by_id(&self, id: i32) -> Result<Option<OrderWithItems>>;
  async fn order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>>;
  async fn orders_for_user(&self, user_id: &str) -> Result<Vec<OrderWithItems>>;
  /// Orders holding at least one of the seller's lines, with only those lines.
  async fn orders_for_seller(&self, seller_id: i32) -> Result<Vec<OrderWithItems>>;
  async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>>;
  /// Applies a payment outcome to an order still awaiting payment. A failure
  /// cancels the order and puts its stock back.
  async fn settle_payment(&self, order_id: i32, outcome: PaymentOutcome) -> Result<Order>;
  async fn update_order_status(
    &self,
    order_id: i32,
    status: OrderStatus,
    payment_status: Option<PaymentStatus>,
  ) -> Result<Order>;
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
  async fn create_delivery_boy(&self, agent: NewDeliveryBoy) -> Result<DeliveryBoy>;
  async fn delivery_boy_by_id(&self, id: i32) -> Result<Option<DeliveryBoy>>;
  async fn delivery_boy_by_user(&self, user_id: &str) -> Result<Option<DeliveryBoy>>;
  async fn list_delivery_boys(&self, approval: Option<ApprovalStatus>) -> Result<Vec<DeliveryBoy>>;
  async fn set_delivery_availability(&self, id: i32, is_available: bool) -> Result<DeliveryBoy>;
  async fn active_assignment_for_order(&self, order_id: i32) -> Result<Option<DeliveryAssignment>>;
  /// Creates the assignment and marks the agent unavailable. The agent must be
  /// approved and available, and the order must have no active assignment.
  async fn create_assignment(&self, assignment: NewAssignment) -> Result<DeliveryAssignment>;
  async fn assignment_by_id(&self, id: i32) -> Result<Option<DeliveryAssignment>>;
  async fn assignments_for_delivery_boy(&self, delivery_boy_id: i32) -> Result<Vec<DeliveryAssignment>>;
  /// Moves the assignment from `from` to `to`. An assignment no longer in
  /// `from` is a conflict.
  async fn advance_assignment(
    &self,
    id: i32,
    from: DeliveryStatus,
    to: DeliveryStatus,
    at: DateTime<Utc>,
  ) -> Result<DeliveryAssignment>;
  /// Closes an assignment that is on the way, all or nothing: the assignment
  /// and its order become delivered, a cash-on-delivery payment becomes paid,
  /// and the agent is freed with the delivery counted.
  async fn finish_delivery(&self, id: i32, at: DateTime<Utc>) -> Result<DeliveryAssignment>;
}

#[async_trait]
pub trait FoodStore: Send + Sync {
  async fn create_food_vendor(&self, vendor: NewFoodVendor) -> Result<FoodVendor>;
  async fn food_vendor_by_id(&self, id: i32) -> Result<Option<FoodVendor>>;
  async fn food_vendor_by_user(&self, user_id: &str) -> Result<Option<FoodVendor>>;
  async fn list_food_vendors(&self, approval: Option<ApprovalStatus>) -> Result<Vec<FoodVendor>>;
  async fn create_food_item(&self, item: NewFoodItem) -> Result<FoodItem>;
  async fn food_item_by_id(&self, id: i32) -> Result<Option<FoodItem>>;
  async fn list_food_items(&self, filter: &FoodItemFilter) -> Result<Vec<FoodItem>>;
  async fn create_food_order(&self, order: NewFoodOrder) -> Result<FoodOrder>;
  async fn food_order_by_id(&self, id: i32) -> Result<Option<FoodOrder>>;
  async fn food_orders_for_user(&self, user_id: &str) -> Result<Vec<FoodOrder>>;
  async fn food_orders_for_vendor(&self, vendor_id: i32) -> Result<Vec<FoodOrder>>;
  /// Compare-and-set; an order no longer in `from` is a conflict.
  async fn set_food_order_status(&self, id: i32, from: FoodOrderStatus, to: FoodOrderStatus) -> Result<FoodOrder>;
}

#[async_trait]
pub trait ServiceStore: Send + Sync {
  async fn create_service_provider(&self, provider: NewServiceProvider) -> Result<ServiceProvider>;
  async fn service_provider_by_id(&self, id: i32) -> Result<Option<ServiceProvider>>;
  async fn service_provider_by_user(&self, user_id: &str) -> Result<Option<ServiceProvider>>;
  async fn list_service_providers(
    &self,
    approval: Option<ApprovalStatus>,
    service_type: Option<&str>,
  ) -> Result<Vec<ServiceProvider>>;
  async fn create_booking(&self, booking: NewBooking) -> Result<ServiceBooking>;
  async fn booking_by_id(&self, id: i32) -> Result<Option<ServiceBooking>>;
  async fn bookings_for_user(&self, user_id: &str) -> Result<Vec<ServiceBooking>>;
  async fn bookings_for_provider(&self, provider_id: i32) -> Result<Vec<ServiceBooking>>;
  async fn set_booking_status(&self, id: i32, from: BookingStatus, to: BookingStatus) -> Result<ServiceBooking>;
}

#[async_trait]
pub trait ApprovalStore: Send + Sync {
  async fn approval_target(&self, subject: ApprovalSubject, id: i32) -> Result<Option<ApprovalTarget>>;
  async fn record_approval(&self, subject: ApprovalSubject, id: i32, approval: &Approval) -> Result<()>;
}

/// The whole persistence surface the application runs against.
#[async_trait]
pub trait Storage:
  UserStore + SellerStore + CatalogStore + CartStore + OrderStore + DeliveryStore + FoodStore + ServiceStore + ApprovalStore
{
  fn backend_name(&self) -> &'static str;

  /// Cheap round trip used by the health endpoint.
  async fn ping(&self) -> Result<()>;
}

/// Picks the backend from the configuration. Migrations run here when
/// enabled.
pub async fn connect(config: &AppConfig) -> Result<Arc<dyn Storage>> {
  match &config.database_url {
    Some(url) => {
      let storage = PgStorage::connect(url).await?;
      if config.run_migrations {
        storage.migrate().await?;
      }
      tracing::info!("Using PostgreSQL storage.");
      Ok(Arc::new(storage))
    }
    None => {
      tracing::warn!("DATABASE_URL not set; using in-memory storage. Data is lost on restart.");
      Ok(Arc::new(MemoryStorage::new()))
    }
  }
}
