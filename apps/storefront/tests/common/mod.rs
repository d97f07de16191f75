#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use chrono::Utc;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Level;

use shopnish_server::build_app;
use shopnish_server::config::AppConfig;
use shopnish_server::models::product::ProductListing;
use shopnish_server::models::{
  Approval, Category, Decision, DeliveryBoy, FoodItem, FoodVendor, Product, Seller, SellerProfile, ServiceProvider,
  User,
};
use shopnish_server::services::auth_service::{hash_password, new_user_id};
use shopnish_server::state::AppState;
use shopnish_server::storage::{
  ApprovalSubject, MemoryStorage, NewCategory, NewDeliveryBoy, NewFoodItem, NewFoodVendor, NewServiceProvider,
  NewUser, Storage,
};

pub const PASSWORD: &str = "correct-horse-battery";
pub const WEBHOOK_SECRET: &str = "whsec_test";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Development defaults with dev auth off, so every request needs a real
/// session. `overrides` win over those defaults.
pub fn test_config(overrides: &[(&str, &str)]) -> AppConfig {
  let mut vars: HashMap<String, String> = HashMap::new();
  vars.insert("DEV_AUTH".to_string(), "false".to_string());
  vars.insert("PAYMENT_WEBHOOK_SECRET".to_string(), WEBHOOK_SECRET.to_string());
  for (name, value) in overrides {
    vars.insert(name.to_string(), value.to_string());
  }
  AppConfig::from_lookup(move |name| vars.get(name).cloned()).expect("test configuration")
}

pub fn test_state() -> AppState {
  test_state_with(&[])
}

pub fn test_state_with(overrides: &[(&str, &str)]) -> AppState {
  setup_tracing();
  let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
  AppState::new(test_config(overrides), storage)
}

pub async fn spawn_app(
  state: &AppState,
) -> impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error> {
  test::init_service(build_app(state.clone(), Key::generate(), false)).await
}

/// Sends the request and returns the status with the JSON body, or `Null`
/// when the body is empty.
pub async fn send<S, B>(app: &S, request: TestRequest) -> (StatusCode, Value)
where
  S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
  B: MessageBody,
{
  let response = test::call_service(app, request.to_request()).await;
  let status = response.status();
  let bytes = test::read_body(response).await;
  if bytes.is_empty() {
    return (status, Value::Null);
  }
  let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
  (status, body)
}

pub async fn session_cookie<S, B>(app: &S, request: TestRequest) -> Cookie<'static>
where
  S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
  B: MessageBody,
{
  let response = test::call_service(app, request.to_request()).await;
  assert!(response.status().is_success(), "login failed with {}", response.status());
  response
    .response()
    .cookies()
    .find(|cookie| cookie.name() == "session")
    .expect("session cookie")
    .into_owned()
}

pub async fn sign_in<S, B>(app: &S, email: &str) -> Cookie<'static>
where
  S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
  B: MessageBody,
{
  let request = TestRequest::post()
    .uri("/api/auth/signin")
    .set_json(json!({ "email": email, "password": PASSWORD }));
  session_cookie(app, request).await
}

pub async fn create_user(state: &AppState, email: &str, is_admin: bool) -> User {
  state
    .storage
    .create_user(NewUser {
      id: new_user_id(),
      email: email.to_string(),
      first_name: None,
      last_name: None,
      password_hash: Some(hash_password(PASSWORD).expect("hash")),
      is_admin,
    })
    .await
    .expect("create user")
}

pub async fn approve(state: &AppState, subject: ApprovalSubject, id: i32) {
  let approval = Approval::pending()
    .decide(&Decision::Approve, "test-admin", Utc::now())
    .expect("approve");
  state
    .storage
    .record_approval(subject, id, &approval)
    .await
    .expect("record approval");
}

pub async fn create_category(state: &AppState, name: &str) -> Category {
  state
    .storage
    .create_category(NewCategory {
      name: name.to_string(),
      slug: name.to_lowercase().replace(' ', "-"),
      description: None,
      image_url: None,
    })
    .await
    .expect("create category")
}

pub async fn approved_seller(state: &AppState, user: &User) -> Seller {
  let profile = SellerProfile {
    business_name: format!("{} Traders", user.email),
    ..Default::default()
  };
  let seller = state.storage.create_seller(&user.id, profile).await.expect("create seller");
  approve(state, ApprovalSubject::Vendor, seller.id).await;
  seller
}

pub async fn approved_product(state: &AppState, seller: &Seller, category: &Category, price_cents: i64, stock: i32) -> Product {
  let listing = ProductListing {
    category_id: category.id,
    name: format!("Product {}", price_cents),
    description: None,
    price_cents,
    original_price_cents: None,
    sku: None,
    stock,
    images: Vec::new(),
  };
  let product = state
    .storage
    .create_product(seller.id, listing)
    .await
    .expect("create product");
  approve(state, ApprovalSubject::Product, product.id).await;
  product
}

pub async fn approved_delivery_boy(state: &AppState, user: &User) -> DeliveryBoy {
  let agent = state
    .storage
    .create_delivery_boy(NewDeliveryBoy {
      user_id: user.id.clone(),
      name: "Ravi".to_string(),
      phone: "9000000001".to_string(),
      vehicle_type: "bike".to_string(),
      vehicle_number: None,
    })
    .await
    .expect("create delivery agent");
  approve(state, ApprovalSubject::DeliveryBoy, agent.id).await;
  agent
}

pub async fn approved_food_vendor(state: &AppState, user: &User) -> FoodVendor {
  let vendor = state
    .storage
    .create_food_vendor(NewFoodVendor {
      user_id: user.id.clone(),
      restaurant_name: "Spice Route".to_string(),
      cuisine: Some("North Indian".to_string()),
      address: "12 MG Road".to_string(),
      phone: "9000000002".to_string(),
    })
    .await
    .expect("create food vendor");
  approve(state, ApprovalSubject::FoodVendor, vendor.id).await;
  vendor
}

pub async fn approved_food_item(state: &AppState, vendor: &FoodVendor, name: &str, price_cents: i64) -> FoodItem {
  let item = state
    .storage
    .create_food_item(NewFoodItem {
      vendor_id: vendor.id,
      name: name.to_string(),
      description: None,
      price_cents,
      is_veg: true,
    })
    .await
    .expect("create food item");
  approve(state, ApprovalSubject::FoodItem, item.id).await;
  item
}

pub async fn approved_service_provider(state: &AppState, user: &User, service_type: &str) -> ServiceProvider {
  let provider = state
    .storage
    .create_service_provider(NewServiceProvider {
      user_id: user.id.clone(),
      business_name: "FixIt".to_string(),
      service_type: service_type.to_string(),
      description: None,
      phone: "9000000003".to_string(),
      hourly_rate_cents: 50_000,
    })
    .await
    .expect("create service provider");
  approve(state, ApprovalSubject::ServiceProvider, provider.id).await;
  provider
}
