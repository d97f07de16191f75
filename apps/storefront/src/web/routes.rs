// src/web/routes.rs

use actix_web::web;

use crate::errors::AppError;
use crate::storage::ApprovalSubject;
use crate::web::handlers::{
  admin_handlers as admin, auth_handlers as auth, cart_handlers as cart, catalog_handlers as catalog,
  checkout_handlers as checkout, delivery_handlers as delivery, food_handlers as food, health_handlers as health,
  seller_handlers as seller, service_handlers as service, webhook_handlers as webhook,
};

const JSON_LIMIT_BYTES: usize = 256 * 1024;

/// Malformed bodies, queries and paths answer with the usual
/// `{"message": ...}` 400 instead of actix's plain-text errors.
fn extractor_configs(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(
      web::JsonConfig::default()
        .limit(JSON_LIMIT_BYTES)
        .error_handler(|err, _req| AppError::Validation(format!("Invalid request body: {}", err)).into()),
    )
    .app_data(
      web::QueryConfig::default()
        .error_handler(|err, _req| AppError::Validation(format!("Invalid query string: {}", err)).into()),
    )
    .app_data(
      web::PathConfig::default()
        .error_handler(|err, _req| AppError::Validation(format!("Invalid path parameter: {}", err)).into()),
    );
}

fn auth_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .route("/signup", web::post().to(auth::signup_handler))
    .route("/signin", web::post().to(auth::signin_handler))
    .route("/logout", web::post().to(auth::logout_handler))
    .route("/user", web::get().to(auth::current_user_handler));
}

fn catalog_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .service(
      web::resource("/categories")
        .route(web::get().to(catalog::list_categories_handler))
        .route(web::post().to(catalog::create_category_handler)),
    )
    .service(
      web::resource("/products")
        .route(web::get().to(catalog::list_products_handler))
        .route(web::post().to(catalog::create_product_handler)),
    )
    .service(
      web::resource("/products/{product_id}")
        .route(web::get().to(catalog::get_product_handler))
        .route(web::put().to(catalog::update_product_handler))
        .route(web::delete().to(catalog::delete_product_handler)),
    )
    .route("/seller/products", web::get().to(catalog::seller_products_handler));
}

fn seller_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .route("/sellers", web::post().to(seller::register_seller_handler))
    .service(
      web::resource("/sellers/me")
        .route(web::get().to(seller::my_seller_handler))
        .route(web::put().to(seller::update_my_seller_handler)),
    )
    .route("/seller/orders", web::get().to(seller::seller_orders_handler));
}

fn cart_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .service(
      web::resource("/cart")
        .route(web::get().to(cart::get_cart_handler))
        .route(web::post().to(cart::add_to_cart_handler))
        .route(web::delete().to(cart::clear_cart_handler)),
    )
    .service(
      web::resource("/cart/{item_id}")
        .route(web::put().to(cart::update_cart_item_handler))
        .route(web::delete().to(cart::remove_cart_item_handler)),
    );
}

fn order_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .route("/checkout", web::post().to(checkout::start_checkout_handler))
    .route("/create-payment-intent", web::post().to(checkout::start_checkout_handler))
    .route("/orders", web::get().to(checkout::list_orders_handler))
    .route("/orders/{order_id}", web::get().to(checkout::get_order_handler))
    .route("/payments/webhook", web::post().to(webhook::payment_webhook_handler));
}

/// One pending list plus approve and reject routes per approvable record.
fn admin_routes(cfg: &mut web::ServiceConfig) {
  for subject in ApprovalSubject::ALL {
    let slug = subject.slug();
    cfg
      .service(
        web::resource(format!("/pending-{}s", slug))
          .app_data(web::Data::new(subject))
          .route(web::get().to(admin::pending_handler)),
      )
      .service(
        web::resource(format!("/approve-{}/{{id}}", slug))
          .app_data(web::Data::new(subject))
          .route(web::post().to(admin::approve_handler)),
      )
      .service(
        web::resource(format!("/reject-{}/{{id}}", slug))
          .app_data(web::Data::new(subject))
          .route(web::post().to(admin::reject_handler)),
      );
  }
  cfg
    .route("/orders", web::get().to(admin::list_orders_handler))
    .route("/orders/{order_id}/assign-delivery", web::post().to(admin::assign_delivery_handler));
}

fn delivery_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .route("/register", web::post().to(delivery::register_handler))
    .route("/me", web::get().to(delivery::me_handler))
    .route("/availability", web::put().to(delivery::availability_handler))
    .route("/assignments", web::get().to(delivery::assignments_handler))
    .route("/assignments/{assignment_id}/status", web::post().to(delivery::update_status_handler));
}

fn food_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .service(
      web::resource("/vendors")
        .route(web::get().to(food::list_vendors_handler))
        .route(web::post().to(food::register_vendor_handler)),
    )
    .route("/vendors/me", web::get().to(food::my_vendor_handler))
    .service(
      web::resource("/items")
        .route(web::get().to(food::list_items_handler))
        .route(web::post().to(food::create_item_handler)),
    )
    .service(
      web::resource("/orders")
        .route(web::get().to(food::my_orders_handler))
        .route(web::post().to(food::create_order_handler)),
    )
    .route("/orders/{order_id}/status", web::post().to(food::update_order_status_handler))
    .route("/vendor/orders", web::get().to(food::vendor_orders_handler));
}

fn service_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .service(
      web::resource("/providers")
        .route(web::get().to(service::list_providers_handler))
        .route(web::post().to(service::register_provider_handler)),
    )
    .route("/providers/me", web::get().to(service::my_provider_handler))
    .service(
      web::resource("/bookings")
        .route(web::get().to(service::my_bookings_handler))
        .route(web::post().to(service::create_booking_handler)),
    )
    .route(
      "/bookings/{booking_id}/status",
      web::post().to(service::update_booking_status_handler),
    )
    .route("/provider/bookings", web::get().to(service::provider_bookings_handler));
}

// This function is called while building the Actix App.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  extractor_configs(cfg);
  cfg
    .route("/", web::get().to(health::root_handler))
    .route("/healthz", web::get().to(health::healthz_handler))
    .service(
      web::scope("/api")
        .route("/health", web::get().to(health::api_health_handler))
        .service(web::scope("/auth").configure(auth_routes))
        .service(web::scope("/admin").configure(admin_routes))
        .service(web::scope("/delivery").configure(delivery_routes))
        .service(web::scope("/food").configure(food_routes))
        .service(web::scope("/services").configure(service_routes))
        .configure(catalog_routes)
        .configure(seller_routes)
        .configure(cart_routes)
        .configure(order_routes),
    );
}
