mod common;

use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use serde_json::{json, Value};

use common::*;
use shopnish_server::config::PricingConfig;
use shopnish_server::services::pricing;

fn address() -> Value {
  json!({ "line1": "221B Baker Street", "city": "Pune", "pincode": "411001" })
}

#[actix_web::test]
async fn test_cart_merges_lines_and_respects_stock() {
  let state = test_state();
  let app = spawn_app(&state).await;
  let category = create_category(&state, "Groceries").await;
  let seller_user = create_user(&state, "grocer@example.com", false).await;
  let seller = approved_seller(&state, &seller_user).await;
  let product = approved_product(&state, &seller, &category, 1_000, 5).await;
  create_user(&state, "buyer@example.com", false).await;
  let cookie = sign_in(&app, "buyer@example.com").await;

  for _ in 0..2 {
    let (status, _) = send(
      &app,
      TestRequest::post()
        .uri("/api/cart")
        .cookie(cookie.clone())
        .set_json(json!({ "productId": product.id, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  let (status, cart) = send(&app, TestRequest::get().uri("/api/cart").cookie(cookie.clone())).await;
  assert_eq!(status, StatusCode::OK);
  let lines = cart.as_array().unwrap();
  assert_eq!(lines.len(), 1);
  assert_eq!(lines[0]["quantity"], 4);
  assert_eq!(lines[0]["product"]["id"], product.id);

  let (status, body) = send(
    &app,
    TestRequest::post()
      .uri("/api/cart")
      .cookie(cookie.clone())
      .set_json(json!({ "productId": product.id, "quantity": 2 })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["message"], "Insufficient stock. Only 5 available.");

  let (status, _) = send(
    &app,
    TestRequest::post()
      .uri("/api/cart")
      .cookie(cookie.clone())
      .set_json(json!({ "productId": product.id, "quantity": 0 })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let item_id = lines[0]["id"].as_i64().unwrap();
  let (status, updated) = send(
    &app,
    TestRequest::put()
      .uri(&format!("/api/cart/{}", item_id))
      .cookie(cookie.clone())
      .set_json(json!({ "quantity": 1 })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["quantity"], 1);

  let (status, _) = send(
    &app,
    TestRequest::put()
      .uri(&format!("/api/cart/{}", item_id))
      .cookie(cookie.clone())
      .set_json(json!({ "quantity": 0 })),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (_, cart) = send(&app, TestRequest::get().uri("/api/cart").cookie(cookie)).await;
  assert!(cart.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn test_cart_items_belong_to_their_owner() {
  let state = test_state();
  let app = spawn_app(&state).await;
  let category = create_category(&state, "Books").await;
  let seller_user = create_user(&state, "books@example.com", false).await;
  let seller = approved_seller(&state, &seller_user).await;
  let product = approved_product(&state, &seller, &category, 800, 10).await;
  create_user(&state, "first@example.com", false).await;
  create_user(&state, "second@example.com", false).await;

  let first = sign_in(&app, "first@example.com").await;
  let (_, item) = send(
    &app,
    TestRequest::post()
      .uri("/api/cart")
      .cookie(first)
      .set_json(json!({ "productId": product.id, "quantity": 1 })),
  )
  .await;

  let second = sign_in(&app, "second@example.com").await;
  let (status, _) = send(
    &app,
    TestRequest::delete()
      .uri(&format!("/api/cart/{}", item["id"]))
      .cookie(second),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_delisted_products_cannot_be_raised_in_the_cart() {
  let state = test_state();
  let app = spawn_app(&state).await;
  let category = create_category(&state, "Toys").await;
  let seller_user = create_user(&state, "toys@example.com", false).await;
  let seller = approved_seller(&state, &seller_user).await;
  let product = approved_product(&state, &seller, &category, 700, 10).await;
  create_user(&state, "admin@example.com", true).await;
  create_user(&state, "buyer@example.com", false).await;
  let cookie = sign_in(&app, "buyer@example.com").await;

  let (_, item) = send(
    &app,
    TestRequest::post()
      .uri("/api/cart")
      .cookie(cookie.clone())
      .set_json(json!({ "productId": product.id, "quantity": 1 })),
  )
  .await;
  let item_uri = format!("/api/cart/{}", item["id"]);

  let admin = sign_in(&app, "admin@example.com").await;
  let (status, _) = send(
    &app,
    TestRequest::post()
      .uri(&format!("/api/admin/reject-product/{}", product.id))
      .cookie(admin)
      .set_json(json!({ "reason": "Counterfeit listing" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (status, _) = send(
    &app,
    TestRequest::put()
      .uri(&item_uri)
      .cookie(cookie.clone())
      .set_json(json!({ "quantity": 3 })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let held = state.storage.cart_item(item["id"].as_i64().unwrap() as i32).await.unwrap().unwrap();
  assert_eq!(held.quantity, 1);

  // Taking it out of the cart still works.
  let (status, _) = send(
    &app,
    TestRequest::put()
      .uri(&item_uri)
      .cookie(cookie)
      .set_json(json!({ "quantity": 0 })),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn test_card_checkout_waits_for_the_webhook() {
  let state = test_state();
  let app = spawn_app(&state).await;
  let category = create_category(&state, "Electronics").await;
  let seller_user = create_user(&state, "gadgets@example.com", false).await;
  let seller = approved_seller(&state, &seller_user).await;
  let product = approved_product(&state, &seller, &category, 10_000, 5).await;
  create_user(&state, "buyer@example.com", false).await;
  let cookie = sign_in(&app, "buyer@example.com").await;

  send(
    &app,
    TestRequest::post()
      .uri("/api/cart")
      .cookie(cookie.clone())
      .set_json(json!({ "productId": product.id, "quantity": 2 })),
  )
  .await;

  let (status, placed) = send(
    &app,
    TestRequest::post()
      .uri("/api/checkout")
      .cookie(cookie.clone())
      .set_json(json!({ "shippingAddress": address() })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let expected = pricing::quote(&PricingConfig::default(), 20_000);
  assert_eq!(placed["total"], expected.total_cents);
  assert_eq!(placed["status"], "pending");
  assert_eq!(placed["paymentMethod"], "card");
  assert!(placed["orderNumber"].as_str().unwrap().starts_with("ORD-"));
  assert!(placed["clientSecret"].is_string());
  let reference = placed["paymentReference"].as_str().unwrap().to_string();
  let order_id = placed["orderId"].as_i64().unwrap();

  // Stock is held and the cart emptied as soon as the order exists.
  let held = state.storage.product_by_id(product.id).await.unwrap().unwrap();
  assert_eq!(held.listing.stock, 3);
  let (_, cart) = send(&app, TestRequest::get().uri("/api/cart").cookie(cookie.clone())).await;
  assert!(cart.as_array().unwrap().is_empty());

  let (status, _) = send(
    &app,
    TestRequest::post()
      .uri("/api/payments/webhook")
      .set_json(json!({ "paymentReference": reference, "outcome": "succeeded" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, ack) = send(
    &app,
    TestRequest::post()
      .uri("/api/payments/webhook")
      .insert_header(("X-Webhook-Signature", WEBHOOK_SECRET))
      .set_json(json!({ "paymentReference": reference, "outcome": "succeeded" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(ack["status"], "confirmed");
  assert_eq!(ack["paymentStatus"], "paid");
  assert!(ack.get("ignored").is_none());

  let (status, replay) = send(
    &app,
    TestRequest::post()
      .uri("/api/payments/webhook")
      .insert_header(("X-Webhook-Signature", WEBHOOK_SECRET))
      .set_json(json!({ "paymentReference": reference, "outcome": "failed" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(replay["ignored"], true);
  assert_eq!(replay["status"], "confirmed");

  let (status, order) = send(
    &app,
    TestRequest::get()
      .uri(&format!("/api/orders/{}", order_id))
      .cookie(cookie),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(order["paymentStatus"], "paid");
  assert_eq!(order["items"].as_array().unwrap().len(), 1);
  assert_eq!(order["items"][0]["quantity"], 2);
}

#[actix_web::test]
async fn test_failed_payment_cancels_and_restocks() {
  let state = test_state();
  let app = spawn_app(&state).await;
  let category = create_category(&state, "Fashion").await;
  let seller_user = create_user(&state, "threads@example.com", false).await;
  let seller = approved_seller(&state, &seller_user).await;
  let product = approved_product(&state, &seller, &category, 1_500, 4).await;
  create_user(&state, "buyer@example.com", false).await;
  let cookie = sign_in(&app, "buyer@example.com").await;

  send(
    &app,
    TestRequest::post()
      .uri("/api/cart")
      .cookie(cookie.clone())
      .set_json(json!({ "productId": product.id, "quantity": 3 })),
  )
  .await;
  let (_, placed) = send(
    &app,
    TestRequest::post()
      .uri("/api/create-payment-intent")
      .cookie(cookie)
      .set_json(json!({ "shippingAddress": address(), "paymentMethod": "card" })),
  )
  .await;
  let reference = placed["paymentReference"].as_str().unwrap().to_string();

  let (status, ack) = send(
    &app,
    TestRequest::post()
      .uri("/api/payments/webhook")
      .insert_header(("X-Webhook-Signature", WEBHOOK_SECRET))
      .set_json(json!({ "paymentReference": reference, "outcome": "failed" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(ack["status"], "cancelled");
  assert_eq!(ack["paymentStatus"], "failed");

  let restocked = state.storage.product_by_id(product.id).await.unwrap().unwrap();
  assert_eq!(restocked.listing.stock, 4);

  let (status, _) = send(
    &app,
    TestRequest::post()
      .uri("/api/payments/webhook")
      .insert_header(("X-Webhook-Signature", WEBHOOK_SECRET))
      .set_json(json!({ "paymentReference": "mock_pi_unknown", "outcome": "succeeded" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_checkout_refuses_lines_beyond_current_stock() {
  let state = test_state();
  let app = spawn_app(&state).await;
  let category = create_category(&state, "Garden").await;
  let seller_user = create_user(&state, "plants@example.com", false).await;
  let seller = approved_seller(&state, &seller_user).await;
  let product = approved_product(&state, &seller, &category, 3_000, 5).await;
  create_user(&state, "buyer@example.com", false).await;
  let cookie = sign_in(&app, "buyer@example.com").await;

  send(
    &app,
    TestRequest::post()
      .uri("/api/cart")
      .cookie(cookie.clone())
      .set_json(json!({ "productId": product.id, "quantity": 4 })),
  )
  .await;

  // The seller sells some stock elsewhere after the line went into the cart.
  let (status, _) = send(
    &app,
    TestRequest::put()
      .uri(&format!("/api/products/{}", product.id))
      .cookie(sign_in(&app, "plants@example.com").await)
      .set_json(json!({ "stock": 2 })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (status, body) = send(
    &app,
    TestRequest::post()
      .uri("/api/checkout")
      .cookie(cookie.clone())
      .set_json(json!({ "shippingAddress": address(), "paymentMethod": "cod" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(
    body["message"],
    format!("Insufficient stock for {}. Only 2 available.", product.listing.name)
  );

  let (_, orders) = send(&app, TestRequest::get().uri("/api/orders").cookie(cookie.clone())).await;
  assert!(orders.as_array().unwrap().is_empty());
  let unchanged = state.storage.product_by_id(product.id).await.unwrap().unwrap();
  assert_eq!(unchanged.listing.stock, 2);
  let (_, cart) = send(&app, TestRequest::get().uri("/api/cart").cookie(cookie)).await;
  assert_eq!(cart.as_array().unwrap().len(), 1);
  assert_eq!(cart[0]["quantity"], 4);
}

#[actix_web::test]
async fn test_refused_payment_intent_releases_the_order() {
  let state = test_state_with(&[("PAYMENT_MAX_AMOUNT_CENTS", "10000")]);
  let app = spawn_app(&state).await;
  let category = create_category(&state, "Audio").await;
  let seller_user = create_user(&state, "sound@example.com", false).await;
  let seller = approved_seller(&state, &seller_user).await;
  let product = approved_product(&state, &seller, &category, 20_000, 3).await;
  create_user(&state, "buyer@example.com", false).await;
  let cookie = sign_in(&app, "buyer@example.com").await;

  send(
    &app,
    TestRequest::post()
      .uri("/api/cart")
      .cookie(cookie.clone())
      .set_json(json!({ "productId": product.id, "quantity": 1 })),
  )
  .await;

  let (status, _) = send(
    &app,
    TestRequest::post()
      .uri("/api/checkout")
      .cookie(cookie.clone())
      .set_json(json!({ "shippingAddress": address(), "paymentMethod": "card" })),
  )
  .await;
  assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

  let (_, orders) = send(&app, TestRequest::get().uri("/api/orders").cookie(cookie.clone())).await;
  let orders = orders.as_array().unwrap().clone();
  assert_eq!(orders.len(), 1);
  assert_eq!(orders[0]["status"], "cancelled");
  assert_eq!(orders[0]["paymentStatus"], "failed");
  assert!(orders[0]["paymentReference"].is_null());
  let restocked = state.storage.product_by_id(product.id).await.unwrap().unwrap();
  assert_eq!(restocked.listing.stock, 3);

  // The cart is kept, so the buyer can retry with another method.
  let (_, cart) = send(&app, TestRequest::get().uri("/api/cart").cookie(cookie.clone())).await;
  assert_eq!(cart.as_array().unwrap().len(), 1);
  let (status, placed) = send(
    &app,
    TestRequest::post()
      .uri("/api/checkout")
      .cookie(cookie)
      .set_json(json!({ "shippingAddress": address(), "paymentMethod": "cod" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(placed["status"], "confirmed");
  let held = state.storage.product_by_id(product.id).await.unwrap().unwrap();
  assert_eq!(held.listing.stock, 2);
}

#[actix_web::test]
async fn test_cash_on_delivery_is_confirmed_immediately() {
  let state = test_state();
  let app = spawn_app(&state).await;
  let category = create_category(&state, "Home").await;
  let seller_user = create_user(&state, "decor@example.com", false).await;
  let seller = approved_seller(&state, &seller_user).await;
  let product = approved_product(&state, &seller, &category, 120_000, 2).await;
  create_user(&state, "buyer@example.com", false).await;
  create_user(&state, "nosy@example.com", false).await;
  let cookie = sign_in(&app, "buyer@example.com").await;

  send(
    &app,
    TestRequest::post()
      .uri("/api/cart")
      .cookie(cookie.clone())
      .set_json(json!({ "productId": product.id, "quantity": 1 })),
  )
  .await;
  let (status, placed) = send(
    &app,
    TestRequest::post()
      .uri("/api/checkout")
      .cookie(cookie.clone())
      .set_json(json!({ "shippingAddress": address(), "paymentMethod": "cod" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(placed["status"], "confirmed");
  assert!(placed["clientSecret"].is_null());
  assert!(placed["paymentReference"].is_null());
  // Above the free-shipping threshold.
  let expected = pricing::quote(&PricingConfig::default(), 120_000);
  assert_eq!(expected.shipping_cents, 0);
  assert_eq!(placed["total"], expected.total_cents);

  let (_, orders) = send(&app, TestRequest::get().uri("/api/orders").cookie(cookie)).await;
  assert_eq!(orders.as_array().unwrap().len(), 1);

  let nosy = sign_in(&app, "nosy@example.com").await;
  let (status, _) = send(
    &app,
    TestRequest::get()
      .uri(&format!("/api/orders/{}", placed["orderId"]))
      .cookie(nosy),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (_, seller_orders) = send(
    &app,
    TestRequest::get()
      .uri("/api/seller/orders")
      .cookie(sign_in(&app, "decor@example.com").await),
  )
  .await;
  assert_eq!(seller_orders.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_checkout_rejects_empty_cart_and_missing_address() {
  let state = test_state();
  let app = spawn_app(&state).await;
  create_user(&state, "buyer@example.com", false).await;
  let cookie = sign_in(&app, "buyer@example.com").await;

  let (status, body) = send(
    &app,
    TestRequest::post()
      .uri("/api/checkout")
      .cookie(cookie.clone())
      .set_json(json!({ "shippingAddress": address() })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["message"], "Your cart is empty.");

  let (status, _) = send(
    &app,
    TestRequest::post().uri("/api/checkout").cookie(cookie).set_json(json!({})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}
