mod common;

use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use serde_json::json;

use common::*;
use shopnish_server::state::AppState;

#[actix_web::test]
async fn test_approval_routes_are_admin_only() {
  let state = test_state();
  let app = spawn_app(&state).await;
  create_user(&state, "shopper@example.com", false).await;
  let cookie = sign_in(&app, "shopper@example.com").await;

  for uri in ["/api/admin/pending-vendors", "/api/admin/pending-delivery-boys", "/api/admin/orders"] {
    let (status, _) = send(&app, TestRequest::get().uri(uri).cookie(cookie.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
  }
  let (status, _) = send(
    &app,
    TestRequest::post().uri("/api/admin/approve-product/1").cookie(cookie),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(&app, TestRequest::get().uri("/api/admin/pending-vendors")).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_admin_approves_and_rejects_a_seller() {
  let state = test_state();
  let app = spawn_app(&state).await;
  let applicant = create_user(&state, "applicant@example.com", false).await;
  create_user(&state, "admin@example.com", true).await;
  let seller = state
    .storage
    .create_seller(
      &applicant.id,
      shopnish_server::models::SellerProfile {
        business_name: "Applicant Stores".to_string(),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  let admin = sign_in(&app, "admin@example.com").await;

  let (status, pending) = send(
    &app,
    TestRequest::get().uri("/api/admin/pending-vendors").cookie(admin.clone()),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(pending.as_array().unwrap().len(), 1);
  assert_eq!(pending[0]["businessName"], "Applicant Stores");

  let reject_uri = format!("/api/admin/reject-vendor/{}", seller.id);
  let (status, body) = send(&app, TestRequest::post().uri(&reject_uri).cookie(admin.clone())).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["message"], "A rejection reason is required.");

  let (status, rejected) = send(
    &app,
    TestRequest::post()
      .uri(&reject_uri)
      .cookie(admin.clone())
      .set_json(json!({ "reason": "GST number missing" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(rejected["approvalStatus"], "rejected");
  assert_eq!(rejected["rejectionReason"], "GST number missing");
  assert_eq!(rejected["subject"], "vendor");
  assert_eq!(rejected["name"], "Applicant Stores");

  let approve_uri = format!("/api/admin/approve-vendor/{}", seller.id);
  let (status, approved) = send(&app, TestRequest::post().uri(&approve_uri).cookie(admin.clone())).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(approved["approvalStatus"], "approved");
  assert!(approved["rejectionReason"].is_null());
  assert!(approved["approvedAt"].is_string());

  let (status, _) = send(&app, TestRequest::post().uri(&approve_uri).cookie(admin.clone())).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, _) = send(
    &app,
    TestRequest::post().uri("/api/admin/approve-vendor/4242").cookie(admin.clone()),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (_, pending) = send(&app, TestRequest::get().uri("/api/admin/pending-vendors").cookie(admin)).await;
  assert!(pending.as_array().unwrap().is_empty());
}

/// Places a confirmed cash-on-delivery order and returns its id.
async fn confirmed_order(state: &AppState) -> i32 {
  let category = create_category(state, "Electronics").await;
  let seller_user = create_user(state, "seller@example.com", false).await;
  let seller = approved_seller(state, &seller_user).await;
  let product = approved_product(state, &seller, &category, 5_000, 3).await;
  let buyer = create_user(state, "buyer@example.com", false).await;
  state.storage.add_to_cart(&buyer.id, product.id, 1).await.unwrap();

  let lines = state.storage.cart_lines(&buyer.id).await.unwrap();
  let placed = state
    .storage
    .place_order(shopnish_server::storage::NewOrder {
      user_id: buyer.id.clone(),
      order_number: shopnish_server::services::pricing::order_number(),
      status: shopnish_server::models::OrderStatus::Confirmed,
      subtotal_cents: 5_000,
      tax_cents: 900,
      shipping_cents: 5_000,
      total_cents: 10_900,
      payment_method: shopnish_server::models::PaymentMethod::Cod,
      shipping_address: json!({ "line1": "1 Park Street" }),
      lines: lines
        .iter()
        .map(|line| shopnish_server::storage::NewOrderLine {
          product_id: line.product.id,
          seller_id: line.product.seller_id,
          product_name: line.product.listing.name.clone(),
          quantity: line.item.quantity,
          unit_price_cents: line.product.listing.price_cents,
        })
        .collect(),
    })
    .await
    .unwrap();
  placed.order.id
}

async fn advance<S, B>(app: &S, cookie: &Cookie<'static>, assignment_id: i64, status: &str) -> (StatusCode, serde_json::Value)
where
  S: actix_web::dev::Service<actix_http::Request, Response = actix_web::dev::ServiceResponse<B>, Error = actix_web::Error>,
  B: actix_web::body::MessageBody,
{
  send(
    app,
    TestRequest::post()
      .uri(&format!("/api/delivery/assignments/{}/status", assignment_id))
      .cookie(cookie.clone())
      .set_json(json!({ "status": status })),
  )
  .await
}

#[actix_web::test]
async fn test_delivery_runs_from_assignment_to_doorstep() {
  let state = test_state();
  let app = spawn_app(&state).await;
  let order_id = confirmed_order(&state).await;
  create_user(&state, "admin@example.com", true).await;
  let rider = create_user(&state, "rider@example.com", false).await;
  let agent = approved_delivery_boy(&state, &rider).await;
  create_user(&state, "stranger@example.com", false).await;

  let admin = sign_in(&app, "admin@example.com").await;
  let assign_uri = format!("/api/admin/orders/{}/assign-delivery", order_id);
  let (status, assignment) = send(
    &app,
    TestRequest::post()
      .uri(&assign_uri)
      .cookie(admin.clone())
      .set_json(json!({ "deliveryBoyId": agent.id, "deliveryFeeCents": 4_000, "notes": "Ring twice" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(assignment["status"], "pending");
  assert_eq!(assignment["deliveryFeeCents"], 4_000);
  let assignment_id = assignment["id"].as_i64().unwrap();

  let busy = state.storage.delivery_boy_by_id(agent.id).await.unwrap().unwrap();
  assert!(!busy.is_available);

  let (status, _) = send(
    &app,
    TestRequest::post()
      .uri(&assign_uri)
      .cookie(admin.clone())
      .set_json(json!({ "deliveryBoyId": agent.id })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let stranger = sign_in(&app, "stranger@example.com").await;
  let (status, _) = advance(&app, &stranger, assignment_id, "accepted").await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let rider_cookie = sign_in(&app, "rider@example.com").await;
  let (status, _) = advance(&app, &rider_cookie, assignment_id, "picked_up").await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, accepted) = advance(&app, &rider_cookie, assignment_id, "accepted").await;
  assert_eq!(status, StatusCode::OK);
  assert!(accepted["acceptedAt"].is_string());
  let (status, _) = advance(&app, &rider_cookie, assignment_id, "accepted").await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, _) = advance(&app, &rider_cookie, assignment_id, "picked_up").await;
  assert_eq!(status, StatusCode::OK);
  let shipped = state.storage.order_by_id(order_id).await.unwrap().unwrap();
  assert_eq!(shipped.order.status.as_str(), "shipped");

  let (status, _) = advance(&app, &rider_cookie, assignment_id, "on_the_way").await;
  assert_eq!(status, StatusCode::OK);
  let (status, delivered) = advance(&app, &rider_cookie, assignment_id, "delivered").await;
  assert_eq!(status, StatusCode::OK);
  assert!(delivered["deliveredAt"].is_string());

  let (status, _) = advance(&app, &rider_cookie, assignment_id, "delivered").await;
  assert_eq!(status, StatusCode::CONFLICT);

  let done = state.storage.order_by_id(order_id).await.unwrap().unwrap();
  assert_eq!(done.order.status.as_str(), "delivered");
  assert_eq!(done.order.payment_status.as_str(), "paid");

  let (status, me) = send(&app, TestRequest::get().uri("/api/delivery/me").cookie(rider_cookie.clone())).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["isAvailable"], true);
  assert_eq!(me["totalDeliveries"], 1);

  let (_, assignments) = send(
    &app,
    TestRequest::get().uri("/api/delivery/assignments").cookie(rider_cookie),
  )
  .await;
  assert_eq!(assignments.as_array().unwrap().len(), 1);

  let (status, orders) = send(
    &app,
    TestRequest::get().uri("/api/admin/orders?status=delivered").cookie(admin),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_unapproved_agents_cannot_take_orders() {
  let state = test_state();
  let app = spawn_app(&state).await;
  let order_id = confirmed_order(&state).await;
  create_user(&state, "admin@example.com", true).await;
  create_user(&state, "newbie@example.com", false).await;

  let newbie = sign_in(&app, "newbie@example.com").await;
  let (status, agent) = send(
    &app,
    TestRequest::post()
      .uri("/api/delivery/register")
      .cookie(newbie.clone())
      .set_json(json!({ "name": "Newbie", "phone": "9000000009", "vehicleType": "cycle" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(agent["approvalStatus"], "pending");

  let (status, _) = send(
    &app,
    TestRequest::put()
      .uri("/api/delivery/availability")
      .cookie(newbie)
      .set_json(json!({ "isAvailable": true })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let admin = sign_in(&app, "admin@example.com").await;
  let (status, _) = send(
    &app,
    TestRequest::post()
      .uri(&format!("/api/admin/orders/{}/assign-delivery", order_id))
      .cookie(admin)
      .set_json(json!({ "deliveryBoyId": agent["id"] })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
}
