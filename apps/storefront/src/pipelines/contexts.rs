// src/pipelines/contexts.rs

//! Context data for every flow. Handlers build one of these, wrap it in a
//! `FlowContext` and run the registry; steps fill in the `Option` fields as
//! they go and the handler reads the results back afterwards.

use crate::models::{
  Approval, CartItem, CartLine, DeliveryAssignment, DeliveryBoy, DeliveryStatus, Decision, Order, OrderWithItems,
  PaymentMethod, Product, User,
};
use crate::services::payment_mock::PaymentIntent;
use crate::services::pricing::PriceBreakdown;
use crate::state::AppState;
use crate::storage::{ApprovalSubject, ApprovalTarget, PaymentOutcome};

#[derive(Clone)]
pub struct SignupCtxData {
  pub app: AppState,
  pub email: String,
  pub password: String,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub user: Option<User>,
  pub welcome_email_sent: bool,
}

impl SignupCtxData {
  pub fn new(app: AppState, email: String, password: String) -> Self {
    Self {
      app,
      email,
      password,
      first_name: None,
      last_name: None,
      user: None,
      welcome_email_sent: false,
    }
  }
}

#[derive(Clone)]
pub struct SigninCtxData {
  pub app: AppState,
  pub email: String,
  pub password: String,
  pub user: Option<User>,
}

#[derive(Clone)]
pub struct AddToCartCtxData {
  pub app: AppState,
  pub user_id: String,
  pub product_id: i32,
  pub quantity: i32,
  pub product: Option<Product>,
  pub cart_item: Option<CartItem>,
}

#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app: AppState,
  pub customer: User,
  pub shipping_address: serde_json::Value,
  pub payment_method: PaymentMethod,
  pub lines: Vec<CartLine>,
  pub price: Option<PriceBreakdown>,
  pub order: Option<OrderWithItems>,
  pub payment_intent: Option<PaymentIntent>,
  pub confirmation_sent: bool,
}

#[derive(Clone)]
pub struct PaymentWebhookCtxData {
  pub app: AppState,
  pub payment_reference: String,
  pub outcome: PaymentOutcome,
  pub order: Option<Order>,
}

#[derive(Clone)]
pub struct ApprovalCtxData {
  pub app: AppState,
  pub subject: ApprovalSubject,
  pub target_id: i32,
  pub decision: Decision,
  pub admin_id: String,
  pub target: Option<ApprovalTarget>,
  pub approval: Option<Approval>,
  pub owner_notified: bool,
}

#[derive(Clone)]
pub struct AssignDeliveryCtxData {
  pub app: AppState,
  pub order_id: i32,
  pub delivery_boy_id: i32,
  pub delivery_fee_cents: i64,
  pub notes: Option<String>,
  pub admin_id: String,
  pub order: Option<Order>,
  pub agent: Option<DeliveryBoy>,
  pub assignment: Option<DeliveryAssignment>,
}

#[derive(Clone)]
pub struct DeliveryStatusCtxData {
  pub app: AppState,
  pub assignment_id: i32,
  pub user_id: String,
  pub requested: DeliveryStatus,
  pub assignment: Option<DeliveryAssignment>,
}
