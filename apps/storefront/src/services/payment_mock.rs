// src/services/payment_mock.rs

//! Mock card processor. Creating an intent is all checkout does; the outcome
//! arrives later through the payment webhook.

use crate::errors::{AppError, Result as AppResult};
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PaymentIntent {
  pub id: String,
  pub amount_cents: i64,
  pub currency: String,
  pub client_secret: String,
  pub account_id: String,
}

/// The processor refuses amounts above `max_amount_cents`, the way a real
/// card network caps a single charge.
#[instrument(name = "payment_mock::create_intent", skip(account_id), fields(payment_account_id = %account_id))]
pub async fn create_payment_intent(
  order_id: i32,
  amount_cents: i64,
  currency: &str,
  account_id: &str,
  max_amount_cents: i64,
) -> AppResult<PaymentIntent> {
  if amount_cents <= 0 {
    return Err(AppError::Payment("Amount must be greater than zero".to_string()));
  }
  if amount_cents > max_amount_cents {
    return Err(AppError::Payment(format!(
      "Amount exceeds the {} {:.2} limit for a single payment",
      currency,
      max_amount_cents as f64 / 100.0
    )));
  }
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;

  let id = format!("mock_pi_{}", Uuid::new_v4().simple());
  info!(payment_intent_id = %id, "Payment intent created.");
  Ok(PaymentIntent {
    client_secret: format!("{}_secret_{}", id, Uuid::new_v4().simple()),
    id,
    amount_cents,
    currency: currency.to_string(),
    account_id: account_id.to_string(),
  })
}

/// With no secret configured every webhook call is accepted.
pub fn webhook_signature_valid(expected: Option<&str>, provided: Option<&str>) -> bool {
  match expected {
    None => true,
    Some(secret) => provided == Some(secret),
  }
}
