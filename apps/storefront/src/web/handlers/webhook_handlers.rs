// src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use shopnish_flow::FlowOutcome;
use tracing::{info, instrument, warn};

use super::run_flow;
use crate::errors::AppError;
use crate::pipelines::common_steps::missing;
use crate::pipelines::contexts::PaymentWebhookCtxData;
use crate::services::payment_mock::webhook_signature_valid;
use crate::state::AppState;
use crate::storage::PaymentOutcome;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
  Succeeded,
  Failed,
}

impl From<WebhookOutcome> for PaymentOutcome {
  fn from(outcome: WebhookOutcome) -> Self {
    match outcome {
      WebhookOutcome::Succeeded => PaymentOutcome::Succeeded,
      WebhookOutcome::Failed => PaymentOutcome::Failed,
    }
  }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhookPayload {
  pub payment_reference: String,
  pub outcome: WebhookOutcome,
}

// --- Handler Implementation ---

#[instrument(
    name = "handler::payment_webhook",
    skip(app_state, req, req_payload),
    fields(payment_reference = %req_payload.payment_reference, outcome = ?req_payload.outcome)
)]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  req_payload: web::Json<PaymentWebhookPayload>,
) -> Result<HttpResponse, AppError> {
  let signature = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|value| value.to_str().ok());
  if !webhook_signature_valid(app_state.config.payment_webhook_secret.as_deref(), signature) {
    warn!("Webhook rejected: bad or missing signature.");
    return Err(AppError::Unauthorized("Invalid webhook signature".to_string()));
  }

  let payload = req_payload.into_inner();
  let webhook_ctx = PaymentWebhookCtxData {
    app: app_state.get_ref().clone(),
    payment_reference: payload.payment_reference,
    outcome: payload.outcome.into(),
    order: None,
  };

  let (outcome, data) = run_flow(&app_state, webhook_ctx).await?;
  let order = data.order.ok_or_else(|| missing("order"))?;

  match outcome {
    FlowOutcome::Completed => {
      info!(order_id = order.id, status = %order.status, "Webhook processed.");
      Ok(HttpResponse::Ok().json(json!({
          "received": true,
          "orderId": order.id,
          "status": order.status,
          "paymentStatus": order.payment_status,
      })))
    }
    // Replays for a settled payment are acknowledged so the provider stops
    // retrying.
    FlowOutcome::Halted { step } => {
      info!(order_id = order.id, %step, "Webhook replay acknowledged without changes.");
      Ok(HttpResponse::Ok().json(json!({
          "received": true,
          "ignored": true,
          "orderId": order.id,
          "status": order.status,
          "paymentStatus": order.payment_status,
      })))
    }
  }
}
