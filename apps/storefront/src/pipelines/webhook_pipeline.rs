// src/pipelines/webhook_pipeline.rs

//! Payment provider callbacks. Replays for an order whose payment already
//! settled halt the flow without touching anything.

use crate::errors::AppError;
use crate::models::PaymentStatus;
use crate::pipelines::common_steps::missing;
use crate::pipelines::contexts::PaymentWebhookCtxData;
use shopnish_flow::{Flow, FlowContext, FlowRegistry, StepControl, StepDef};
use tracing::{info, warn};

pub fn register_payment_webhook_pipeline(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<PaymentWebhookCtxData, AppError>::new(
    "payment_webhook",
    [
      StepDef::required("validate_webhook_payload"),
      StepDef::required("load_order"),
      StepDef::required("ignore_settled_payment"),
      StepDef::required("apply_payment_outcome"),
    ],
  );

  flow.on("validate_webhook_payload", |ctx: FlowContext<PaymentWebhookCtxData>| async move {
    if ctx.read().payment_reference.trim().is_empty() {
      return Err(AppError::Validation("paymentReference is required.".to_string()));
    }
    Ok(StepControl::Continue)
  });

  flow.on("load_order", |ctx: FlowContext<PaymentWebhookCtxData>| async move {
    let (reference, storage) = ctx.snapshot(|data| (data.payment_reference.clone(), data.app.storage.clone()));
    let order = storage
      .order_by_payment_reference(&reference)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("No order for payment reference {}", reference)))?;
    ctx.update(|data| data.order = Some(order));
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("ignore_settled_payment", |ctx: FlowContext<PaymentWebhookCtxData>| async move {
    let order = ctx.snapshot(|data| data.order.clone()).ok_or_else(|| missing("order"))?;
    if order.payment_status != PaymentStatus::Pending {
      warn!(order_id = order.id, payment_status = %order.payment_status, "Payment already settled; ignoring webhook.");
      return Ok(StepControl::Halt);
    }
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("apply_payment_outcome", |ctx: FlowContext<PaymentWebhookCtxData>| async move {
    let (order, outcome, storage) = ctx.snapshot(|data| (data.order.clone(), data.outcome, data.app.storage.clone()));
    let order = order.ok_or_else(|| missing("order"))?;
    let updated = storage.settle_payment(order.id, outcome).await?;
    info!(
      order_id = updated.id,
      status = %updated.status,
      payment_status = %updated.payment_status,
      "Payment outcome applied."
    );
    ctx.update(|data| data.order = Some(updated));
    Ok::<_, AppError>(StepControl::Continue)
  });

  registry.register(flow);
  info!("Payment webhook flow registered.");
}
