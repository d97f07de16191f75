// src/pipelines/checkout_pipeline.rs

//! Cart to order. The order, its items and the stock decrements are written in
//! one storage call; everything after it works on the placed order.

use crate::errors::AppError;
use crate::models::{Order, OrderStatus, PaymentMethod};
use crate::pipelines::common_steps::{missing, notify};
use crate::pipelines::contexts::CheckoutCtxData;
use crate::services::payment_mock::{self, PaymentIntent};
use crate::services::pricing;
use crate::state::AppState;
use crate::storage::{NewOrder, NewOrderLine, PaymentOutcome};
use shopnish_flow::{Flow, FlowContext, FlowRegistry, StepControl, StepDef};
use tracing::{error, info, warn};

pub fn register_checkout_pipeline(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<CheckoutCtxData, AppError>::new(
    "checkout",
    [
      StepDef::required("validate_checkout_input"),
      StepDef::required("load_cart"),
      StepDef::required("validate_cart_lines"),
      StepDef::required("price_order"),
      StepDef::required("place_order"),
      StepDef::required("create_payment_intent")
        .skip_when(|data: &CheckoutCtxData| data.payment_method == PaymentMethod::Cod),
      StepDef::required("clear_cart"),
      StepDef::optional("send_order_confirmation"),
    ],
  );

  flow.on("validate_checkout_input", |ctx: FlowContext<CheckoutCtxData>| async move {
    let usable = ctx.snapshot(|data| {
      data
        .shipping_address
        .as_object()
        .is_some_and(|fields| !fields.is_empty())
    });
    if !usable {
      return Err(AppError::Validation("A shipping address is required.".to_string()));
    }
    Ok(StepControl::Continue)
  });

  flow.on("load_cart", |ctx: FlowContext<CheckoutCtxData>| async move {
    let (user_id, storage) = ctx.snapshot(|data| (data.customer.id.clone(), data.app.storage.clone()));
    let lines = storage.cart_lines(&user_id).await?;
    if lines.is_empty() {
      return Err(AppError::Validation("Your cart is empty.".to_string()));
    }
    ctx.update(|data| data.lines = lines);
    Ok(StepControl::Continue)
  });

  flow.on("validate_cart_lines", |ctx: FlowContext<CheckoutCtxData>| async move {
    let lines = ctx.snapshot(|data| data.lines.clone());
    for line in &lines {
      let product = &line.product;
      if !product.is_listed() {
        return Err(AppError::Validation(format!(
          "{} is no longer available.",
          product.listing.name
        )));
      }
      if line.item.quantity > product.listing.stock {
        return Err(AppError::Validation(format!(
          "Insufficient stock for {}. Only {} available.",
          product.listing.name, product.listing.stock
        )));
      }
    }
    Ok(StepControl::Continue)
  });

  flow.on("price_order", |ctx: FlowContext<CheckoutCtxData>| async move {
    ctx.update(|data| {
      let subtotal: i64 = data.lines.iter().map(|line| line.line_total_cents()).sum();
      data.price = Some(pricing::quote(&data.app.config.pricing, subtotal));
    });
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("place_order", |ctx: FlowContext<CheckoutCtxData>| async move {
    let (new_order, storage) = ctx.snapshot(|data| {
      let new_order = data.price.map(|price| NewOrder {
        user_id: data.customer.id.clone(),
        order_number: pricing::order_number(),
        // Cash on delivery needs no payment confirmation.
        status: match data.payment_method {
          PaymentMethod::Cod => OrderStatus::Confirmed,
          PaymentMethod::Card => OrderStatus::Pending,
        },
        subtotal_cents: price.subtotal_cents,
        tax_cents: price.tax_cents,
        shipping_cents: price.shipping_cents,
        total_cents: price.total_cents,
        payment_method: data.payment_method,
        shipping_address: data.shipping_address.clone(),
        lines: data
          .lines
          .iter()
          .map(|line| NewOrderLine {
            product_id: line.product.id,
            seller_id: line.product.seller_id,
            product_name: line.product.listing.name.clone(),
            quantity: line.item.quantity,
            unit_price_cents: line.product.listing.price_cents,
          })
          .collect(),
      });
      (new_order, data.app.storage.clone())
    });
    let new_order = new_order.ok_or_else(|| missing("price"))?;

    let placed = storage.place_order(new_order).await?;
    info!(
      order_id = placed.order.id,
      order_number = %placed.order.order_number,
      total_cents = placed.order.total_cents,
      "Order placed."
    );
    ctx.update(|data| data.order = Some(placed));
    Ok::<_, AppError>(StepControl::Continue)
  });

  // The order is already committed here. If no intent can be attached to it,
  // it is cancelled and its stock released before the error is returned.
  flow.on("create_payment_intent", |ctx: FlowContext<CheckoutCtxData>| async move {
    let (order, app) = ctx.snapshot(|data| (data.order.as_ref().map(|o| o.order.clone()), data.app.clone()));
    let order = order.ok_or_else(|| missing("order"))?;

    let intent = match attach_payment_intent(&app, &order).await {
      Ok(intent) => intent,
      Err(err) => {
        release_order(&app, order.id).await;
        return Err(err);
      }
    };
    ctx.update(|data| {
      if let Some(placed) = data.order.as_mut() {
        placed.order.payment_reference = Some(intent.id.clone());
      }
      data.payment_intent = Some(intent);
    });
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("clear_cart", |ctx: FlowContext<CheckoutCtxData>| async move {
    let (user_id, storage) = ctx.snapshot(|data| (data.customer.id.clone(), data.app.storage.clone()));
    storage.clear_cart(&user_id).await?;
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("send_order_confirmation", |ctx: FlowContext<CheckoutCtxData>| async move {
    let (customer, order, config) = ctx.snapshot(|data| {
      (
        data.customer.clone(),
        data.order.as_ref().map(|o| o.order.clone()),
        data.app.config.clone(),
      )
    });
    let Some(order) = order else {
      warn!("No order to confirm.");
      return Ok::<_, AppError>(StepControl::Continue);
    };
    let sent = notify(
      &config,
      &customer.email,
      &format!("Your Shopnish order {} is placed", order.order_number),
      &format!(
        "Hi {}, we received your order {} for {} {:.2}.",
        customer.display_name(),
        order.order_number,
        config.currency,
        order.total_cents as f64 / 100.0
      ),
    )
    .await;
    ctx.update(|data| data.confirmation_sent = sent);
    Ok(StepControl::Continue)
  });

  registry.register(flow);
  info!("Checkout flow registered.");
}

async fn attach_payment_intent(app: &AppState, order: &Order) -> Result<PaymentIntent, AppError> {
  let intent = payment_mock::create_payment_intent(
    order.id,
    order.total_cents,
    &app.config.currency,
    &app.config.payment_account_id,
    app.config.payment_max_amount_cents,
  )
  .await?;
  app.storage.set_payment_reference(order.id, &intent.id).await?;
  Ok(intent)
}

/// Cancels an order that never got a payment intent and puts its stock back.
async fn release_order(app: &AppState, order_id: i32) {
  match app.storage.settle_payment(order_id, PaymentOutcome::Failed).await {
    Ok(_) => warn!(order_id, "Payment intent failed; order cancelled and stock released."),
    Err(err) => error!(order_id, error = %err, "Could not release the order after a failed payment intent."),
  }
}
