// src/pipelines/cart_pipeline.rs

use crate::errors::AppError;
use crate::pipelines::contexts::AddToCartCtxData;
use shopnish_flow::{Flow, FlowContext, FlowRegistry, StepControl, StepDef};
use tracing::{info, warn};

pub fn register_add_to_cart_pipeline(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<AddToCartCtxData, AppError>::new(
    "add_to_cart",
    [
      StepDef::required("validate_cart_input"),
      StepDef::required("fetch_product_for_cart"),
      StepDef::required("add_or_update_cart_item"),
    ],
  );

  flow.on("validate_cart_input", |ctx: FlowContext<AddToCartCtxData>| async move {
    let quantity = ctx.read().quantity;
    if quantity <= 0 {
      warn!(quantity, "Add to cart with a non-positive quantity.");
      return Err(AppError::Validation("Quantity must be a positive number.".to_string()));
    }
    Ok(StepControl::Continue)
  });

  flow.on("fetch_product_for_cart", |ctx: FlowContext<AddToCartCtxData>| async move {
    let (product_id, storage) = ctx.snapshot(|data| (data.product_id, data.app.storage.clone()));
    let product = storage
      .product_by_id(product_id)
      .await?
      .filter(|p| p.is_listed())
      .ok_or_else(|| AppError::not_found("Product", product_id))?;
    ctx.update(|data| data.product = Some(product));
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("add_or_update_cart_item", |ctx: FlowContext<AddToCartCtxData>| async move {
    let (user_id, product_id, quantity, storage) =
      ctx.snapshot(|data| (data.user_id.clone(), data.product_id, data.quantity, data.app.storage.clone()));
    // The stock ceiling is enforced by the same write that merges the line.
    let item = match storage.add_to_cart(&user_id, product_id, quantity).await {
      Ok(item) => item,
      Err(err) => {
        if matches!(err, AppError::Validation(_)) {
          warn!(product_id, requested = quantity, "Insufficient stock.");
        }
        return Err(err);
      }
    };
    info!(cart_item_id = item.id, quantity = item.quantity, "Cart updated.");
    ctx.update(|data| data.cart_item = Some(item));
    Ok::<_, AppError>(StepControl::Continue)
  });

  registry.register(flow);
  info!("Add-to-cart flow registered.");
}
