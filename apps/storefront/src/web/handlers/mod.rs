// src/web/handlers/mod.rs

pub mod admin_handlers;
pub mod auth_handlers;
pub mod cart_handlers;
pub mod catalog_handlers;
pub mod checkout_handlers;
pub mod delivery_handlers;
pub mod food_handlers;
pub mod health_handlers;
pub mod seller_handlers;
pub mod service_handlers;
pub mod webhook_handlers;

use crate::errors::AppError;
use crate::state::AppState;
use shopnish_flow::{FlowContext, FlowOutcome};
use tracing::warn;

/// Runs the flow registered for `T` and returns how it ended together with
/// the final context data.
pub(crate) async fn run_flow<T>(state: &AppState, data: T) -> Result<(FlowOutcome, T), AppError>
where
  T: Clone + Send + Sync + 'static,
{
  let ctx = FlowContext::new(data);
  match state.flows.run(ctx.clone()).await {
    Ok(outcome) => {
      let data = ctx.try_into_inner().unwrap_or_else(|shared| shared.snapshot(T::clone));
      Ok((outcome, data))
    }
    Err(app_err) => {
      warn!(error = %app_err, flow = %std::any::type_name::<T>(), "Flow failed.");
      Err(app_err)
    }
  }
}

/// For flows that never halt on purpose.
pub(crate) fn expect_completed(outcome: FlowOutcome) -> Result<(), AppError> {
  match outcome {
    FlowOutcome::Completed => Ok(()),
    FlowOutcome::Halted { step } => {
      warn!(%step, "Flow halted unexpectedly.");
      Err(AppError::Halted { step })
    }
  }
}

/// Trims an optional text field and drops it when nothing is left.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Trims a required text field; empty is a validation error naming `field`.
pub(crate) fn required(value: &str, field: &str) -> Result<String, AppError> {
  let value = value.trim();
  if value.is_empty() {
    return Err(AppError::Validation(format!("{} is required", field)));
  }
  Ok(value.to_string())
}
