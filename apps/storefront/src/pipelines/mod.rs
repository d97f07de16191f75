// src/pipelines/mod.rs

//! Every multi-step mutation of the storefront runs as a flow. Handlers build
//! a context from `contexts` and hand it to the registry.

use crate::errors::AppError;
use shopnish_flow::FlowRegistry;

pub mod common_steps;
pub mod contexts;

pub mod approval_pipeline;
pub mod cart_pipeline;
pub mod checkout_pipeline;
pub mod delivery_pipeline;
pub mod signin_pipeline;
pub mod signup_pipeline;
pub mod webhook_pipeline;

/// Registers all flows. Called once while building `AppState`.
pub fn register_all_flows(registry: &FlowRegistry<AppError>) {
  tracing::info!("Registering flows...");

  signup_pipeline::register_signup_pipeline(registry);
  signin_pipeline::register_signin_pipeline(registry);
  cart_pipeline::register_add_to_cart_pipeline(registry);
  checkout_pipeline::register_checkout_pipeline(registry);
  webhook_pipeline::register_payment_webhook_pipeline(registry);
  approval_pipeline::register_approval_pipeline(registry);
  delivery_pipeline::register_assign_delivery_pipeline(registry);
  delivery_pipeline::register_delivery_status_pipeline(registry);

  tracing::info!(count = registry.len(), "All flows registered.");
}
