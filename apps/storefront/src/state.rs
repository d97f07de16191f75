// src/state.rs

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::pipelines::register_all_flows;
use crate::storage::Storage;
use shopnish_flow::FlowRegistry;
use std::sync::Arc;

/// Shared by every worker; cloning only bumps reference counts.
#[derive(Clone)]
pub struct AppState {
  pub storage: Arc<dyn Storage>,
  pub flows: Arc<FlowRegistry<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Builds the state and registers every flow the handlers run.
  pub fn new(config: AppConfig, storage: Arc<dyn Storage>) -> Self {
    let flows = FlowRegistry::new();
    register_all_flows(&flows);
    tracing::info!(flows = flows.len(), backend = storage.backend_name(), "Application state ready.");
    Self {
      storage,
      flows: Arc::new(flows),
      config: Arc::new(config),
    }
  }
}
