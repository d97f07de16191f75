// src/web/handlers/health_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{instrument, warn};

use crate::state::AppState;

/// Liveness for load balancers; never touches storage.
pub async fn healthz_handler() -> HttpResponse {
  HttpResponse::Ok().content_type("text/plain; charset=utf-8").body("OK")
}

pub async fn root_handler() -> HttpResponse {
  HttpResponse::Ok()
    .content_type("text/plain; charset=utf-8")
    .body("Shopnish API is running")
}

/// Readiness: reports the storage backend and whether it answers.
#[instrument(name = "handler::api_health", skip_all)]
pub async fn api_health_handler(app_state: web::Data<AppState>) -> HttpResponse {
  let storage = app_state.storage.backend_name();
  match app_state.storage.ping().await {
    Ok(()) => HttpResponse::Ok().json(json!({
        "status": "ok",
        "storage": storage,
        "environment": app_state.config.environment.as_str(),
    })),
    Err(err) => {
      warn!(error = %err, storage, "Storage ping failed.");
      HttpResponse::ServiceUnavailable().json(json!({
          "status": "unavailable",
          "storage": storage,
          "environment": app_state.config.environment.as_str(),
      }))
    }
  }
}
