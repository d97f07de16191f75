// src/main.rs

use actix_web::HttpServer;
use anyhow::Context;
use tracing_subscriber::fmt::format::FmtSpan; // For span events in tracing
use tracing_subscriber::EnvFilter;

use shopnish_server::config::{AppConfig, LogFormat};
use shopnish_server::state::AppState;
use shopnish_server::storage::{self, seed};
use shopnish_server::{build_app, web};

fn init_tracing(format: LogFormat) {
  // RUST_LOG overrides the default level.
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let app_config = AppConfig::from_env().context("failed to load configuration")?;
  init_tracing(app_config.log_format);
  tracing::info!(config = ?app_config, "Starting Shopnish storefront...");

  let storage = storage::connect(&app_config)
    .await
    .context("failed to initialise storage")?;
  seed::run(storage.as_ref(), &app_config)
    .await
    .context("failed to seed startup data")?;

  let key = web::session_key(&app_config)?;
  let cookie_secure = app_config.environment.is_production();
  let server_address = app_config.server_address();
  let app_state = AppState::new(app_config, storage);

  tracing::info!("Binding server to {}...", server_address);
  HttpServer::new(move || build_app(app_state.clone(), key.clone(), cookie_secure))
    .bind(&server_address)
    .with_context(|| format!("failed to bind {}", server_address))?
    .run()
    .await?;

  tracing::info!("Server stopped.");
  Ok(())
}
