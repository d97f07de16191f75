// src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
  Development,
  Production,
}

impl Environment {
  pub fn is_production(self) -> bool {
    self == Environment::Production
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Environment::Development => "development",
      Environment::Production => "production",
    }
  }
}

impl FromStr for Environment {
  type Err = AppError;

  fn from_str(value: &str) -> Result<Self> {
    match value.trim().to_ascii_lowercase().as_str() {
      "development" | "dev" | "local" | "test" => Ok(Environment::Development),
      "production" | "prod" => Ok(Environment::Production),
      other => Err(AppError::Config(format!("Invalid APP_ENV '{}'", other))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

impl FromStr for LogFormat {
  type Err = AppError;

  fn from_str(value: &str) -> Result<Self> {
    match value.trim().to_ascii_lowercase().as_str() {
      "pretty" | "text" => Ok(LogFormat::Pretty),
      "json" => Ok(LogFormat::Json),
      other => Err(AppError::Config(format!("Invalid LOG_FORMAT '{}'", other))),
    }
  }
}

/// Checkout pricing knobs. Amounts are in minor units, the tax rate in basis
/// points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingConfig {
  pub tax_rate_bps: i64,
  pub free_shipping_threshold_cents: i64,
  pub shipping_fee_cents: i64,
}

impl Default for PricingConfig {
  fn default() -> Self {
    Self {
      tax_rate_bps: 1800,
      free_shipping_threshold_cents: 99_900,
      shipping_fee_cents: 5_000,
    }
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub environment: Environment,
  /// Absent in development means in-memory storage.
  pub database_url: Option<String>,
  pub run_migrations: bool,
  pub session_secret: Option<String>,
  pub dev_auth: bool,
  pub log_format: LogFormat,
  pub pricing: PricingConfig,
  pub food_delivery_fee_cents: i64,
  pub currency: String,
  pub payment_account_id: String,
  /// Largest amount the payment processor accepts for one intent.
  pub payment_max_amount_cents: i64,
  pub payment_webhook_secret: Option<String>,
  pub mail_sender: String,
  pub seed_db: bool,
}

impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("environment", &self.environment)
      .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
      .field("run_migrations", &self.run_migrations)
      .field("session_secret", &self.session_secret.as_ref().map(|_| "[REDACTED]"))
      .field("dev_auth", &self.dev_auth)
      .field("log_format", &self.log_format)
      .field("pricing", &self.pricing)
      .field("food_delivery_fee_cents", &self.food_delivery_fee_cents)
      .field("currency", &self.currency)
      .field("payment_account_id", &self.payment_account_id)
      .field("payment_max_amount_cents", &self.payment_max_amount_cents)
      .field("payment_webhook_secret", &self.payment_webhook_secret.as_ref().map(|_| "[REDACTED]"))
      .field("mail_sender", &self.mail_sender)
      .field("seed_db", &self.seed_db)
      .finish()
  }
}

const MIN_SESSION_SECRET_LEN: usize = 64;

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the configuration from any variable source. Empty values count as
  /// unset.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get_env = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    let environment = match get_env("APP_ENV") {
      Some(raw) => raw.parse::<Environment>()?,
      None => Environment::Development,
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = parse_or("SERVER_PORT", get_env("SERVER_PORT"), 5000u16)?;

    let database_url = get_env("DATABASE_URL");
    if database_url.is_none() && environment.is_production() {
      return Err(AppError::Config("DATABASE_URL is required in production".to_string()));
    }
    let run_migrations = parse_or("RUN_MIGRATIONS", get_env("RUN_MIGRATIONS"), true)?;

    let session_secret = get_env("SESSION_SECRET");
    match &session_secret {
      Some(secret) if secret.len() < MIN_SESSION_SECRET_LEN => {
        return Err(AppError::Config(format!(
          "SESSION_SECRET must be at least {} bytes",
          MIN_SESSION_SECRET_LEN
        )));
      }
      None if environment.is_production() => {
        return Err(AppError::Config("SESSION_SECRET is required in production".to_string()));
      }
      _ => {}
    }

    // Development auth never survives into production.
    let dev_auth = if environment.is_production() {
      false
    } else {
      parse_or("DEV_AUTH", get_env("DEV_AUTH"), true)?
    };

    let log_format = match get_env("LOG_FORMAT") {
      Some(raw) => raw.parse::<LogFormat>()?,
      None => LogFormat::Pretty,
    };

    let defaults = PricingConfig::default();
    let pricing = PricingConfig {
      tax_rate_bps: parse_or("TAX_RATE_BPS", get_env("TAX_RATE_BPS"), defaults.tax_rate_bps)?,
      free_shipping_threshold_cents: parse_or(
        "FREE_SHIPPING_THRESHOLD_CENTS",
        get_env("FREE_SHIPPING_THRESHOLD_CENTS"),
        defaults.free_shipping_threshold_cents,
      )?,
      shipping_fee_cents: parse_or(
        "SHIPPING_FEE_CENTS",
        get_env("SHIPPING_FEE_CENTS"),
        defaults.shipping_fee_cents,
      )?,
    };
    if pricing.tax_rate_bps < 0 || pricing.shipping_fee_cents < 0 || pricing.free_shipping_threshold_cents < 0 {
      return Err(AppError::Config("Pricing values must not be negative".to_string()));
    }

    let food_delivery_fee_cents = parse_or(
      "FOOD_DELIVERY_FEE_CENTS",
      get_env("FOOD_DELIVERY_FEE_CENTS"),
      3_000i64,
    )?;

    let currency = get_env("CURRENCY").unwrap_or_else(|| "INR".to_string());
    let payment_account_id = get_env("PAYMENT_ACCOUNT_ID").unwrap_or_else(|| "mock_main_acct".to_string());
    let payment_max_amount_cents = parse_or(
      "PAYMENT_MAX_AMOUNT_CENTS",
      get_env("PAYMENT_MAX_AMOUNT_CENTS"),
      99_999_999i64,
    )?;
    if payment_max_amount_cents <= 0 {
      return Err(AppError::Config("PAYMENT_MAX_AMOUNT_CENTS must be positive".to_string()));
    }
    let payment_webhook_secret = get_env("PAYMENT_WEBHOOK_SECRET");
    let mail_sender = get_env("MAIL_SENDER").unwrap_or_else(|| "noreply@shopnish.local".to_string());
    let seed_db = parse_or("SEED_DB", get_env("SEED_DB"), false)?;

    Ok(Self {
      server_host,
      server_port,
      environment,
      database_url,
      run_migrations,
      session_secret,
      dev_auth,
      log_format,
      pricing,
      food_delivery_fee_cents,
      currency,
      payment_account_id,
      payment_max_amount_cents,
      payment_webhook_secret,
      mail_sender,
      seed_db,
    })
  }

  pub fn server_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match raw {
    Some(value) => value
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", name, value, e))),
    None => Ok(default),
  }
}
