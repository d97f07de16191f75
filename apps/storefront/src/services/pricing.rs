// src/services/pricing.rs

//! Checkout arithmetic. All amounts are minor units.

use crate::config::PricingConfig;
use chrono::Utc;
use rand_core::{OsRng, RngCore};
use serde::Serialize;

const ORDER_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ORDER_SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
  pub subtotal_cents: i64,
  pub tax_cents: i64,
  pub shipping_cents: i64,
  pub total_cents: i64,
}

/// Tax rounds half up; shipping is free strictly above the threshold.
pub fn quote(config: &PricingConfig, subtotal_cents: i64) -> PriceBreakdown {
  let tax_cents = (subtotal_cents * config.tax_rate_bps + 5_000) / 10_000;
  let shipping_cents = if subtotal_cents > config.free_shipping_threshold_cents {
    0
  } else {
    config.shipping_fee_cents
  };
  PriceBreakdown {
    subtotal_cents,
    tax_cents,
    shipping_cents,
    total_cents: subtotal_cents + tax_cents + shipping_cents,
  }
}

/// `ORD-<unix millis>-<9 lowercase alphanumerics>`.
pub fn order_number() -> String {
  let mut bytes = [0u8; ORDER_SUFFIX_LEN];
  OsRng.fill_bytes(&mut bytes);
  let suffix: String = bytes
    .iter()
    .map(|b| ORDER_SUFFIX_ALPHABET[usize::from(*b) % ORDER_SUFFIX_ALPHABET.len()] as char)
    .collect();
  format!("ORD-{}-{}", Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn small_orders_pay_shipping() {
    let quote = quote(&PricingConfig::default(), 50_000);
    assert_eq!(quote.tax_cents, 9_000);
    assert_eq!(quote.shipping_cents, 5_000);
    assert_eq!(quote.total_cents, 64_000);
  }

  #[test]
  fn threshold_is_exclusive() {
    let config = PricingConfig::default();
    assert_eq!(quote(&config, 99_900).shipping_cents, 5_000);
    assert_eq!(quote(&config, 99_901).shipping_cents, 0);
  }

  #[test]
  fn tax_rounds_half_up() {
    let config = PricingConfig::default();
    // 18% of 25 = 4.5
    assert_eq!(quote(&config, 25).tax_cents, 5);
    // 18% of 24 = 4.32
    assert_eq!(quote(&config, 24).tax_cents, 4);
  }

  #[test]
  fn order_numbers_have_the_expected_shape() {
    let number = order_number();
    let parts: Vec<&str> = number.splitn(3, '-').collect();
    assert_eq!(parts[0], "ORD");
    assert!(parts[1].parse::<i64>().is_ok());
    assert_eq!(parts[2].len(), 9);
    assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    assert_ne!(order_number(), number);
  }
}
