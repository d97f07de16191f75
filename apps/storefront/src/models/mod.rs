// src/models/mod.rs

//! Rows of the storefront schema and the status enums stored in them.
//!
//! Status columns are varchar in the database; each enum decodes through
//! `TryFrom<String>` (`#[sqlx(try_from = "String")]`) and binds with
//! `as_str()`.

use thiserror::Error;

/// A status column held a value this build does not know.
#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownValue {
  pub kind: &'static str,
  pub value: String,
}

impl UnknownValue {
  pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
    Self {
      kind,
      value: value.into(),
    }
  }
}

/// Declares a string-backed enum with serde names, `as_str`, `Display`,
/// `FromStr` and `TryFrom<String>`.
macro_rules! string_enum {
  ($name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub enum $name {
      $(
        #[serde(rename = $text)]
        $variant,
      )+
    }

    impl $name {
      pub fn as_str(self) -> &'static str {
        match self {
          $($name::$variant => $text,)+
        }
      }
    }

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl TryFrom<String> for $name {
      type Error = $crate::models::UnknownValue;

      fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
          $($text => Ok($name::$variant),)+
          _ => Err($crate::models::UnknownValue::new($kind, value)),
        }
      }
    }

    impl std::str::FromStr for $name {
      type Err = $crate::models::UnknownValue;

      fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(value.to_string())
      }
    }
  };
}

pub mod approval;
pub mod cart_item;
pub mod category;
pub mod delivery;
pub mod food;
pub mod order;
pub mod order_item;
pub mod product;
pub mod seller;
pub mod service;
pub mod user;

pub use approval::{Approval, ApprovalStatus, Decision};
pub use cart_item::{CartItem, CartLine};
pub use category::Category;
pub use delivery::{DeliveryAssignment, DeliveryBoy, DeliveryStatus};
pub use food::{FoodItem, FoodOrder, FoodOrderLine, FoodOrderStatus, FoodVendor};
pub use order::{Order, OrderStatus, OrderWithItems, PaymentMethod, PaymentStatus};
pub use order_item::OrderItem;
pub use product::Product;
pub use seller::{Seller, SellerProfile};
pub use service::{BookingStatus, ServiceBooking, ServiceProvider};
pub use user::User;

/// Who is acting on a two-sided record such as a food order or a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
  Customer,
  Provider,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_strings_round_trip_through_storage_form() {
    assert_eq!(DeliveryStatus::PickedUp.as_str(), "picked_up");
    assert_eq!(DeliveryStatus::try_from("on_the_way".to_string()).unwrap(), DeliveryStatus::OnTheWay);
    assert_eq!("cod".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cod);
    assert!(OrderStatus::try_from("lost".to_string()).is_err());
  }

  #[test]
  fn serde_uses_the_storage_names() {
    let json = serde_json::to_string(&DeliveryStatus::OnTheWay).unwrap();
    assert_eq!(json, "\"on_the_way\"");
    let parsed: ApprovalStatus = serde_json::from_str("\"rejected\"").unwrap();
    assert_eq!(parsed, ApprovalStatus::Rejected);
  }
}
