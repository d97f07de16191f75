// src/models/approval.rs

//! The approval block shared by sellers, products, food vendors, food items,
//! service providers and delivery agents.

use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

string_enum! {
  ApprovalStatus, "approval status" {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
  #[sqlx(try_from = "String")]
  pub approval_status: ApprovalStatus,
  pub rejection_reason: Option<String>,
  /// The admin who made the latest decision, approve or reject.
  pub approved_by: Option<String>,
  pub approved_at: Option<DateTime<Utc>>,
}

impl Default for Approval {
  fn default() -> Self {
    Self::pending()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  Approve,
  Reject { reason: String },
}

impl Decision {
  pub fn target_status(&self) -> ApprovalStatus {
    match self {
      Decision::Approve => ApprovalStatus::Approved,
      Decision::Reject { .. } => ApprovalStatus::Rejected,
    }
  }
}

impl Approval {
  pub fn pending() -> Self {
    Self {
      approval_status: ApprovalStatus::Pending,
      rejection_reason: None,
      approved_by: None,
      approved_at: None,
    }
  }

  pub fn is_approved(&self) -> bool {
    self.approval_status == ApprovalStatus::Approved
  }

  /// Returns the block after `decision`. Any move into a different state is
  /// allowed; deciding the state a record is already in is a conflict.
  pub fn decide(&self, decision: &Decision, admin_id: &str, at: DateTime<Utc>) -> Result<Approval, AppError> {
    let target = decision.target_status();
    if self.approval_status == target {
      return Err(AppError::Conflict(format!("Already {}", target.as_str())));
    }

    let rejection_reason = match decision {
      Decision::Approve => None,
      Decision::Reject { reason } => {
        let reason = reason.trim();
        if reason.is_empty() {
          return Err(AppError::Validation("A rejection reason is required".to_string()));
        }
        Some(reason.to_string())
      }
    };

    Ok(Approval {
      approval_status: target,
      rejection_reason,
      approved_by: Some(admin_id.to_string()),
      approved_at: Some(at),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pending_can_go_either_way() {
    let now = Utc::now();
    let approved = Approval::pending().decide(&Decision::Approve, "admin", now).unwrap();
    assert!(approved.is_approved());
    assert_eq!(approved.approved_by.as_deref(), Some("admin"));
    assert_eq!(approved.approved_at, Some(now));

    let rejected = Approval::pending()
      .decide(&Decision::Reject { reason: " blurry photos ".into() }, "admin", now)
      .unwrap();
    assert_eq!(rejected.approval_status, ApprovalStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("blurry photos"));
  }

  #[test]
  fn rejected_can_be_approved_later_and_clears_reason() {
    let now = Utc::now();
    let rejected = Approval::pending()
      .decide(&Decision::Reject { reason: "missing GST".into() }, "admin", now)
      .unwrap();
    let approved = rejected.decide(&Decision::Approve, "admin-2", now).unwrap();
    assert!(approved.is_approved());
    assert!(approved.rejection_reason.is_none());
    assert_eq!(approved.approved_by.as_deref(), Some("admin-2"));
  }

  #[test]
  fn same_state_is_a_conflict() {
    let now = Utc::now();
    let approved = Approval::pending().decide(&Decision::Approve, "admin", now).unwrap();
    assert!(matches!(
      approved.decide(&Decision::Approve, "admin", now),
      Err(AppError::Conflict(_))
    ));
  }

  #[test]
  fn reject_needs_a_reason() {
    let err = Approval::pending()
      .decide(&Decision::Reject { reason: "   ".into() }, "admin", Utc::now())
      .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
  }
}
