use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::document::DocumentId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
    Referred,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Referred => "referred",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "referred" => Some(Self::Referred),
            _ => None,
        }
    }
}

/// An approver's verdict on one step. Referral re-delegates the same step to
/// another user instead of advancing the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
    Refer { to: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecisionError {
    #[error("transaction `{transaction_id}` was already resolved as {status}")]
    AlreadyResolved { transaction_id: String, status: &'static str },
    #[error("user `{acting_user}` is not the assigned approver for transaction `{transaction_id}`")]
    UnauthorizedActor { transaction_id: String, acting_user: String },
}

/// One (document, step) approval attempt. Rows are append-only: status moves
/// off Pending exactly once and the record is never deleted afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalTransaction {
    pub id: TransactionId,
    pub document_id: DocumentId,
    pub process_title: String,
    pub step_order: i32,
    pub step_description: String,
    pub requested_by: String,
    pub assigned_to: String,
    pub referred_to: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalTransaction {
    /// True for the assigned approver, or the delegate once the step has been
    /// referred onward.
    pub fn authorizes(&self, acting_user: &str) -> bool {
        self.assigned_to == acting_user
            || self.referred_to.as_deref() == Some(acting_user)
    }

    /// Applies a decision in place. Guards both the actor and the
    /// already-resolved case; a decision cannot be applied twice.
    pub fn resolve(
        &mut self,
        decision: &Decision,
        acting_user: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DecisionError> {
        if self.status != TransactionStatus::Pending {
            return Err(DecisionError::AlreadyResolved {
                transaction_id: self.id.0.clone(),
                status: self.status.as_str(),
            });
        }

        if !self.authorizes(acting_user) {
            return Err(DecisionError::UnauthorizedActor {
                transaction_id: self.id.0.clone(),
                acting_user: acting_user.to_string(),
            });
        }

        self.status = match decision {
            Decision::Approve => TransactionStatus::Approved,
            Decision::Reject => TransactionStatus::Rejected,
            Decision::Refer { to } => {
                self.referred_to = Some(to.clone());
                TransactionStatus::Referred
            }
        };
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::document::DocumentId;

    use super::{ApprovalTransaction, Decision, DecisionError, TransactionId, TransactionStatus};

    fn transaction() -> ApprovalTransaction {
        let now = Utc::now();
        ApprovalTransaction {
            id: TransactionId("TXN-001".to_string()),
            document_id: DocumentId("BR-2026-0001".to_string()),
            process_title: "Budget Request Approval".to_string(),
            step_order: 1,
            step_description: "department review".to_string(),
            requested_by: "u-17".to_string(),
            assigned_to: "u-42".to_string(),
            referred_to: None,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn assigned_approver_can_approve() {
        let mut transaction = transaction();
        transaction.resolve(&Decision::Approve, "u-42", Utc::now()).expect("approve");
        assert_eq!(transaction.status, TransactionStatus::Approved);
    }

    #[test]
    fn unassigned_user_is_rejected() {
        let mut transaction = transaction();
        let error = transaction
            .resolve(&Decision::Approve, "u-99", Utc::now())
            .expect_err("unassigned actor must fail");
        assert_eq!(
            error,
            DecisionError::UnauthorizedActor {
                transaction_id: "TXN-001".to_string(),
                acting_user: "u-99".to_string(),
            }
        );
        assert_eq!(transaction.status, TransactionStatus::Pending);
    }

    #[test]
    fn second_decision_hits_the_idempotency_guard() {
        let mut transaction = transaction();
        transaction.resolve(&Decision::Reject, "u-42", Utc::now()).expect("first decision");
        let error = transaction
            .resolve(&Decision::Approve, "u-42", Utc::now())
            .expect_err("second decision must fail");
        assert_eq!(
            error,
            DecisionError::AlreadyResolved {
                transaction_id: "TXN-001".to_string(),
                status: "rejected",
            }
        );
    }

    #[test]
    fn referral_records_the_delegate() {
        let mut transaction = transaction();
        transaction
            .resolve(&Decision::Refer { to: "u-77".to_string() }, "u-42", Utc::now())
            .expect("refer");
        assert_eq!(transaction.status, TransactionStatus::Referred);
        assert_eq!(transaction.referred_to.as_deref(), Some("u-77"));
    }

    #[test]
    fn delegate_is_authorized_after_referral() {
        let mut transaction = transaction();
        transaction.referred_to = Some("u-77".to_string());
        assert!(transaction.authorizes("u-77"));
        assert!(transaction.authorizes("u-42"));
        assert!(!transaction.authorizes("u-17"));
    }

    #[test]
    fn status_round_trips_from_storage_encoding() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Approved,
            TransactionStatus::Rejected,
            TransactionStatus::Referred,
        ] {
            assert_eq!(TransactionStatus::parse(status.as_str()), Some(status));
        }
    }
}
