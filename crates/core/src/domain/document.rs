use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    BudgetRequest,
    PurchaseOrder,
    Rfq,
    PaymentOrder,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BudgetRequest => "budget_request",
            Self::PurchaseOrder => "purchase_order",
            Self::Rfq => "rfq",
            Self::PaymentOrder => "payment_order",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "budget_request" => Some(Self::BudgetRequest),
            "purchase_order" => Some(Self::PurchaseOrder),
            "rfq" => Some(Self::Rfq),
            "payment_order" => Some(Self::PaymentOrder),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    PartiallyPaid,
    Overdue,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::PartiallyPaid => "partially_paid",
            Self::Overdue => "overdue",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "partially_paid" => Some(Self::PartiallyPaid),
            "overdue" => Some(Self::Overdue),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Rejected and Cancelled end the approval lifecycle outright; Approved is
    /// terminal for approval purposes even though payment statuses may follow.
    pub fn is_terminal_for_approval(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::Cancelled | Self::PartiallyPaid | Self::Overdue
        )
    }
}

/// Composite key used to block duplicate open requests for the same budget
/// slot. `sub_cost_center` may be empty when the cost center has no split.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HierarchyKey {
    pub fiscal_period_id: i64,
    pub department_id: i64,
    pub cost_center_id: i64,
    pub sub_cost_center: String,
}

impl HierarchyKey {
    pub fn describe(&self) -> String {
        if self.sub_cost_center.is_empty() {
            format!(
                "fiscal period {}, department {}, cost center {}",
                self.fiscal_period_id, self.department_id, self.cost_center_id
            )
        } else {
            format!(
                "fiscal period {}, department {}, cost center {}/{}",
                self.fiscal_period_id,
                self.department_id,
                self.cost_center_id,
                self.sub_cost_center
            )
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub hierarchy: HierarchyKey,
    pub supplier_id: Option<i64>,
    pub amount: Decimal,
    pub currency: String,
    pub justification: String,
    pub attachment_path: Option<String>,
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (&self.status, next),
            (DocumentStatus::Draft, DocumentStatus::Pending)
                | (DocumentStatus::Pending, DocumentStatus::Approved)
                | (DocumentStatus::Pending, DocumentStatus::Rejected)
                | (DocumentStatus::Pending, DocumentStatus::Draft)
                | (DocumentStatus::Approved, DocumentStatus::PartiallyPaid)
                | (DocumentStatus::Approved, DocumentStatus::Overdue)
                | (DocumentStatus::PartiallyPaid, DocumentStatus::Overdue)
                | (DocumentStatus::Draft, DocumentStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: DocumentStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidDocumentTransition { from: self.status, to: next })
    }

    /// Field checks performed before a document enters its workflow. Amounts
    /// are otherwise passed through unrounded.
    pub fn missing_required_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.justification.trim().is_empty() {
            missing.push("justification".to_string());
        }
        if self.currency.trim().is_empty() {
            missing.push("currency".to_string());
        }
        if self.requested_by.trim().is_empty() {
            missing.push("requested_by".to_string());
        }
        if self.amount <= Decimal::ZERO {
            missing.push("amount".to_string());
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{Document, DocumentId, DocumentKind, DocumentStatus, HierarchyKey};

    fn document(status: DocumentStatus) -> Document {
        let now = Utc::now();
        Document {
            id: DocumentId("BR-2026-0001".to_string()),
            kind: DocumentKind::BudgetRequest,
            status,
            hierarchy: HierarchyKey {
                fiscal_period_id: 5,
                department_id: 2,
                cost_center_id: 9,
                sub_cost_center: String::new(),
            },
            supplier_id: None,
            amount: Decimal::new(125_000, 2),
            currency: "USD".to_string(),
            justification: "Replacement lab equipment".to_string(),
            attachment_path: None,
            requested_by: "u-17".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn allows_submission_transition() {
        let mut document = document(DocumentStatus::Draft);
        document.transition_to(DocumentStatus::Pending).expect("draft -> pending");
        assert_eq!(document.status, DocumentStatus::Pending);
    }

    #[test]
    fn blocks_skipping_the_approval_chain() {
        let mut document = document(DocumentStatus::Draft);
        let error = document
            .transition_to(DocumentStatus::Approved)
            .expect_err("draft -> approved must fail");
        assert!(matches!(
            error,
            crate::errors::DomainError::InvalidDocumentTransition { .. }
        ));
    }

    #[test]
    fn pending_documents_can_be_reverted_to_draft() {
        let mut document = document(DocumentStatus::Pending);
        document.transition_to(DocumentStatus::Draft).expect("pending -> draft");
        assert_eq!(document.status, DocumentStatus::Draft);
    }

    #[test]
    fn approved_payment_orders_track_payment_statuses() {
        let mut document = document(DocumentStatus::Approved);
        document.transition_to(DocumentStatus::PartiallyPaid).expect("approved -> partially paid");
        document.transition_to(DocumentStatus::Overdue).expect("partially paid -> overdue");
        assert!(document.status.is_terminal_for_approval());
    }

    #[test]
    fn required_field_check_reports_each_gap() {
        let mut document = document(DocumentStatus::Draft);
        document.justification = "  ".to_string();
        document.amount = Decimal::ZERO;

        let missing = document.missing_required_fields();
        assert_eq!(missing, vec!["justification".to_string(), "amount".to_string()]);
    }

    #[test]
    fn kind_and_status_round_trip_from_storage_encoding() {
        for kind in [
            DocumentKind::BudgetRequest,
            DocumentKind::PurchaseOrder,
            DocumentKind::Rfq,
            DocumentKind::PaymentOrder,
        ] {
            assert_eq!(DocumentKind::parse(kind.as_str()), Some(kind));
        }
        for status in [
            DocumentStatus::Draft,
            DocumentStatus::Pending,
            DocumentStatus::Approved,
            DocumentStatus::Rejected,
            DocumentStatus::PartiallyPaid,
            DocumentStatus::Overdue,
            DocumentStatus::Cancelled,
        ] {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn hierarchy_description_names_the_budget_slot() {
        let document = document(DocumentStatus::Draft);
        assert_eq!(document.hierarchy.describe(), "fiscal period 5, department 2, cost center 9");

        let mut split = document.hierarchy.clone();
        split.sub_cost_center = "ops".to_string();
        assert_eq!(split.describe(), "fiscal period 5, department 2, cost center 9/ops");
    }
}
