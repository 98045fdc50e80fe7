use thiserror::Error;

use crate::domain::document::{DocumentKind, DocumentStatus};
use crate::domain::process::ProcessConfigError;
use crate::domain::transaction::DecisionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid document transition from {from:?} to {to:?}")]
    InvalidDocumentTransition { from: DocumentStatus, to: DocumentStatus },
}

/// Failure reported by a storage collaborator. Backends map their native
/// errors into these variants; core never sees driver types.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("storage decode failure: {0}")]
    Decode(String),
}

/// How an error should be presented: blocking configuration message,
/// field-level validation, access denial, and so on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Validation,
    Authorization,
    Idempotency,
    Conflict,
    NotFound,
    Storage,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("no approval process is named `{title}`")]
    ProcessNotFound { title: String },
    #[error(
        "no approver is configured for step {step_order} of `{process_title}` when submitted by `{initiating_user}`"
    )]
    AssigneeNotFound { process_title: String, step_order: i32, initiating_user: String },
    #[error("document kind `{}` is not bound to an approval process", .kind.as_str())]
    UnroutedKind { kind: DocumentKind },
    #[error(transparent)]
    InvalidProcess(#[from] ProcessConfigError),
    #[error(
        "an open {} already exists for {slot} (document `{conflicting_document_id}`)",
        .kind.as_str()
    )]
    DuplicateRequest { kind: DocumentKind, slot: String, conflicting_document_id: String },
    #[error("required fields are missing: {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },
    #[error("document `{document_id}` cannot be submitted while {}", .status.as_str())]
    NotSubmittable { document_id: String, status: DocumentStatus },
    #[error("document `{document_id}` already has pending transaction `{transaction_id}`")]
    StepAlreadyActive { document_id: String, transaction_id: String },
    #[error("document `{document_id}` already reached terminal status {}", .status.as_str())]
    DocumentAlreadyTerminal { document_id: String, status: DocumentStatus },
    #[error("no document found with id `{id}`")]
    DocumentNotFound { id: String },
    #[error("no approval transaction found with id `{id}`")]
    TransactionNotFound { id: String },
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ProcessNotFound { .. }
            | Self::AssigneeNotFound { .. }
            | Self::UnroutedKind { .. }
            | Self::InvalidProcess(_) => ErrorClass::Configuration,
            Self::MissingFields { .. } | Self::NotSubmittable { .. } | Self::Domain(_) => {
                ErrorClass::Validation
            }
            Self::DuplicateRequest { .. } | Self::StepAlreadyActive { .. } => ErrorClass::Conflict,
            Self::DocumentAlreadyTerminal { .. } => ErrorClass::Idempotency,
            Self::DocumentNotFound { .. } | Self::TransactionNotFound { .. } => {
                ErrorClass::NotFound
            }
            Self::Decision(DecisionError::AlreadyResolved { .. }) => ErrorClass::Idempotency,
            Self::Decision(DecisionError::UnauthorizedActor { .. }) => ErrorClass::Authorization,
            Self::Store(_) => ErrorClass::Storage,
        }
    }

    /// Banner text safe to show end users; detail stays in the error itself.
    pub fn user_message(&self) -> &'static str {
        match self.class() {
            ErrorClass::Configuration => {
                "The approval process is not configured for this request. Contact an administrator."
            }
            ErrorClass::Validation => {
                "The request could not be processed. Check the highlighted fields and try again."
            }
            ErrorClass::Authorization => "You are not allowed to act on this approval step.",
            ErrorClass::Idempotency => "This item has already been processed.",
            ErrorClass::Conflict => "A conflicting open request already exists.",
            ErrorClass::NotFound => "The requested record could not be found.",
            ErrorClass::Storage => "The service is temporarily unavailable. Please retry shortly.",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::document::{DocumentKind, DocumentStatus};
    use crate::domain::transaction::DecisionError;

    use super::{ErrorClass, StoreError, WorkflowError};

    #[test]
    fn configuration_failures_are_blocking() {
        let error = WorkflowError::ProcessNotFound { title: "Budget Request Approval".to_string() };
        assert_eq!(error.class(), ErrorClass::Configuration);
        assert!(error.user_message().contains("administrator"));
    }

    #[test]
    fn already_resolved_is_informational_not_fatal() {
        let error = WorkflowError::from(DecisionError::AlreadyResolved {
            transaction_id: "TXN-001".to_string(),
            status: "approved",
        });
        assert_eq!(error.class(), ErrorClass::Idempotency);
    }

    #[test]
    fn unauthorized_actor_maps_to_access_denied() {
        let error = WorkflowError::from(DecisionError::UnauthorizedActor {
            transaction_id: "TXN-001".to_string(),
            acting_user: "u-99".to_string(),
        });
        assert_eq!(error.class(), ErrorClass::Authorization);
        assert_eq!(error.user_message(), "You are not allowed to act on this approval step.");
    }

    #[test]
    fn duplicate_request_names_the_conflicting_slot() {
        let error = WorkflowError::DuplicateRequest {
            kind: DocumentKind::BudgetRequest,
            slot: "fiscal period 5, department 2, cost center 9".to_string(),
            conflicting_document_id: "BR-2026-0001".to_string(),
        };
        assert_eq!(error.class(), ErrorClass::Conflict);
        let message = error.to_string();
        assert!(message.contains("fiscal period 5"));
        assert!(message.contains("BR-2026-0001"));
    }

    #[test]
    fn storage_failures_ask_for_a_retry() {
        let error = WorkflowError::from(StoreError::Backend("database lock timeout".to_string()));
        assert_eq!(error.class(), ErrorClass::Storage);
        assert_eq!(
            error.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn terminal_documents_report_idempotent_completion() {
        let error = WorkflowError::DocumentAlreadyTerminal {
            document_id: "BR-2026-0001".to_string(),
            status: DocumentStatus::Approved,
        };
        assert_eq!(error.class(), ErrorClass::Idempotency);
    }
}
