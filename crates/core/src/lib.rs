pub mod audit;
pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod workflow;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
pub use directory::{
    AssigneeDirectory, InMemoryAssigneeDirectory, InMemoryProcessDirectory, ProcessDirectory,
};
pub use domain::document::{Document, DocumentId, DocumentKind, DocumentStatus, HierarchyKey};
pub use domain::process::{ProcessConfigError, ProcessDefinition, ProcessStep};
pub use domain::task::{Task, TaskId, TaskUrgency};
pub use domain::transaction::{
    ApprovalTransaction, Decision, DecisionError, TransactionId, TransactionStatus,
};
pub use errors::{DomainError, ErrorClass, StoreError, WorkflowError};
pub use workflow::{
    DecideOutcome, DocumentStore, SubmitOutcome, TaskDispatcher, TransactionLedger,
    WorkflowBinding, WorkflowCatalog, WorkflowOrchestrator,
};
