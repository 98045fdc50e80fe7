use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NullAuditSink};
use crate::directory::{AssigneeDirectory, ProcessDirectory};
use crate::domain::document::{Document, DocumentId, DocumentStatus};
use crate::domain::process::{ProcessConfigError, ProcessDefinition, ProcessStep};
use crate::domain::task::{Task, TaskId};
use crate::domain::transaction::{
    ApprovalTransaction, Decision, TransactionId, TransactionStatus,
};
use crate::errors::WorkflowError;
use crate::workflow::catalog::{WorkflowBinding, WorkflowCatalog};
use crate::workflow::ports::{DocumentStore, TaskDispatcher, TransactionLedger};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub document: Document,
    pub transaction: ApprovalTransaction,
    pub task: Task,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecideOutcome {
    pub document: Document,
    pub transaction: ApprovalTransaction,
    pub next_transaction: Option<ApprovalTransaction>,
    pub next_task: Option<Task>,
}

/// Drives a document through its sequential approval chain: submission onto
/// the entry step, one pending transaction at a time, decisions advancing,
/// rejecting, or re-delegating until a terminal status.
///
/// Every operation performs all lookups before the first write. The write
/// sequence itself is not atomic; the compensations applied on a failed tail
/// write (remove the just-created transaction, revert the document) are
/// best-effort and reported through the audit sink.
pub struct WorkflowOrchestrator<D, L, T, P, A> {
    catalog: WorkflowCatalog,
    documents: D,
    ledger: L,
    tasks: T,
    processes: P,
    assignees: A,
    audit: Arc<dyn AuditSink>,
}

impl<D, L, T, P, A> WorkflowOrchestrator<D, L, T, P, A>
where
    D: DocumentStore,
    L: TransactionLedger,
    T: TaskDispatcher,
    P: ProcessDirectory,
    A: AssigneeDirectory,
{
    pub fn new(
        catalog: WorkflowCatalog,
        documents: D,
        ledger: L,
        tasks: T,
        processes: P,
        assignees: A,
    ) -> Self {
        Self {
            catalog,
            documents,
            ledger,
            tasks,
            processes,
            assignees,
            audit: Arc::new(NullAuditSink),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Routes a draft document onto the entry step of its bound process.
    /// Nothing is written until the process, entry step, and assignee have
    /// all resolved; a configuration failure leaves the document untouched.
    pub async fn submit(
        &self,
        mut document: Document,
        submitted_by: &str,
        correlation_id: &str,
    ) -> Result<SubmitOutcome, WorkflowError> {
        let outcome = self.submit_inner(&mut document, submitted_by, correlation_id).await;
        if let Err(error) = &outcome {
            self.audit.emit(
                AuditEvent::new(
                    Some(document.id.clone()),
                    correlation_id,
                    "workflow.submission_rejected",
                    AuditCategory::Submission,
                    submitted_by,
                    AuditOutcome::Rejected,
                )
                .with_metadata("error", error.to_string()),
            );
        }
        outcome
    }

    async fn submit_inner(
        &self,
        document: &mut Document,
        submitted_by: &str,
        correlation_id: &str,
    ) -> Result<SubmitOutcome, WorkflowError> {
        let binding = self
            .catalog
            .binding_for(document.kind)
            .ok_or(WorkflowError::UnroutedKind { kind: document.kind })?;

        if document.status != DocumentStatus::Draft {
            return Err(WorkflowError::NotSubmittable {
                document_id: document.id.0.clone(),
                status: document.status,
            });
        }

        document.requested_by = submitted_by.to_string();
        let missing = document.missing_required_fields();
        if !missing.is_empty() {
            return Err(WorkflowError::MissingFields { fields: missing });
        }

        if binding.enforce_slot_uniqueness {
            if let Some(conflicting) = self
                .documents
                .find_open_duplicate(document.kind, &document.hierarchy, Some(&document.id))
                .await?
            {
                return Err(WorkflowError::DuplicateRequest {
                    kind: document.kind,
                    slot: conflicting.hierarchy.describe(),
                    conflicting_document_id: conflicting.id.0,
                });
            }
        }

        if let Some(pending) = self.ledger.find_pending_for_document(&document.id).await? {
            return Err(WorkflowError::StepAlreadyActive {
                document_id: document.id.0.clone(),
                transaction_id: pending.id.0,
            });
        }

        let process = self.load_process(&binding.process_title).await?;
        let entry = process.entry_step().ok_or_else(|| WorkflowError::ProcessNotFound {
            title: binding.process_title.clone(),
        })?;
        let assignee = self.resolve_assignee(&process, entry, submitted_by).await?;

        // Lookups done; writes start here.
        let now = Utc::now();
        document.transition_to(DocumentStatus::Pending)?;
        document.updated_at = now;
        self.documents.save(document.clone()).await?;

        let transaction =
            new_transaction(document, &process.title, entry, submitted_by, &assignee);
        if let Err(error) = self.ledger.save(transaction.clone()).await {
            self.revert_to_draft(document, correlation_id).await;
            return Err(error.into());
        }

        let task = build_task(binding, document, &transaction);
        if let Err(error) = self.tasks.dispatch(task.clone()).await {
            self.remove_transaction(&transaction.id, &document.id, correlation_id).await;
            self.revert_to_draft(document, correlation_id).await;
            return Err(error.into());
        }

        self.audit.emit(
            AuditEvent::new(
                Some(document.id.clone()),
                correlation_id,
                "workflow.document_submitted",
                AuditCategory::Submission,
                submitted_by,
                AuditOutcome::Success,
            )
            .with_metadata("process", process.title.clone())
            .with_metadata("step_order", entry.order.to_string())
            .with_metadata("assigned_to", assignee.clone()),
        );

        Ok(SubmitOutcome { document: document.clone(), transaction, task })
    }

    /// Applies an approver's decision to a pending transaction, advancing the
    /// document to the next step, a terminal status, or a re-delegated copy
    /// of the same step.
    pub async fn decide(
        &self,
        transaction_id: &TransactionId,
        decision: Decision,
        acting_user: &str,
        correlation_id: &str,
    ) -> Result<DecideOutcome, WorkflowError> {
        let outcome =
            self.decide_inner(transaction_id, &decision, acting_user, correlation_id).await;
        if let Err(error) = &outcome {
            self.audit.emit(
                AuditEvent::new(
                    None,
                    correlation_id,
                    "workflow.decision_rejected",
                    AuditCategory::Decision,
                    acting_user,
                    AuditOutcome::Rejected,
                )
                .with_metadata("transaction_id", transaction_id.0.clone())
                .with_metadata("error", error.to_string()),
            );
        }
        outcome
    }

    async fn decide_inner(
        &self,
        transaction_id: &TransactionId,
        decision: &Decision,
        acting_user: &str,
        correlation_id: &str,
    ) -> Result<DecideOutcome, WorkflowError> {
        let current = self
            .ledger
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| WorkflowError::TransactionNotFound { id: transaction_id.0.clone() })?;
        let mut document = self
            .documents
            .find_by_id(&current.document_id)
            .await?
            .ok_or_else(|| WorkflowError::DocumentNotFound {
                id: current.document_id.0.clone(),
            })?;
        let binding = self
            .catalog
            .binding_for(document.kind)
            .ok_or(WorkflowError::UnroutedKind { kind: document.kind })?;

        let now = Utc::now();
        let mut resolved = current;
        resolved.resolve(decision, acting_user, now)?;

        if document.status.is_terminal_for_approval() {
            return Err(WorkflowError::DocumentAlreadyTerminal {
                document_id: document.id.0.clone(),
                status: document.status,
            });
        }

        // Resolve any follow-up step and its assignee before writing, so a
        // configuration gap aborts with the chain still pending.
        let follow_up = match decision {
            Decision::Approve => {
                let process = self.load_process(&resolved.process_title).await?;
                match process.step_after(resolved.step_order) {
                    Some(next) => {
                        let assignee =
                            self.resolve_assignee(&process, next, &resolved.requested_by).await?;
                        Some((next.clone(), assignee))
                    }
                    None => None,
                }
            }
            Decision::Reject => None,
            Decision::Refer { to } => {
                let process = self.load_process(&resolved.process_title).await?;
                let step = process.step_at(resolved.step_order).ok_or_else(|| {
                    WorkflowError::ProcessNotFound { title: resolved.process_title.clone() }
                })?;
                Some((step.clone(), to.clone()))
            }
        };

        self.ledger.save(resolved.clone()).await?;
        self.audit.emit(
            AuditEvent::new(
                Some(document.id.clone()),
                correlation_id,
                "workflow.decision_applied",
                AuditCategory::Decision,
                acting_user,
                AuditOutcome::Success,
            )
            .with_metadata("transaction_id", resolved.id.0.clone())
            .with_metadata("status", resolved.status.as_str().to_string())
            .with_metadata("step_order", resolved.step_order.to_string()),
        );

        let (next_transaction, next_task) = match follow_up {
            Some((step, assignee)) => {
                let transaction = new_transaction(
                    &document,
                    &resolved.process_title,
                    &step,
                    &resolved.requested_by,
                    &assignee,
                );
                self.ledger.save(transaction.clone()).await?;

                let task = build_task(binding, &document, &transaction);
                if let Err(error) = self.tasks.dispatch(task.clone()).await {
                    self.remove_transaction(&transaction.id, &document.id, correlation_id).await;
                    return Err(error.into());
                }

                document.updated_at = now;
                self.documents.save(document.clone()).await?;
                (Some(transaction), Some(task))
            }
            None => {
                let terminal = match resolved.status {
                    TransactionStatus::Approved => DocumentStatus::Approved,
                    _ => DocumentStatus::Rejected,
                };
                document.transition_to(terminal)?;
                document.updated_at = now;
                self.documents.save(document.clone()).await?;
                self.audit.emit(
                    AuditEvent::new(
                        Some(document.id.clone()),
                        correlation_id,
                        "workflow.document_closed",
                        AuditCategory::Decision,
                        acting_user,
                        AuditOutcome::Success,
                    )
                    .with_metadata("status", terminal.as_str().to_string()),
                );
                (None, None)
            }
        };

        Ok(DecideOutcome { document, transaction: resolved, next_transaction, next_task })
    }

    /// Reconstructs the approval history for a document, ordered ascending by
    /// step order. Reads fresh on every call.
    pub async fn history(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<ApprovalTransaction>, WorkflowError> {
        self.documents
            .find_by_id(document_id)
            .await?
            .ok_or_else(|| WorkflowError::DocumentNotFound { id: document_id.0.clone() })?;
        Ok(self.ledger.list_for_document(document_id).await?)
    }

    async fn load_process(&self, title: &str) -> Result<ProcessDefinition, WorkflowError> {
        let process = self
            .processes
            .find_by_title(title)
            .await?
            .ok_or_else(|| WorkflowError::ProcessNotFound { title: title.to_string() })?;

        match ProcessDefinition::validated(process.title, process.steps) {
            Ok(process) => Ok(process),
            Err(ProcessConfigError::EmptyProcess { title }) => {
                Err(WorkflowError::ProcessNotFound { title })
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn resolve_assignee(
        &self,
        process: &ProcessDefinition,
        step: &ProcessStep,
        initiating_user: &str,
    ) -> Result<String, WorkflowError> {
        self.assignees
            .resolve(&process.title, step, initiating_user)
            .await?
            .ok_or_else(|| WorkflowError::AssigneeNotFound {
                process_title: process.title.clone(),
                step_order: step.order,
                initiating_user: initiating_user.to_string(),
            })
    }

    async fn revert_to_draft(&self, document: &Document, correlation_id: &str) {
        let mut reverted = document.clone();
        reverted.status = DocumentStatus::Draft;
        reverted.updated_at = Utc::now();
        let outcome = match self.documents.save(reverted).await {
            Ok(()) => AuditOutcome::Success,
            Err(_) => AuditOutcome::Failed,
        };
        self.audit.emit(
            AuditEvent::new(
                Some(document.id.clone()),
                correlation_id,
                "workflow.document_reverted",
                AuditCategory::Compensation,
                "orchestrator",
                outcome,
            )
            .with_metadata("status", DocumentStatus::Draft.as_str().to_string()),
        );
    }

    async fn remove_transaction(
        &self,
        transaction_id: &TransactionId,
        document_id: &DocumentId,
        correlation_id: &str,
    ) {
        let outcome = match self.ledger.remove(transaction_id).await {
            Ok(()) => AuditOutcome::Success,
            Err(_) => AuditOutcome::Failed,
        };
        self.audit.emit(
            AuditEvent::new(
                Some(document_id.clone()),
                correlation_id,
                "workflow.transaction_removed",
                AuditCategory::Compensation,
                "orchestrator",
                outcome,
            )
            .with_metadata("transaction_id", transaction_id.0.clone()),
        );
    }
}

fn new_transaction(
    document: &Document,
    process_title: &str,
    step: &ProcessStep,
    requested_by: &str,
    assigned_to: &str,
) -> ApprovalTransaction {
    let now = Utc::now();
    ApprovalTransaction {
        id: TransactionId(Uuid::new_v4().to_string()),
        document_id: document.id.clone(),
        process_title: process_title.to_string(),
        step_order: step.order,
        step_description: step.description.clone(),
        requested_by: requested_by.to_string(),
        assigned_to: assigned_to.to_string(),
        referred_to: None,
        status: TransactionStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

fn build_task(
    binding: &WorkflowBinding,
    document: &Document,
    transaction: &ApprovalTransaction,
) -> Task {
    let assigned_at = transaction.created_at;
    Task {
        id: TaskId(Uuid::new_v4().to_string()),
        transaction_id: transaction.id.clone(),
        document_id: document.id.clone(),
        document_kind: document.kind,
        process_title: transaction.process_title.clone(),
        step_order: transaction.step_order,
        assigned_from: transaction.requested_by.clone(),
        assigned_to: transaction.assigned_to.clone(),
        urgency: binding.task_urgency,
        assigned_at,
        deadline: binding.task_deadline_days.map(|days| assigned_at + Duration::days(days)),
        read: false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::audit::InMemoryAuditSink;
    use crate::directory::{InMemoryAssigneeDirectory, InMemoryProcessDirectory};
    use crate::domain::document::{
        Document, DocumentId, DocumentKind, DocumentStatus, HierarchyKey,
    };
    use crate::domain::process::{ProcessDefinition, ProcessStep};
    use crate::domain::transaction::{Decision, DecisionError, TransactionStatus};
    use crate::errors::WorkflowError;
    use crate::workflow::catalog::WorkflowCatalog;
    use crate::workflow::memory::{
        InMemoryDocumentStore, InMemoryTaskBoard, InMemoryTransactionLedger,
    };
    use crate::workflow::ports::{DocumentStore, TransactionLedger};

    use super::WorkflowOrchestrator;

    type TestOrchestrator = WorkflowOrchestrator<
        Arc<InMemoryDocumentStore>,
        Arc<InMemoryTransactionLedger>,
        Arc<InMemoryTaskBoard>,
        InMemoryProcessDirectory,
        InMemoryAssigneeDirectory,
    >;

    struct Harness {
        orchestrator: TestOrchestrator,
        documents: Arc<InMemoryDocumentStore>,
        ledger: Arc<InMemoryTransactionLedger>,
        tasks: Arc<InMemoryTaskBoard>,
        audit: InMemoryAuditSink,
    }

    fn step(order: i32, description: &str) -> ProcessStep {
        ProcessStep {
            order,
            description: description.to_string(),
            approver_role: "department_head".to_string(),
        }
    }

    fn harness(steps: Vec<ProcessStep>, assignees: InMemoryAssigneeDirectory) -> Harness {
        let processes = InMemoryProcessDirectory::new(vec![ProcessDefinition::validated(
            "Budget Request Approval",
            steps,
        )
        .expect("valid process")]);
        harness_with_processes(processes, assignees)
    }

    fn harness_with_processes(
        processes: InMemoryProcessDirectory,
        assignees: InMemoryAssigneeDirectory,
    ) -> Harness {
        let documents = Arc::new(InMemoryDocumentStore::default());
        let ledger = Arc::new(InMemoryTransactionLedger::default());
        let tasks = Arc::new(InMemoryTaskBoard::default());
        let audit = InMemoryAuditSink::default();
        let orchestrator = WorkflowOrchestrator::new(
            WorkflowCatalog::default(),
            documents.clone(),
            ledger.clone(),
            tasks.clone(),
            processes,
            assignees,
        )
        .with_audit(Arc::new(audit.clone()));
        Harness { orchestrator, documents, ledger, tasks, audit }
    }

    fn draft(id: &str) -> Document {
        let now = Utc::now();
        Document {
            id: DocumentId(id.to_string()),
            kind: DocumentKind::BudgetRequest,
            status: DocumentStatus::Draft,
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

    fn single_step_harness() -> Harness {
        harness(
            vec![step(1, "department review")],
            InMemoryAssigneeDirectory::default().with_default("Budget Request Approval", 1, "u-42"),
        )
    }

    fn two_step_harness() -> Harness {
        harness(
            vec![step(1, "department review"), step(2, "finance review")],
            InMemoryAssigneeDirectory::default()
                .with_default("Budget Request Approval", 1, "u-42")
                .with_default("Budget Request Approval", 2, "u-88"),
        )
    }

    #[tokio::test]
    async fn submit_opens_the_entry_step_with_task() {
        let harness = single_step_harness();

        let outcome = harness
            .orchestrator
            .submit(draft("BR-1"), "u-17", "req-1")
            .await
            .expect("submit should succeed");

        assert_eq!(outcome.document.status, DocumentStatus::Pending);
        assert_eq!(outcome.transaction.status, TransactionStatus::Pending);
        assert_eq!(outcome.transaction.assigned_to, "u-42");
        assert_eq!(outcome.transaction.step_order, 1);
        assert_eq!(outcome.task.assigned_to, "u-42");
        assert_eq!(outcome.task.assigned_from, "u-17");

        let tasks = harness.tasks.tasks_for_assignee("u-42").await;
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn approving_the_only_step_closes_the_document() {
        let harness = single_step_harness();
        let submitted =
            harness.orchestrator.submit(draft("BR-1"), "u-17", "req-1").await.expect("submit");

        let outcome = harness
            .orchestrator
            .decide(&submitted.transaction.id, Decision::Approve, "u-42", "req-2")
            .await
            .expect("decide should succeed");

        assert_eq!(outcome.transaction.status, TransactionStatus::Approved);
        assert_eq!(outcome.document.status, DocumentStatus::Approved);
        assert!(outcome.next_transaction.is_none());
        assert!(outcome.next_task.is_none());

        let history = harness.orchestrator.history(&outcome.document.id).await.expect("history");
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn approving_an_intermediate_step_opens_the_next_one() {
        let harness = two_step_harness();
        let submitted =
            harness.orchestrator.submit(draft("BR-1"), "u-17", "req-1").await.expect("submit");

        let outcome = harness
            .orchestrator
            .decide(&submitted.transaction.id, Decision::Approve, "u-42", "req-2")
            .await
            .expect("decide should succeed");

        assert_eq!(outcome.document.status, DocumentStatus::Pending);
        let next = outcome.next_transaction.expect("next step transaction");
        assert_eq!(next.step_order, 2);
        assert_eq!(next.assigned_to, "u-88");
        assert_eq!(next.requested_by, "u-17", "original requester carries through the chain");
        assert_eq!(outcome.next_task.map(|task| task.assigned_to), Some("u-88".to_string()));
    }

    #[tokio::test]
    async fn rejection_is_terminal_and_skips_remaining_steps() {
        let harness = two_step_harness();
        let submitted =
            harness.orchestrator.submit(draft("BR-1"), "u-17", "req-1").await.expect("submit");

        let outcome = harness
            .orchestrator
            .decide(&submitted.transaction.id, Decision::Reject, "u-42", "req-2")
            .await
            .expect("decide should succeed");

        assert_eq!(outcome.transaction.status, TransactionStatus::Rejected);
        assert_eq!(outcome.document.status, DocumentStatus::Rejected);
        assert!(outcome.next_transaction.is_none());

        let history = harness.orchestrator.history(&outcome.document.id).await.expect("history");
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn second_decision_on_a_resolved_transaction_is_rejected() {
        let harness = single_step_harness();
        let submitted =
            harness.orchestrator.submit(draft("BR-1"), "u-17", "req-1").await.expect("submit");
        harness
            .orchestrator
            .decide(&submitted.transaction.id, Decision::Approve, "u-42", "req-2")
            .await
            .expect("first decision");

        let error = harness
            .orchestrator
            .decide(&submitted.transaction.id, Decision::Approve, "u-42", "req-3")
            .await
            .expect_err("second decision must fail");

        assert!(matches!(
            error,
            WorkflowError::Decision(DecisionError::AlreadyResolved { .. })
        ));
        let history = harness.orchestrator.history(&submitted.document.id).await.expect("history");
        assert_eq!(history.len(), 1, "no duplicate next-step transaction");
    }

    #[tokio::test]
    async fn duplicate_open_slot_blocks_submission() {
        let harness = single_step_harness();
        harness.orchestrator.submit(draft("BR-1"), "u-17", "req-1").await.expect("first submit");

        let error = harness
            .orchestrator
            .submit(draft("BR-2"), "u-17", "req-2")
            .await
            .expect_err("duplicate slot must be rejected");

        match &error {
            WorkflowError::DuplicateRequest { slot, conflicting_document_id, .. } => {
                assert!(slot.contains("fiscal period 5"));
                assert!(slot.contains("department 2"));
                assert_eq!(conflicting_document_id, "BR-1");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let second = harness.documents.find_by_id(&DocumentId("BR-2".to_string())).await;
        assert_eq!(second.expect("store read"), None, "rejected submission writes nothing");
    }

    #[tokio::test]
    async fn editing_an_existing_draft_does_not_collide_with_itself() {
        let harness = single_step_harness();
        let document = draft("BR-1");
        harness.documents.save(document.clone()).await.expect("preload draft");

        harness
            .orchestrator
            .submit(document, "u-17", "req-1")
            .await
            .expect("resubmitting the same record must not trip the duplicate check");
    }

    #[tokio::test]
    async fn resolved_orders_increase_across_a_full_chain() {
        let harness = two_step_harness();
        let submitted =
            harness.orchestrator.submit(draft("BR-1"), "u-17", "req-1").await.expect("submit");
        let first = harness
            .orchestrator
            .decide(&submitted.transaction.id, Decision::Approve, "u-42", "req-2")
            .await
            .expect("first decision");
        let second_id = first.next_transaction.expect("second step").id;
        harness
            .orchestrator
            .decide(&second_id, Decision::Approve, "u-88", "req-3")
            .await
            .expect("second decision");

        let history = harness.orchestrator.history(&submitted.document.id).await.expect("history");
        let orders: Vec<i32> = history
            .iter()
            .filter(|transaction| transaction.status != TransactionStatus::Pending)
            .map(|transaction| transaction.step_order)
            .collect();
        assert_eq!(orders, vec![1, 2]);

        let pending = harness
            .ledger
            .find_pending_for_document(&submitted.document.id)
            .await
            .expect("ledger read");
        assert!(pending.is_none(), "no step stays active after the chain closes");
    }

    #[tokio::test]
    async fn referral_re_delegates_the_same_step() {
        let harness = single_step_harness();
        let submitted =
            harness.orchestrator.submit(draft("BR-1"), "u-17", "req-1").await.expect("submit");

        let outcome = harness
            .orchestrator
            .decide(
                &submitted.transaction.id,
                Decision::Refer { to: "u-77".to_string() },
                "u-42",
                "req-2",
            )
            .await
            .expect("refer should succeed");

        assert_eq!(outcome.transaction.status, TransactionStatus::Referred);
        assert_eq!(outcome.document.status, DocumentStatus::Pending);
        let delegated = outcome.next_transaction.expect("delegated transaction");
        assert_eq!(delegated.step_order, 1, "referral does not advance the chain");
        assert_eq!(delegated.assigned_to, "u-77");

        let closed = harness
            .orchestrator
            .decide(&delegated.id, Decision::Approve, "u-77", "req-3")
            .await
            .expect("delegate approves");
        assert_eq!(closed.document.status, DocumentStatus::Approved);
    }

    #[tokio::test]
    async fn unknown_process_aborts_before_any_write() {
        let harness = harness_with_processes(
            InMemoryProcessDirectory::default(),
            InMemoryAssigneeDirectory::default(),
        );

        let error = harness
            .orchestrator
            .submit(draft("BR-1"), "u-17", "req-1")
            .await
            .expect_err("missing process must abort");

        assert!(matches!(error, WorkflowError::ProcessNotFound { .. }));
        let stored = harness.documents.find_by_id(&DocumentId("BR-1".to_string())).await;
        assert_eq!(stored.expect("store read"), None);
        assert!(harness.tasks.tasks().await.is_empty());
    }

    #[tokio::test]
    async fn missing_assignee_mapping_aborts_before_any_write() {
        let harness = harness(vec![step(1, "department review")], InMemoryAssigneeDirectory::default());

        let error = harness
            .orchestrator
            .submit(draft("BR-1"), "u-17", "req-1")
            .await
            .expect_err("missing assignee must abort");

        match &error {
            WorkflowError::AssigneeNotFound { process_title, step_order, initiating_user } => {
                assert_eq!(process_title, "Budget Request Approval");
                assert_eq!(*step_order, 1);
                assert_eq!(initiating_user, "u-17");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let stored = harness.documents.find_by_id(&DocumentId("BR-1".to_string())).await;
        assert_eq!(stored.expect("store read"), None);
    }

    #[tokio::test]
    async fn failed_task_dispatch_compensates_transaction_and_document() {
        let harness = single_step_harness();
        harness.tasks.fail_next_dispatch();

        let error = harness
            .orchestrator
            .submit(draft("BR-1"), "u-17", "req-1")
            .await
            .expect_err("dispatch failure must surface");
        assert!(matches!(error, WorkflowError::Store(_)));

        let document_id = DocumentId("BR-1".to_string());
        let stored = harness
            .documents
            .find_by_id(&document_id)
            .await
            .expect("store read")
            .expect("document survives compensation");
        assert_eq!(stored.status, DocumentStatus::Draft, "document reverted to draft");

        let pending = harness.ledger.find_pending_for_document(&document_id).await.expect("read");
        assert!(pending.is_none(), "orphan transaction removed");

        let compensations: Vec<String> = harness
            .audit
            .events()
            .into_iter()
            .filter(|event| {
                matches!(event.category, crate::audit::AuditCategory::Compensation)
            })
            .map(|event| event.event_type)
            .collect();
        assert_eq!(
            compensations,
            vec!["workflow.transaction_removed".to_string(), "workflow.document_reverted".to_string()]
        );
    }

    #[tokio::test]
    async fn actor_outside_the_assignment_cannot_decide() {
        let harness = single_step_harness();
        let submitted =
            harness.orchestrator.submit(draft("BR-1"), "u-17", "req-1").await.expect("submit");

        let error = harness
            .orchestrator
            .decide(&submitted.transaction.id, Decision::Approve, "u-99", "req-2")
            .await
            .expect_err("unassigned actor must be rejected");

        assert!(matches!(
            error,
            WorkflowError::Decision(DecisionError::UnauthorizedActor { .. })
        ));
        let pending = harness
            .ledger
            .find_pending_for_document(&submitted.document.id)
            .await
            .expect("ledger read")
            .expect("step still pending");
        assert_eq!(pending.status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn incomplete_documents_are_rejected_before_any_write() {
        let harness = single_step_harness();
        let mut document = draft("BR-1");
        document.justification = String::new();
        document.amount = Decimal::ZERO;

        let error = harness
            .orchestrator
            .submit(document, "u-17", "req-1")
            .await
            .expect_err("incomplete document must be rejected");

        match &error {
            WorkflowError::MissingFields { fields } => {
                assert_eq!(fields, &vec!["justification".to_string(), "amount".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let stored = harness.documents.find_by_id(&DocumentId("BR-1".to_string())).await;
        assert_eq!(stored.expect("store read"), None);
    }

    #[tokio::test]
    async fn pending_documents_cannot_be_submitted_again() {
        let harness = single_step_harness();
        let submitted =
            harness.orchestrator.submit(draft("BR-1"), "u-17", "req-1").await.expect("submit");

        let error = harness
            .orchestrator
            .submit(submitted.document, "u-17", "req-2")
            .await
            .expect_err("pending document must not re-enter the chain");

        assert!(matches!(error, WorkflowError::NotSubmittable { .. }));
    }

    #[tokio::test]
    async fn a_document_with_an_active_step_cannot_open_another() {
        use crate::domain::transaction::{ApprovalTransaction, TransactionId};

        let harness = single_step_harness();
        let document = draft("BR-1");
        harness.documents.save(document.clone()).await.expect("preload draft");

        let now = Utc::now();
        harness
            .ledger
            .save(ApprovalTransaction {
                id: TransactionId("TXN-stray".to_string()),
                document_id: document.id.clone(),
                process_title: "Budget Request Approval".to_string(),
                step_order: 1,
                step_description: "department review".to_string(),
                requested_by: "u-17".to_string(),
                assigned_to: "u-42".to_string(),
                referred_to: None,
                status: TransactionStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("preload stray pending transaction");

        let error = harness
            .orchestrator
            .submit(document, "u-17", "req-1")
            .await
            .expect_err("second active step must be refused");

        match &error {
            WorkflowError::StepAlreadyActive { transaction_id, .. } => {
                assert_eq!(transaction_id, "TXN-stray");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn terminal_documents_accept_no_further_decisions() {
        use crate::domain::transaction::{ApprovalTransaction, TransactionId};

        let harness = single_step_harness();
        let mut document = draft("BR-1");
        document.status = DocumentStatus::Approved;
        harness.documents.save(document.clone()).await.expect("preload approved document");

        let now = Utc::now();
        let stray = ApprovalTransaction {
            id: TransactionId("TXN-stray".to_string()),
            document_id: document.id.clone(),
            process_title: "Budget Request Approval".to_string(),
            step_order: 1,
            step_description: "department review".to_string(),
            requested_by: "u-17".to_string(),
            assigned_to: "u-42".to_string(),
            referred_to: None,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        harness.ledger.save(stray.clone()).await.expect("preload stray pending transaction");

        let error = harness
            .orchestrator
            .decide(&stray.id, Decision::Approve, "u-42", "req-1")
            .await
            .expect_err("terminal document must not progress");

        assert!(matches!(error, WorkflowError::DocumentAlreadyTerminal { .. }));
        let history = harness.ledger.list_for_document(&document.id).await.expect("ledger read");
        assert_eq!(history.len(), 1, "no new transaction appears for a closed document");
    }

    #[tokio::test]
    async fn submission_audit_trail_names_process_and_assignee() {
        let harness = single_step_harness();
        harness.orchestrator.submit(draft("BR-1"), "u-17", "req-1").await.expect("submit");

        let events = harness.audit.events();
        let submitted = events
            .iter()
            .find(|event| event.event_type == "workflow.document_submitted")
            .expect("submission event");
        assert_eq!(submitted.correlation_id, "req-1");
        assert_eq!(submitted.metadata.get("process").map(String::as_str), Some("Budget Request Approval"));
        assert_eq!(submitted.metadata.get("assigned_to").map(String::as_str), Some("u-42"));
    }
}
