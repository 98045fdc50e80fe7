use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::document::DocumentKind;
use crate::domain::task::TaskUrgency;

/// Per-kind routing parameters: which process a document enters, whether the
/// budget-slot uniqueness check applies, and how its tasks are raised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowBinding {
    pub kind: DocumentKind,
    pub process_title: String,
    pub enforce_slot_uniqueness: bool,
    pub task_urgency: TaskUrgency,
    pub task_deadline_days: Option<i64>,
}

/// Table of bindings driving one parametric orchestrator instead of
/// per-document-type copies of the same submit/decide logic.
#[derive(Clone, Debug)]
pub struct WorkflowCatalog {
    bindings: HashMap<DocumentKind, WorkflowBinding>,
}

impl WorkflowCatalog {
    pub fn new(bindings: Vec<WorkflowBinding>) -> Self {
        let bindings = bindings.into_iter().map(|binding| (binding.kind, binding)).collect();
        Self { bindings }
    }

    pub fn binding_for(&self, kind: DocumentKind) -> Option<&WorkflowBinding> {
        self.bindings.get(&kind)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &WorkflowBinding> {
        self.bindings.values()
    }
}

impl Default for WorkflowCatalog {
    fn default() -> Self {
        Self::new(vec![
            WorkflowBinding {
                kind: DocumentKind::BudgetRequest,
                process_title: "Budget Request Approval".to_string(),
                enforce_slot_uniqueness: true,
                task_urgency: TaskUrgency::Normal,
                task_deadline_days: Some(3),
            },
            WorkflowBinding {
                kind: DocumentKind::PurchaseOrder,
                process_title: "Purchase Order Approval".to_string(),
                enforce_slot_uniqueness: false,
                task_urgency: TaskUrgency::Normal,
                task_deadline_days: Some(3),
            },
            WorkflowBinding {
                kind: DocumentKind::Rfq,
                process_title: "RFQ Approval".to_string(),
                enforce_slot_uniqueness: false,
                task_urgency: TaskUrgency::Low,
                task_deadline_days: Some(7),
            },
            WorkflowBinding {
                kind: DocumentKind::PaymentOrder,
                process_title: "Payment Order Approval".to_string(),
                enforce_slot_uniqueness: false,
                task_urgency: TaskUrgency::High,
                task_deadline_days: Some(1),
            },
        ])
    }
}
