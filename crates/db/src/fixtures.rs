use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use signoff_core::workflow::ports::DocumentStore;
use signoff_core::{
    Document, DocumentId, DocumentKind, DocumentStatus, HierarchyKey, ProcessDefinition,
    ProcessStep, StoreError,
};

use crate::repositories::{backend, SqlAssigneeDirectory, SqlDocumentStore, SqlProcessDirectory};
use crate::DbPool;

/// Canonical demo dataset: one process per document kind, a step assignee
/// matrix, and a draft budget request ready to submit. Deterministic so
/// walkthroughs and smoke checks always start from the same state.
struct SeedProcess {
    title: &'static str,
    steps: &'static [(i32, &'static str, &'static str)],
}

const SEED_PROCESSES: &[SeedProcess] = &[
    SeedProcess {
        title: "Budget Request Approval",
        steps: &[(1, "department review", "department_head"), (2, "finance review", "finance_manager")],
    },
    SeedProcess {
        title: "Purchase Order Approval",
        steps: &[
            (1, "procurement review", "procurement_officer"),
            (2, "finance review", "finance_manager"),
        ],
    },
    SeedProcess { title: "RFQ Approval", steps: &[(1, "procurement review", "procurement_officer")] },
    SeedProcess {
        title: "Payment Order Approval",
        steps: &[(1, "treasury review", "treasurer"), (2, "cfo review", "cfo")],
    },
];

/// (process title, step order, initiating user, assignee); `None` rows are
/// the step defaults.
const SEED_ASSIGNMENTS: &[(&str, i32, Option<&str>, &str)] = &[
    ("Budget Request Approval", 1, None, "user-dept-head"),
    ("Budget Request Approval", 1, Some("user-requester"), "user-dept-head"),
    ("Budget Request Approval", 2, None, "user-finance-mgr"),
    ("Purchase Order Approval", 1, None, "user-procurement"),
    ("Purchase Order Approval", 2, None, "user-finance-mgr"),
    ("RFQ Approval", 1, None, "user-procurement"),
    ("Payment Order Approval", 1, None, "user-treasurer"),
    ("Payment Order Approval", 2, None, "user-cfo"),
];

const SEED_DOCUMENT_ID: &str = "BR-DEMO-0001";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub processes: usize,
    pub steps: usize,
    pub assignments: usize,
    pub documents: usize,
}

pub async fn seed_demo_dataset(pool: &DbPool) -> Result<SeedResult, StoreError> {
    let processes = SqlProcessDirectory::new(pool.clone());
    let assignees = SqlAssigneeDirectory::new(pool.clone());
    let documents = SqlDocumentStore::new(pool.clone());

    let mut step_count = 0;
    for seed in SEED_PROCESSES {
        let steps: Vec<ProcessStep> = seed
            .steps
            .iter()
            .map(|(order, description, approver_role)| ProcessStep {
                order: *order,
                description: description.to_string(),
                approver_role: approver_role.to_string(),
            })
            .collect();
        step_count += steps.len();
        processes
            .save_definition(&ProcessDefinition { title: seed.title.to_string(), steps })
            .await?;
    }

    for (title, order, initiating_user, assignee) in SEED_ASSIGNMENTS {
        assignees.save_assignment(title, *order, *initiating_user, assignee).await?;
    }

    let now = Utc::now();
    documents
        .save(Document {
            id: DocumentId(SEED_DOCUMENT_ID.to_string()),
            kind: DocumentKind::BudgetRequest,
            status: DocumentStatus::Draft,
            hierarchy: HierarchyKey {
                fiscal_period_id: 5,
                department_id: 2,
                cost_center_id: 9,
                sub_cost_center: String::new(),
            },
            supplier_id: None,
            amount: Decimal::new(1_250_000, 2),
            currency: "USD".to_string(),
            justification: "Quarterly replacement of lab equipment".to_string(),
            attachment_path: None,
            requested_by: "user-requester".to_string(),
            created_at: now,
            updated_at: now,
        })
        .await?;

    Ok(SeedResult {
        processes: SEED_PROCESSES.len(),
        steps: step_count,
        assignments: SEED_ASSIGNMENTS.len(),
        documents: 1,
    })
}

/// Confirms the seeded rows are present; used by smoke tooling after
/// `seed_demo_dataset` so drift fails loudly instead of silently.
pub async fn verify_seed(pool: &DbPool) -> Result<SeedResult, StoreError> {
    let processes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM process_definition")
        .fetch_one(pool)
        .await
        .map_err(backend)?;
    let steps: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM process_step")
        .fetch_one(pool)
        .await
        .map_err(backend)?;
    let assignments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM step_assignee")
        .fetch_one(pool)
        .await
        .map_err(backend)?;
    let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document WHERE id = ?")
        .bind(SEED_DOCUMENT_ID)
        .fetch_one(pool)
        .await
        .map_err(backend)?;

    Ok(SeedResult {
        processes: processes as usize,
        steps: steps as usize,
        assignments: assignments as usize,
        documents: documents as usize,
    })
}
