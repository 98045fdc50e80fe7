use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use signoff_core::directory::ProcessDirectory;
use signoff_core::workflow::ports::DocumentStore;
use signoff_core::{
    ApprovalTransaction, DecideOutcome, Decision, Document, DocumentId, DocumentKind,
    DocumentStatus, ErrorClass, HierarchyKey, ProcessDefinition, SubmitOutcome, Task, TaskId,
    TransactionId, WorkflowError,
};

use crate::bootstrap::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/documents", post(submit_document))
        .route("/documents/{id}", get(get_document))
        .route("/documents/{id}/transactions", get(list_transactions))
        .route("/transactions/{id}/decision", post(decide_transaction))
        .route("/tasks", get(list_tasks))
        .route("/tasks/{id}/read", post(mark_task_read))
        .route("/processes/{title}", get(get_process))
        .with_state(state)
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub user_message: &'static str,
    pub correlation_id: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn workflow_error(error: WorkflowError, correlation_id: &str) -> ApiError {
    let (status, label) = match error.class() {
        ErrorClass::Validation => (StatusCode::BAD_REQUEST, "validation"),
        ErrorClass::Authorization => (StatusCode::FORBIDDEN, "authorization"),
        ErrorClass::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        ErrorClass::Idempotency => (StatusCode::CONFLICT, "already_processed"),
        ErrorClass::Conflict => (StatusCode::CONFLICT, "conflict"),
        ErrorClass::Configuration => (StatusCode::UNPROCESSABLE_ENTITY, "configuration"),
        ErrorClass::Storage => (StatusCode::SERVICE_UNAVAILABLE, "storage"),
    };
    (
        status,
        Json(ErrorBody {
            error: label,
            message: error.to_string(),
            user_message: error.user_message(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>, correlation_id: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: "validation",
            message: message.into(),
            user_message: "The request could not be processed. Check inputs and try again.",
            correlation_id: correlation_id.to_string(),
        }),
    )
}

fn storage_error(error: signoff_core::StoreError, correlation_id: &str) -> ApiError {
    workflow_error(WorkflowError::from(error), correlation_id)
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubmitDocumentRequest {
    pub id: Option<String>,
    pub kind: String,
    pub fiscal_period_id: i64,
    pub department_id: i64,
    pub cost_center_id: i64,
    #[serde(default)]
    pub sub_cost_center: String,
    pub supplier_id: Option<i64>,
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub justification: String,
    pub attachment_path: Option<String>,
    pub submitted_by: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

pub async fn submit_document(
    State(state): State<AppState>,
    Json(request): Json<SubmitDocumentRequest>,
) -> Result<(StatusCode, Json<SubmitOutcome>), ApiError> {
    let correlation_id = new_correlation_id();

    let kind = DocumentKind::parse(&request.kind)
        .ok_or_else(|| bad_request(format!("unknown document kind `{}`", request.kind), &correlation_id))?;

    let now = Utc::now();
    let document = Document {
        id: DocumentId(request.id.unwrap_or_else(|| Uuid::new_v4().to_string())),
        kind,
        status: DocumentStatus::Draft,
        hierarchy: HierarchyKey {
            fiscal_period_id: request.fiscal_period_id,
            department_id: request.department_id,
            cost_center_id: request.cost_center_id,
            sub_cost_center: request.sub_cost_center,
        },
        supplier_id: request.supplier_id,
        amount: request.amount,
        currency: request.currency,
        justification: request.justification,
        attachment_path: request.attachment_path,
        requested_by: request.submitted_by.clone(),
        created_at: now,
        updated_at: now,
    };

    let outcome = state
        .orchestrator
        .submit(document, &request.submitted_by, &correlation_id)
        .await
        .map_err(|error| workflow_error(error, &correlation_id))?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let correlation_id = new_correlation_id();
    let document = state
        .documents
        .find_by_id(&DocumentId(id.clone()))
        .await
        .map_err(|error| storage_error(error, &correlation_id))?
        .ok_or_else(|| {
            workflow_error(WorkflowError::DocumentNotFound { id }, &correlation_id)
        })?;
    Ok(Json(document))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ApprovalTransaction>>, ApiError> {
    let correlation_id = new_correlation_id();
    let history = state
        .orchestrator
        .history(&DocumentId(id))
        .await
        .map_err(|error| workflow_error(error, &correlation_id))?;
    Ok(Json(history))
}

#[derive(Clone, Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: String,
    pub acting_user: String,
    pub refer_to: Option<String>,
}

pub async fn decide_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecideOutcome>, ApiError> {
    let correlation_id = new_correlation_id();

    let decision = match request.decision.trim().to_ascii_lowercase().as_str() {
        "approve" | "approved" => Decision::Approve,
        "reject" | "rejected" => Decision::Reject,
        "refer" | "referred" => match request.refer_to {
            Some(to) if !to.trim().is_empty() => Decision::Refer { to },
            _ => return Err(bad_request("refer_to is required for a referral", &correlation_id)),
        },
        other => {
            return Err(bad_request(
                format!("unknown decision `{other}` (expected approve|reject|refer)"),
                &correlation_id,
            ))
        }
    };

    let outcome = state
        .orchestrator
        .decide(&TransactionId(id), decision, &request.acting_user, &correlation_id)
        .await
        .map_err(|error| workflow_error(error, &correlation_id))?;

    Ok(Json(outcome))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let correlation_id = new_correlation_id();
    let assignee = params
        .get("assignee")
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| bad_request("query parameter `assignee` is required", &correlation_id))?;

    let tasks = state
        .tasks
        .list_for_assignee(assignee)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;
    Ok(Json(tasks))
}

pub async fn mark_task_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let correlation_id = new_correlation_id();
    let updated = state
        .tasks
        .mark_read(&TaskId(id.clone()))
        .await
        .map_err(|error| storage_error(error, &correlation_id))?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "not_found",
                message: format!("no task found with id `{id}`"),
                user_message: "The requested record could not be found.",
                correlation_id,
            }),
        ))
    }
}

pub async fn get_process(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> Result<Json<ProcessDefinition>, ApiError> {
    let correlation_id = new_correlation_id();
    let process = state
        .processes
        .find_by_title(&title)
        .await
        .map_err(|error| storage_error(error, &correlation_id))?
        .ok_or_else(|| {
            workflow_error(WorkflowError::ProcessNotFound { title }, &correlation_id)
        })?;
    Ok(Json(process))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::Json;
    use rust_decimal::Decimal;

    use signoff_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use signoff_core::{DocumentStatus, ProcessDefinition, ProcessStep, TransactionStatus};
    use signoff_db::repositories::{SqlAssigneeDirectory, SqlProcessDirectory};

    use crate::bootstrap::{bootstrap_with_config, AppState};

    use super::{
        decide_transaction, list_tasks, list_transactions, submit_document, DecisionRequest,
        SubmitDocumentRequest,
    };

    /// Each test gets its own named in-memory database so writes from one
    /// scenario cannot leak into another.
    async fn test_state(db_name: &str) -> AppState {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(format!(
                    "sqlite:file:{db_name}?mode=memory&cache=shared"
                )),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config");
        let app = bootstrap_with_config(config).await.expect("bootstrap");

        SqlProcessDirectory::new(app.db_pool.clone())
            .save_definition(&ProcessDefinition {
                title: "Budget Request Approval".to_string(),
                steps: vec![ProcessStep {
                    order: 1,
                    description: "department review".to_string(),
                    approver_role: "department_head".to_string(),
                }],
            })
            .await
            .expect("seed process");
        SqlAssigneeDirectory::new(app.db_pool.clone())
            .save_assignment("Budget Request Approval", 1, None, "u-42")
            .await
            .expect("seed assignment");

        app.state
    }

    fn submit_request(fiscal_period_id: i64) -> SubmitDocumentRequest {
        SubmitDocumentRequest {
            id: None,
            kind: "budget_request".to_string(),
            fiscal_period_id,
            department_id: 2,
            cost_center_id: 9,
            sub_cost_center: String::new(),
            supplier_id: None,
            amount: Decimal::new(125_000, 2),
            currency: "USD".to_string(),
            justification: "Replacement lab equipment".to_string(),
            attachment_path: None,
            submitted_by: "u-17".to_string(),
        }
    }

    #[tokio::test]
    async fn submit_and_decide_through_the_http_surface() {
        let state = test_state("routes_submit_decide").await;

        let (status, Json(submitted)) =
            submit_document(State(state.clone()), Json(submit_request(5)))
                .await
                .expect("submit should succeed");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(submitted.document.status, DocumentStatus::Pending);
        assert_eq!(submitted.transaction.assigned_to, "u-42");

        let Json(tasks) = list_tasks(
            State(state.clone()),
            Query(
                [("assignee".to_string(), "u-42".to_string())]
                    .into_iter()
                    .collect::<std::collections::HashMap<_, _>>(),
            ),
        )
        .await
        .expect("task list");
        assert_eq!(tasks.len(), 1);

        let Json(decided) = decide_transaction(
            State(state.clone()),
            Path(submitted.transaction.id.0.clone()),
            Json(DecisionRequest {
                decision: "approve".to_string(),
                acting_user: "u-42".to_string(),
                refer_to: None,
            }),
        )
        .await
        .expect("decision should succeed");
        assert_eq!(decided.document.status, DocumentStatus::Approved);
        assert_eq!(decided.transaction.status, TransactionStatus::Approved);

        let Json(history) =
            list_transactions(State(state), Path(submitted.document.id.0.clone()))
                .await
                .expect("history");
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_slot_maps_to_conflict() {
        let state = test_state("routes_duplicate_slot").await;

        submit_document(State(state.clone()), Json(submit_request(6)))
            .await
            .expect("first submit");
        let (status, Json(body)) = submit_document(State(state), Json(submit_request(6)))
            .await
            .expect_err("duplicate must be rejected");

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "conflict");
        assert!(body.message.contains("fiscal period 6"));
    }

    #[tokio::test]
    async fn double_decision_maps_to_conflict_with_informational_body() {
        let state = test_state("routes_double_decision").await;
        let (_, Json(submitted)) = submit_document(State(state.clone()), Json(submit_request(7)))
            .await
            .expect("submit");

        let decision = DecisionRequest {
            decision: "approve".to_string(),
            acting_user: "u-42".to_string(),
            refer_to: None,
        };
        decide_transaction(
            State(state.clone()),
            Path(submitted.transaction.id.0.clone()),
            Json(decision.clone()),
        )
        .await
        .expect("first decision");

        let (status, Json(body)) = decide_transaction(
            State(state),
            Path(submitted.transaction.id.0.clone()),
            Json(decision),
        )
        .await
        .expect_err("second decision must be rejected");

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "already_processed");
        assert_eq!(body.user_message, "This item has already been processed.");
    }

    #[tokio::test]
    async fn referral_requires_a_delegate() {
        let state = test_state("routes_referral_delegate").await;
        let (_, Json(submitted)) = submit_document(State(state.clone()), Json(submit_request(8)))
            .await
            .expect("submit");

        let (status, Json(body)) = decide_transaction(
            State(state),
            Path(submitted.transaction.id.0.clone()),
            Json(DecisionRequest {
                decision: "refer".to_string(),
                acting_user: "u-42".to_string(),
                refer_to: None,
            }),
        )
        .await
        .expect_err("referral without delegate must be rejected");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.message.contains("refer_to"));
    }
}
