use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use signoff_core::audit::{AuditEvent, AuditOutcome, AuditSink};
use signoff_core::config::{AppConfig, ConfigError, LoadOptions};
use signoff_core::{WorkflowBinding, WorkflowCatalog, WorkflowOrchestrator};
use signoff_db::repositories::{
    SqlAssigneeDirectory, SqlDocumentStore, SqlProcessDirectory, SqlTaskBoard,
    SqlTransactionLedger,
};
use signoff_db::{connect_with_settings, migrations, DbPool};

use crate::notify::{NotifyingDispatcher, WebhookNotifier};

pub type SqlOrchestrator = WorkflowOrchestrator<
    SqlDocumentStore,
    SqlTransactionLedger,
    NotifyingDispatcher<SqlTaskBoard>,
    SqlProcessDirectory,
    SqlAssigneeDirectory,
>;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SqlOrchestrator>,
    pub documents: Arc<SqlDocumentStore>,
    pub tasks: Arc<SqlTaskBoard>,
    pub processes: Arc<SqlProcessDirectory>,
}

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

/// Bridges orchestrator audit events into the process-wide tracing pipeline.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let document_id =
            event.document_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown").to_string();
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        match event.outcome {
            AuditOutcome::Success => tracing::info!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                document_id = %document_id,
                actor = %event.actor,
                metadata = %metadata,
                "workflow audit event"
            ),
            AuditOutcome::Rejected | AuditOutcome::Failed => tracing::warn!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                document_id = %document_id,
                actor = %event.actor,
                metadata = %metadata,
                "workflow audit event"
            ),
        }
    }
}

/// The served catalog starts from the built-in bindings and applies the
/// configured task defaults across every document kind.
fn catalog_from_config(config: &AppConfig) -> WorkflowCatalog {
    let bindings: Vec<WorkflowBinding> = WorkflowCatalog::default()
        .bindings()
        .map(|binding| WorkflowBinding {
            task_urgency: config.workflow.default_urgency,
            task_deadline_days: Some(config.workflow.task_deadline_days),
            ..binding.clone()
        })
        .collect();
    WorkflowCatalog::new(bindings)
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        document_id = "unknown",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        document_id = "unknown",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        document_id = "unknown",
        "database migrations applied"
    );

    let notifier = WebhookNotifier::from_config(&config.notify);
    let dispatcher = NotifyingDispatcher::new(SqlTaskBoard::new(db_pool.clone()), notifier);
    let orchestrator = WorkflowOrchestrator::new(
        catalog_from_config(&config),
        SqlDocumentStore::new(db_pool.clone()),
        SqlTransactionLedger::new(db_pool.clone()),
        dispatcher,
        SqlProcessDirectory::new(db_pool.clone()),
        SqlAssigneeDirectory::new(db_pool.clone()),
    )
    .with_audit(Arc::new(TracingAuditSink));

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        documents: Arc::new(SqlDocumentStore::new(db_pool.clone())),
        tasks: Arc::new(SqlTaskBoard::new(db_pool.clone())),
        processes: Arc::new(SqlProcessDirectory::new(db_pool.clone())),
    };

    Ok(Application { config, db_pool, state })
}
