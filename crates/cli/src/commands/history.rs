use serde::Serialize;

use crate::commands::CommandResult;
use signoff_core::config::{AppConfig, LoadOptions};
use signoff_core::workflow::ports::{DocumentStore, TransactionLedger};
use signoff_core::DocumentId;
use signoff_db::repositories::{SqlDocumentStore, SqlTransactionLedger};
use signoff_db::connect_with_settings;

#[derive(Debug, Serialize)]
struct HistoryEntry {
    transaction_id: String,
    step_order: i32,
    step_description: String,
    assigned_to: String,
    referred_to: Option<String>,
    status: &'static str,
    updated_at: String,
}

#[derive(Debug, Serialize)]
struct HistoryReport {
    document_id: String,
    document_status: &'static str,
    transactions: Vec<HistoryEntry>,
}

pub fn run(document_id: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "history",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "history",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let id = DocumentId(document_id.to_string());
        let document = SqlDocumentStore::new(pool.clone())
            .find_by_id(&id)
            .await
            .map_err(|error| ("storage", error.to_string(), 5u8))?
            .ok_or_else(|| {
                ("not_found", format!("no document found with id `{document_id}`"), 6u8)
            })?;

        let transactions = SqlTransactionLedger::new(pool.clone())
            .list_for_document(&id)
            .await
            .map_err(|error| ("storage", error.to_string(), 5u8))?;
        pool.close().await;

        Ok::<_, (&'static str, String, u8)>(HistoryReport {
            document_id: document.id.0,
            document_status: document.status.as_str(),
            transactions: transactions
                .into_iter()
                .map(|transaction| HistoryEntry {
                    transaction_id: transaction.id.0,
                    step_order: transaction.step_order,
                    step_description: transaction.step_description,
                    assigned_to: transaction.assigned_to,
                    referred_to: transaction.referred_to,
                    status: transaction.status.as_str(),
                    updated_at: transaction.updated_at.to_rfc3339(),
                })
                .collect(),
        })
    });

    match result {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => CommandResult::failure("history", "serialization", error.to_string(), 7),
        },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("history", error_class, message, exit_code)
        }
    }
}
