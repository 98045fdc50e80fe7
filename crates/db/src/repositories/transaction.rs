use sqlx::Row;

use signoff_core::workflow::ports::TransactionLedger;
use signoff_core::{
    ApprovalTransaction, DocumentId, StoreError, TransactionId, TransactionStatus,
};

use super::{backend, decode, parse_timestamp};
use crate::DbPool;

pub struct SqlTransactionLedger {
    pool: DbPool,
}

impl SqlTransactionLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, document_id, process_title, step_order, step_description,
                              requested_by, assigned_to, referred_to, status, created_at, updated_at";

fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalTransaction, StoreError> {
    let id: String = row.try_get("id").map_err(|e| decode(e.to_string()))?;
    let document_id: String = row.try_get("document_id").map_err(|e| decode(e.to_string()))?;
    let process_title: String =
        row.try_get("process_title").map_err(|e| decode(e.to_string()))?;
    let step_order: i32 = row.try_get("step_order").map_err(|e| decode(e.to_string()))?;
    let step_description: String =
        row.try_get("step_description").map_err(|e| decode(e.to_string()))?;
    let requested_by: String = row.try_get("requested_by").map_err(|e| decode(e.to_string()))?;
    let assigned_to: String = row.try_get("assigned_to").map_err(|e| decode(e.to_string()))?;
    let referred_to: Option<String> =
        row.try_get("referred_to").map_err(|e| decode(e.to_string()))?;
    let status_str: String = row.try_get("status").map_err(|e| decode(e.to_string()))?;
    let created_at_str: String = row.try_get("created_at").map_err(|e| decode(e.to_string()))?;
    let updated_at_str: String = row.try_get("updated_at").map_err(|e| decode(e.to_string()))?;

    let status = TransactionStatus::parse(&status_str)
        .ok_or_else(|| decode(format!("unknown transaction status `{status_str}`")))?;

    Ok(ApprovalTransaction {
        id: TransactionId(id),
        document_id: DocumentId(document_id),
        process_title,
        step_order,
        step_description,
        requested_by,
        assigned_to,
        referred_to,
        status,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
        updated_at: parse_timestamp(&updated_at_str, "updated_at")?,
    })
}

#[async_trait::async_trait]
impl TransactionLedger for SqlTransactionLedger {
    async fn find_by_id(
        &self,
        id: &TransactionId,
    ) -> Result<Option<ApprovalTransaction>, StoreError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM approval_transaction WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(ref r) => Ok(Some(row_to_transaction(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, transaction: ApprovalTransaction) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO approval_transaction (id, document_id, process_title, step_order,
                                               step_description, requested_by, assigned_to,
                                               referred_to, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 referred_to = excluded.referred_to,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
        )
        .bind(&transaction.id.0)
        .bind(&transaction.document_id.0)
        .bind(&transaction.process_title)
        .bind(transaction.step_order)
        .bind(&transaction.step_description)
        .bind(&transaction.requested_by)
        .bind(&transaction.assigned_to)
        .bind(&transaction.referred_to)
        .bind(transaction.status.as_str())
        .bind(transaction.created_at.to_rfc3339())
        .bind(transaction.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn remove(&self, id: &TransactionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM approval_transaction WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<ApprovalTransaction>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM approval_transaction
             WHERE document_id = ?
             ORDER BY step_order ASC, created_at ASC",
        );
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&query)
            .bind(&document_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter().map(row_to_transaction).collect::<Result<Vec<_>, _>>()
    }

    async fn find_pending_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<ApprovalTransaction>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM approval_transaction
             WHERE document_id = ? AND status = 'pending'
             LIMIT 1",
        );
        let row = sqlx::query(&query)
            .bind(&document_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(ref r) => Ok(Some(row_to_transaction(r)?)),
            None => Ok(None),
        }
    }
}
