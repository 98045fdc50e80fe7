use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use signoff_core::workflow::ports::DocumentStore;
use signoff_core::{Document, DocumentId, DocumentKind, DocumentStatus, HierarchyKey, StoreError};

use super::{backend, decode, parse_timestamp};
use crate::DbPool;

const TERMINAL_STATUSES: &str = "('approved', 'rejected', 'cancelled', 'partially_paid', 'overdue')";

pub struct SqlDocumentStore {
    pool: DbPool,
}

impl SqlDocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document, StoreError> {
    let id: String = row.try_get("id").map_err(|e| decode(e.to_string()))?;
    let kind_str: String = row.try_get("kind").map_err(|e| decode(e.to_string()))?;
    let status_str: String = row.try_get("status").map_err(|e| decode(e.to_string()))?;
    let fiscal_period_id: i64 =
        row.try_get("fiscal_period_id").map_err(|e| decode(e.to_string()))?;
    let department_id: i64 = row.try_get("department_id").map_err(|e| decode(e.to_string()))?;
    let cost_center_id: i64 = row.try_get("cost_center_id").map_err(|e| decode(e.to_string()))?;
    let sub_cost_center: String =
        row.try_get("sub_cost_center").map_err(|e| decode(e.to_string()))?;
    let supplier_id: Option<i64> = row.try_get("supplier_id").map_err(|e| decode(e.to_string()))?;
    let amount_str: String = row.try_get("amount").map_err(|e| decode(e.to_string()))?;
    let currency: String = row.try_get("currency").map_err(|e| decode(e.to_string()))?;
    let justification: String = row.try_get("justification").map_err(|e| decode(e.to_string()))?;
    let attachment_path: Option<String> =
        row.try_get("attachment_path").map_err(|e| decode(e.to_string()))?;
    let requested_by: String = row.try_get("requested_by").map_err(|e| decode(e.to_string()))?;
    let created_at_str: String = row.try_get("created_at").map_err(|e| decode(e.to_string()))?;
    let updated_at_str: String = row.try_get("updated_at").map_err(|e| decode(e.to_string()))?;

    let kind = DocumentKind::parse(&kind_str)
        .ok_or_else(|| decode(format!("unknown document kind `{kind_str}`")))?;
    let status = DocumentStatus::parse(&status_str)
        .ok_or_else(|| decode(format!("unknown document status `{status_str}`")))?;
    let amount = Decimal::from_str(&amount_str)
        .map_err(|error| decode(format!("column `amount`: {error}")))?;

    Ok(Document {
        id: DocumentId(id),
        kind,
        status,
        hierarchy: HierarchyKey { fiscal_period_id, department_id, cost_center_id, sub_cost_center },
        supplier_id,
        amount,
        currency,
        justification,
        attachment_path,
        requested_by,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
        updated_at: parse_timestamp(&updated_at_str, "updated_at")?,
    })
}

#[async_trait::async_trait]
impl DocumentStore for SqlDocumentStore {
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            "SELECT id, kind, status, fiscal_period_id, department_id, cost_center_id,
                    sub_cost_center, supplier_id, amount, currency, justification,
                    attachment_path, requested_by, created_at, updated_at
             FROM document WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(ref r) => Ok(Some(row_to_document(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, document: Document) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO document (id, kind, status, fiscal_period_id, department_id,
                                   cost_center_id, sub_cost_center, supplier_id, amount, currency,
                                   justification, attachment_path, requested_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 fiscal_period_id = excluded.fiscal_period_id,
                 department_id = excluded.department_id,
                 cost_center_id = excluded.cost_center_id,
                 sub_cost_center = excluded.sub_cost_center,
                 supplier_id = excluded.supplier_id,
                 amount = excluded.amount,
                 currency = excluded.currency,
                 justification = excluded.justification,
                 attachment_path = excluded.attachment_path,
                 requested_by = excluded.requested_by,
                 updated_at = excluded.updated_at",
        )
        .bind(&document.id.0)
        .bind(document.kind.as_str())
        .bind(document.status.as_str())
        .bind(document.hierarchy.fiscal_period_id)
        .bind(document.hierarchy.department_id)
        .bind(document.hierarchy.cost_center_id)
        .bind(&document.hierarchy.sub_cost_center)
        .bind(document.supplier_id)
        .bind(document.amount.to_string())
        .bind(&document.currency)
        .bind(&document.justification)
        .bind(&document.attachment_path)
        .bind(&document.requested_by)
        .bind(document.created_at.to_rfc3339())
        .bind(document.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn find_open_duplicate(
        &self,
        kind: DocumentKind,
        hierarchy: &HierarchyKey,
        exclude: Option<&DocumentId>,
    ) -> Result<Option<Document>, StoreError> {
        let query = format!(
            "SELECT id, kind, status, fiscal_period_id, department_id, cost_center_id,
                    sub_cost_center, supplier_id, amount, currency, justification,
                    attachment_path, requested_by, created_at, updated_at
             FROM document
             WHERE kind = ? AND fiscal_period_id = ? AND department_id = ?
               AND cost_center_id = ? AND sub_cost_center = ?
               AND status NOT IN {TERMINAL_STATUSES}
               AND id != ?
             LIMIT 1",
        );

        let row = sqlx::query(&query)
            .bind(kind.as_str())
            .bind(hierarchy.fiscal_period_id)
            .bind(hierarchy.department_id)
            .bind(hierarchy.cost_center_id)
            .bind(&hierarchy.sub_cost_center)
            .bind(exclude.map(|id| id.0.as_str()).unwrap_or(""))
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(ref r) => Ok(Some(row_to_document(r)?)),
            None => Ok(None),
        }
    }
}
