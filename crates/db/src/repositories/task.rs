use sqlx::Row;

use signoff_core::workflow::ports::TaskDispatcher;
use signoff_core::{
    DocumentId, DocumentKind, StoreError, Task, TaskId, TaskUrgency, TransactionId,
};

use super::{backend, decode, parse_timestamp};
use crate::DbPool;

pub struct SqlTaskBoard {
    pool: DbPool,
}

impl SqlTaskBoard {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Unread-first task list for one assignee, oldest assignment first.
    pub async fn list_for_assignee(&self, assignee: &str) -> Result<Vec<Task>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM task
             WHERE assigned_to = ?
             ORDER BY read_status ASC, assigned_at ASC",
        );
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&query)
            .bind(assignee)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter().map(row_to_task).collect::<Result<Vec<_>, _>>()
    }

    pub async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM task WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(ref r) => Ok(Some(row_to_task(r)?)),
            None => Ok(None),
        }
    }

    /// Returns false when no task with that id exists.
    pub async fn mark_read(&self, id: &TaskId) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE task SET read_status = 1 WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }
}

const SELECT_COLUMNS: &str = "id, transaction_id, document_id, document_kind, process_title,
                              step_order, assigned_from, assigned_to, urgency, assigned_at,
                              deadline, read_status";

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<Task, StoreError> {
    let id: String = row.try_get("id").map_err(|e| decode(e.to_string()))?;
    let transaction_id: String =
        row.try_get("transaction_id").map_err(|e| decode(e.to_string()))?;
    let document_id: String = row.try_get("document_id").map_err(|e| decode(e.to_string()))?;
    let document_kind_str: String =
        row.try_get("document_kind").map_err(|e| decode(e.to_string()))?;
    let process_title: String =
        row.try_get("process_title").map_err(|e| decode(e.to_string()))?;
    let step_order: i32 = row.try_get("step_order").map_err(|e| decode(e.to_string()))?;
    let assigned_from: String = row.try_get("assigned_from").map_err(|e| decode(e.to_string()))?;
    let assigned_to: String = row.try_get("assigned_to").map_err(|e| decode(e.to_string()))?;
    let urgency_str: String = row.try_get("urgency").map_err(|e| decode(e.to_string()))?;
    let assigned_at_str: String =
        row.try_get("assigned_at").map_err(|e| decode(e.to_string()))?;
    let deadline_str: Option<String> =
        row.try_get("deadline").map_err(|e| decode(e.to_string()))?;
    let read_status: i64 = row.try_get("read_status").map_err(|e| decode(e.to_string()))?;

    let document_kind = DocumentKind::parse(&document_kind_str)
        .ok_or_else(|| decode(format!("unknown document kind `{document_kind_str}`")))?;
    let urgency = TaskUrgency::parse(&urgency_str)
        .ok_or_else(|| decode(format!("unknown task urgency `{urgency_str}`")))?;
    let deadline = match deadline_str {
        Some(raw) => Some(parse_timestamp(&raw, "deadline")?),
        None => None,
    };

    Ok(Task {
        id: TaskId(id),
        transaction_id: TransactionId(transaction_id),
        document_id: DocumentId(document_id),
        document_kind,
        process_title,
        step_order,
        assigned_from,
        assigned_to,
        urgency,
        assigned_at: parse_timestamp(&assigned_at_str, "assigned_at")?,
        deadline,
        read: read_status != 0,
    })
}

#[async_trait::async_trait]
impl TaskDispatcher for SqlTaskBoard {
    async fn dispatch(&self, task: Task) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO task (id, transaction_id, document_id, document_kind, process_title,
                               step_order, assigned_from, assigned_to, urgency, assigned_at,
                               deadline, read_status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.id.0)
        .bind(&task.transaction_id.0)
        .bind(&task.document_id.0)
        .bind(task.document_kind.as_str())
        .bind(&task.process_title)
        .bind(task.step_order)
        .bind(&task.assigned_from)
        .bind(&task.assigned_to)
        .bind(task.urgency.as_str())
        .bind(task.assigned_at.to_rfc3339())
        .bind(task.deadline.map(|deadline| deadline.to_rfc3339()))
        .bind(i64::from(task.read))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }
}
