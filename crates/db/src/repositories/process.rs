use sqlx::Row;

use signoff_core::directory::ProcessDirectory;
use signoff_core::{ProcessDefinition, ProcessStep, StoreError};

use super::{backend, decode};
use crate::DbPool;

pub struct SqlProcessDirectory {
    pool: DbPool,
}

impl SqlProcessDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Replaces the step list for a process title. Used by seeding and
    /// administrative tooling; workflow execution only reads.
    pub async fn save_definition(&self, process: &ProcessDefinition) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO process_definition (title) VALUES (?) ON CONFLICT(title) DO NOTHING")
            .bind(&process.title)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        sqlx::query("DELETE FROM process_step WHERE process_title = ?")
            .bind(&process.title)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        for step in &process.steps {
            sqlx::query(
                "INSERT INTO process_step (process_title, step_order, description, approver_role)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&process.title)
            .bind(step.order)
            .bind(&step.description)
            .bind(&step.approver_role)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        }

        Ok(())
    }

    pub async fn list_titles(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT title FROM process_definition ORDER BY title ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("title").map_err(|e| decode(e.to_string())))
            .collect()
    }
}

#[async_trait::async_trait]
impl ProcessDirectory for SqlProcessDirectory {
    async fn find_by_title(&self, title: &str) -> Result<Option<ProcessDefinition>, StoreError> {
        let definition = sqlx::query("SELECT title FROM process_definition WHERE title = ?")
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        let Some(definition) = definition else {
            return Ok(None);
        };
        let stored_title: String =
            definition.try_get("title").map_err(|e| decode(e.to_string()))?;

        let rows = sqlx::query(
            "SELECT step_order, description, approver_role
             FROM process_step
             WHERE process_title = ?
             ORDER BY step_order ASC",
        )
        .bind(&stored_title)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let steps = rows
            .iter()
            .map(|row| {
                Ok(ProcessStep {
                    order: row.try_get("step_order").map_err(|e| decode(e.to_string()))?,
                    description: row.try_get("description").map_err(|e| decode(e.to_string()))?,
                    approver_role: row
                        .try_get("approver_role")
                        .map_err(|e| decode(e.to_string()))?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(ProcessDefinition { title: stored_title, steps }))
    }
}
