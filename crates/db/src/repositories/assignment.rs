use sqlx::Row;

use signoff_core::directory::AssigneeDirectory;
use signoff_core::{ProcessStep, StoreError};

use super::{backend, decode};
use crate::DbPool;

/// Approver reference data: one default assignee per step, optionally
/// overridden for a specific submitting user.
pub struct SqlAssigneeDirectory {
    pool: DbPool,
}

impl SqlAssigneeDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save_assignment(
        &self,
        process_title: &str,
        step_order: i32,
        initiating_user: Option<&str>,
        assignee: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO step_assignee (process_title, step_order, initiating_user, assignee)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (process_title, step_order, IFNULL(initiating_user, ''))
             DO UPDATE SET assignee = excluded.assignee",
        )
        .bind(process_title)
        .bind(step_order)
        .bind(initiating_user)
        .bind(assignee)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl AssigneeDirectory for SqlAssigneeDirectory {
    async fn resolve(
        &self,
        process_title: &str,
        step: &ProcessStep,
        initiating_user: &str,
    ) -> Result<Option<String>, StoreError> {
        // Exact submitter match wins over the step default (NULL row).
        let row = sqlx::query(
            "SELECT assignee FROM step_assignee
             WHERE process_title = ? AND step_order = ?
               AND (initiating_user = ? OR initiating_user IS NULL)
             ORDER BY initiating_user IS NULL
             LIMIT 1",
        )
        .bind(process_title)
        .bind(step.order)
        .bind(initiating_user)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => {
                let assignee: String =
                    row.try_get("assignee").map_err(|e| decode(e.to_string()))?;
                Ok(Some(assignee))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use signoff_core::directory::AssigneeDirectory;
    use signoff_core::{ProcessDefinition, ProcessStep};

    use super::SqlAssigneeDirectory;
    use crate::repositories::SqlProcessDirectory;
    use crate::{connect_with_settings, migrations};

    fn step(order: i32) -> ProcessStep {
        ProcessStep {
            order,
            description: "department review".to_string(),
            approver_role: "department_head".to_string(),
        }
    }

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        // Parent rows for the step FK.
        SqlProcessDirectory::new(pool.clone())
            .save_definition(&ProcessDefinition {
                title: "Budget Request Approval".to_string(),
                steps: vec![step(1), step(2)],
            })
            .await
            .expect("seed process");

        pool
    }

    #[tokio::test]
    async fn submitter_override_wins_over_step_default() {
        let pool = setup().await;
        let directory = SqlAssigneeDirectory::new(pool);

        directory
            .save_assignment("Budget Request Approval", 1, None, "u-42")
            .await
            .expect("default");
        directory
            .save_assignment("Budget Request Approval", 1, Some("u-17"), "u-55")
            .await
            .expect("override");

        let for_override = directory
            .resolve("Budget Request Approval", &step(1), "u-17")
            .await
            .expect("resolve");
        assert_eq!(for_override.as_deref(), Some("u-55"));

        let for_default = directory
            .resolve("Budget Request Approval", &step(1), "u-90")
            .await
            .expect("resolve");
        assert_eq!(for_default.as_deref(), Some("u-42"));
    }

    #[tokio::test]
    async fn unmapped_step_resolves_to_none() {
        let pool = setup().await;
        let directory = SqlAssigneeDirectory::new(pool);

        let resolved = directory
            .resolve("Budget Request Approval", &step(2), "u-17")
            .await
            .expect("resolve");
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn reassignment_overwrites_the_mapping() {
        let pool = setup().await;
        let directory = SqlAssigneeDirectory::new(pool);

        directory
            .save_assignment("Budget Request Approval", 1, None, "u-42")
            .await
            .expect("default");
        directory
            .save_assignment("Budget Request Approval", 1, None, "u-43")
            .await
            .expect("reassign");

        let resolved = directory
            .resolve("Budget Request Approval", &step(1), "u-17")
            .await
            .expect("resolve");
        assert_eq!(resolved.as_deref(), Some("u-43"));
    }
}
