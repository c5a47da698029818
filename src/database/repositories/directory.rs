use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::database::models::{StaffMember, StaffRole};
use crate::services::directory::StaffDirectory;

#[derive(sqlx::FromRow)]
struct StaffRow {
    id: Uuid,
    name: String,
    email: String,
    role: StaffRole,
    job_title: Option<String>,
}

/// Directory collaborator backed by the monolith's staff/branch tables.
#[derive(Clone)]
pub struct SqliteStaffDirectory {
    pool: SqlitePool,
}

impl SqliteStaffDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StaffDirectory for SqliteStaffDirectory {
    async fn get_staff(&self, id: Uuid) -> Result<Option<StaffMember>> {
        let row = sqlx::query_as::<_, StaffRow>(
            "SELECT id, name, email, role, job_title FROM staff WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let branch_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT branch_id FROM staff_branches WHERE staff_id = ?")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        Ok(Some(StaffMember {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
            job_title: row.job_title,
            branch_ids,
        }))
    }

    async fn approvers_for_branch(&self, branch_id: Uuid) -> Result<Vec<Uuid>> {
        let approvers: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT
                s.id
            FROM
                staff s
                JOIN staff_branches sb ON sb.staff_id = s.id
            WHERE
                sb.branch_id = ?
                AND s.role IN ('owner', 'manager')
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(approvers)
    }
}
